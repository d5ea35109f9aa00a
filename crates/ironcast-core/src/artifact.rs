//! Artifact model
//!
//! The output of a build or post-processor. The builder id string is a
//! stable public identifier; post-processors key type-specific handling on
//! it, so changing one is a compatibility break.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// A build output with identity and cleanup
#[async_trait]
pub trait Artifact: Send + Sync {
    /// Stable identifier of the builder type that produced this artifact
    fn builder_id(&self) -> &str;

    /// Files that make up the artifact, in order
    fn files(&self) -> Vec<PathBuf>;

    /// Builder-defined identity, e.g. `region:image-id`
    fn id(&self) -> String;

    /// Human-readable one-line summary
    fn summary(&self) -> String;

    /// Extra metadata for post-processors
    fn state(&self, key: &str) -> Option<serde_json::Value>;

    /// Release the external resources this artifact describes
    ///
    /// Called at most once; the post-processor chain enforces this.
    async fn destroy(&self) -> Result<()>;
}

/// Shared handle to an artifact moving through the post-processor chain
pub type ArtifactRef = Arc<dyn Artifact>;

impl std::fmt::Debug for dyn Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact").field("summary", &self.summary()).finish()
    }
}
