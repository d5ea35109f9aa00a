//! Post-processor contract

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::ArtifactRef;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::ui::Ui;

/// Outcome of one post-processor application
#[derive(Debug)]
pub struct PostProcessed {
    /// The transformed artifact
    pub artifact: ArtifactRef,
    /// Vote to preserve the input artifact; any true vote in a sequence wins
    pub keep_input: bool,
    /// Keep the input regardless of other votes (forced by configuration)
    pub force_keep: bool,
}

impl PostProcessed {
    /// Result that replaces the input with `artifact`
    pub fn replace(artifact: ArtifactRef) -> Self {
        Self { artifact, keep_input: false, force_keep: false }
    }

    /// Result that keeps the input alongside `artifact`
    pub fn keep(artifact: ArtifactRef) -> Self {
        Self { artifact, keep_input: true, force_keep: false }
    }
}

/// A component that transforms one artifact into another
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Merge and validate raw configurations; side-effect-free
    async fn configure(&mut self, raws: &[serde_json::Value]) -> Result<()>;

    /// Transform `artifact`, deciding whether the input survives
    async fn post_process(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        artifact: ArtifactRef,
    ) -> Result<PostProcessed>;
}
