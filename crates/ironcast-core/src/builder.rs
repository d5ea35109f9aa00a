//! Builder contract and lifecycle

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::ArtifactRef;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::hook::Hook;
use crate::ui::Ui;

/// Reserved config keys injected into every builder's raw configuration
/// before prepare. Builders must not repurpose them.
pub const CONFIG_BUILD_NAME: &str = "ironcast_build_name";
pub const CONFIG_BUILDER_TYPE: &str = "ironcast_builder_type";
pub const CONFIG_DEBUG: &str = "ironcast_debug";
pub const CONFIG_FORCE: &str = "ironcast_force";
pub const CONFIG_ON_ERROR: &str = "ironcast_on_error";

/// A component that produces a machine image for one platform
///
/// `prepare` must be side-effect-free: no network calls, no disk writes, no
/// machine launches. The coordinator relies on this to prepare every build
/// before running any of them.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Merge and validate raw configurations (later entries win)
    ///
    /// Returns accumulated warnings; validation problems across all config
    /// blocks are aggregated into a single `ConfigErrors` value.
    async fn prepare(&mut self, raws: &[serde_json::Value]) -> Result<Vec<String>>;

    /// Run the build
    ///
    /// May legitimately produce no artifact without failing. Must honor
    /// cancellation within the time needed to clean up one step and leave
    /// no external resources behind unless configured to.
    async fn run(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn Hook>,
    ) -> Result<Option<ArtifactRef>>;
}
