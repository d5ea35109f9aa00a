//! Provisioner contract

use std::sync::Arc;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::communicator::Communicator;
use crate::error::Result;
use crate::ui::Ui;

/// A component that configures a live machine through a communicator
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Merge and validate raw configurations; side-effect-free
    async fn prepare(&mut self, raws: &[serde_json::Value]) -> Result<()>;

    /// Apply this provisioner to the machine behind `comm`
    async fn provision(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        comm: Arc<dyn Communicator>,
    ) -> Result<()>;
}
