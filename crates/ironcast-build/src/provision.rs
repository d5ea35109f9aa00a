//! Provisioner driver
//!
//! Subscribes to the `provision` hook event. When a builder's machine is
//! ready it dispatches the event with the machine's communicator, and the
//! driver applies the configured provisioners in declared order.

use std::sync::Arc;

use async_trait::async_trait;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::hook::{Hook, HookPayload, HOOK_PROVISION};
use ironcast_core::provisioner::Provisioner;
use ironcast_core::template::RunFilter;
use ironcast_core::ui::Ui;
use tracing::debug;

/// A prepared provisioner with its attachment filter
#[derive(Clone)]
pub struct ProvisionerEntry {
    /// Provisioner type id, used in progress and error messages
    pub type_name: String,
    /// `only`/`except` filter keyed on the running build's name
    pub filter: RunFilter,
    pub inner: Arc<dyn Provisioner>,
}

/// Hook applying the provisioner list over the build's communicator
pub struct ProvisionHook {
    build_name: String,
    provisioners: Vec<ProvisionerEntry>,
}

impl ProvisionHook {
    pub fn new(build_name: impl Into<String>, provisioners: Vec<ProvisionerEntry>) -> Self {
        Self { build_name: build_name.into(), provisioners }
    }
}

#[async_trait]
impl Hook for ProvisionHook {
    async fn run(
        &self,
        event: &str,
        ui: Arc<dyn Ui>,
        payload: Option<HookPayload>,
        token: CancelToken,
    ) -> ironcast_core::error::Result<()> {
        if event != HOOK_PROVISION {
            return Ok(());
        }

        // A builder dispatching provision without a communicator is a
        // contract violation, not a skippable condition.
        let comm = match payload {
            Some(HookPayload::Provision { communicator }) => communicator,
            _ => return Err(CoreError::HookPayload { event: event.to_string() }),
        };

        for entry in &self.provisioners {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if !entry.filter.allows(&self.build_name) {
                debug!(
                    provisioner = %entry.type_name,
                    build = %self.build_name,
                    "provisioner filtered out for this build"
                );
                continue;
            }

            ui.say(&format!("Provisioning with {}...", entry.type_name));
            entry
                .inner
                .provision(token.clone(), Arc::clone(&ui), Arc::clone(&comm))
                .await?;
        }

        Ok(())
    }
}
