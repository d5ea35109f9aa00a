//! Named-event hook dispatch
//!
//! Builders invite shared subsystems into their run by dispatching events
//! through a hook. The reserved `provision` event carries the communicator
//! for the machine being built; the provisioning driver subscribes to it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::communicator::Communicator;
use crate::error::Result;
use crate::ui::Ui;

/// The event dispatched when the machine is ready for provisioning
pub const HOOK_PROVISION: &str = "provision";

/// Payload carried by a hook invocation
#[derive(Clone)]
pub enum HookPayload {
    /// Payload of the `provision` event
    Provision { communicator: Arc<dyn Communicator> },
    /// Extension payload for events the core does not know about
    Custom(Arc<dyn Any + Send + Sync>),
}

/// A subscriber to named events
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(
        &self,
        event: &str,
        ui: Arc<dyn Ui>,
        payload: Option<HookPayload>,
        token: CancelToken,
    ) -> Result<()>;
}

/// Ordered event-name to subscriber mapping
///
/// Registration happens at startup; dispatch is read-only afterwards.
/// Subscribers for one invocation run in registration order and the first
/// error stops the remainder. Unknown events are a no-op.
#[derive(Default)]
pub struct HookBus {
    subscribers: HashMap<String, Vec<Arc<dyn Hook>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber for an event
    pub fn register(&mut self, event: impl Into<String>, hook: Arc<dyn Hook>) {
        self.subscribers.entry(event.into()).or_default().push(hook);
    }
}

#[async_trait]
impl Hook for HookBus {
    async fn run(
        &self,
        event: &str,
        ui: Arc<dyn Ui>,
        payload: Option<HookPayload>,
        token: CancelToken,
    ) -> Result<()> {
        let Some(hooks) = self.subscribers.get(event) else {
            return Ok(());
        };
        for hook in hooks {
            hook.run(event, Arc::clone(&ui), payload.clone(), token.clone())
                .await?;
        }
        Ok(())
    }
}

/// Hook that ignores every event
#[derive(Default)]
pub struct NoopHook;

#[async_trait]
impl Hook for NoopHook {
    async fn run(
        &self,
        _event: &str,
        _ui: Arc<dyn Ui>,
        _payload: Option<HookPayload>,
        _token: CancelToken,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ui::NoopUi;

    struct RecordingHook {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Hook for RecordingHook {
        async fn run(
            &self,
            event: &str,
            _ui: Arc<dyn Ui>,
            _payload: Option<HookPayload>,
            _token: CancelToken,
        ) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, event));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_subscribers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = HookBus::new();
        bus.register(
            "boot",
            Arc::new(RecordingHook { label: "h1", log: Arc::clone(&log) }),
        );
        bus.register(
            "boot",
            Arc::new(RecordingHook { label: "h2", log: Arc::clone(&log) }),
        );

        let ui: Arc<dyn Ui> = Arc::new(NoopUi);
        bus.run("boot", Arc::clone(&ui), None, CancelToken::new())
            .await
            .unwrap();
        bus.run("boot", ui, None, CancelToken::new()).await.unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["h1:boot", "h2:boot", "h1:boot", "h2:boot"]);
    }

    #[tokio::test]
    async fn test_unknown_event_is_noop() {
        let bus = HookBus::new();
        let ui: Arc<dyn Ui> = Arc::new(NoopUi);
        bus.run("does-not-exist", ui, None, CancelToken::new())
            .await
            .unwrap();
    }
}
