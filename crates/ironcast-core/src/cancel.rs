//! Cooperative cancellation tokens
//!
//! Cancellation flows through a tree: a global token for the whole
//! invocation, a child per build, and further children for steps that spawn
//! helpers. Cancelling a parent is observed by every descendant; cancelling
//! a child leaves its parent untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

struct Inner {
    cancelled: AtomicBool,
    aborted: AtomicBool,
    notify: watch::Sender<bool>,
    parent: Option<CancelToken>,
}

/// A cheaply clonable cancellation handle
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a root token
    pub fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                notify,
                parent: None,
            }),
        }
    }

    /// Create a child token that observes this token's cancellation
    pub fn child(&self) -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                notify,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Request graceful cancellation of this token and its descendants
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let _ = self.inner.notify.send(true);
    }

    /// Escalate to an abort: descendants must stop without cleanup
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        self.cancel();
    }

    /// Check whether this token or any ancestor was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self.inner.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Check whether this token or any ancestor was aborted
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
            || self.inner.parent.as_ref().is_some_and(|p| p.is_aborted())
    }

    /// Wait until this token or any ancestor is cancelled
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let mut rx = self.inner.notify.subscribe();
        match &self.inner.parent {
            Some(parent) => {
                tokio::select! {
                    _ = rx.wait_for(|fired| *fired) => {}
                    _ = Box::pin(parent.cancelled()) => {}
                }
            }
            None => {
                let _ = rx.wait_for(|fired| *fired).await;
            }
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_cancel_observed_by_child() {
        let root = CancelToken::new();
        let child = root.child();
        let grandchild = child.child();

        assert!(!grandchild.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_propagate_up() {
        let root = CancelToken::new();
        let child = root.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_fires_for_ancestor() {
        let root = CancelToken::new();
        let child = root.child();

        let waiter = tokio::spawn(async move { child.cancelled().await });
        root.cancel();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation not observed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_abort_implies_cancel() {
        let root = CancelToken::new();
        let child = root.child();

        root.abort();
        assert!(child.is_cancelled());
        assert!(child.is_aborted());
    }
}
