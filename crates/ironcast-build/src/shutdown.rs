//! Interrupt handling
//!
//! The first interrupt cancels builds gracefully so cleanup can run; a
//! second interrupt escalates to an abort that skips cleanup.

use std::sync::Arc;

use ironcast_core::cancel::CancelToken;
use ironcast_core::ui::Ui;
use tokio::signal;
use tracing::{info, warn};

/// Install the two-stage interrupt handler on the given token
pub fn setup_signal_handlers(token: CancelToken, ui: Arc<dyn Ui>) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            warn!("failed to listen for interrupt signals");
            return;
        }
        info!("interrupt received, cancelling builds");
        ui.error("Interrupt received. Cancelling builds; cleanup will run...");
        ui.error("Interrupt again to abort immediately without cleanup.");
        token.cancel();

        if signal::ctrl_c().await.is_err() {
            return;
        }
        info!("second interrupt received, aborting");
        ui.error("Second interrupt received. Aborting without cleanup.");
        token.abort();
    });
}
