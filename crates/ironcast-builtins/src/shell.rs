//! The `shell` provisioner
//!
//! Runs inline commands on the machine being built through whatever
//! communicator the builder supplied.

use std::sync::Arc;

use async_trait::async_trait;
use ironcast_core::cancel::CancelToken;
use ironcast_core::communicator::{run_command, Cmd, CommError, Communicator};
use ironcast_core::error::CoreError;
use ironcast_core::provisioner::Provisioner;
use ironcast_core::template::merge_config;
use ironcast_core::ui::Ui;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ShellConfig {
    /// Commands to run, in order
    inline: Vec<String>,
    /// KEY=value pairs exported before each command
    environment_vars: Vec<String>,
    /// Per-command deadline in seconds; 0 disables the deadline
    timeout: u64,
    /// Retry budget for transient communicator failures
    max_retries: u32,
}

/// Provisioner running inline shell commands
#[derive(Default)]
pub struct ShellProvisioner {
    config: ShellConfig,
}

#[async_trait]
impl Provisioner for ShellProvisioner {
    async fn prepare(&mut self, raws: &[serde_json::Value]) -> ironcast_core::Result<()> {
        let config: ShellConfig = serde_json::from_value(merge_config(raws))?;

        let mut errs = Vec::new();
        if config.inline.is_empty() {
            errs.push("inline commands are required".to_string());
        }
        for var in &config.environment_vars {
            if !var.contains('=') {
                errs.push(format!("environment variable '{var}' must be KEY=value"));
            }
        }

        if !errs.is_empty() {
            return Err(CoreError::ConfigErrors(errs));
        }
        self.config = config;
        Ok(())
    }

    async fn provision(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        comm: Arc<dyn Communicator>,
    ) -> ironcast_core::Result<()> {
        let env_prefix: String = self
            .config
            .environment_vars
            .iter()
            .map(|var| format!("export {var}; "))
            .collect();

        for command in &self.config.inline {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            ui.message(command);
            debug!(%command, "running shell command");

            let output = self
                .run_with_retries(&token, &ui, comm.as_ref(), command, &env_prefix)
                .await?;

            for line in output.stdout_string().lines() {
                ui.message(line);
            }
            if let Err(e) = output.success() {
                return Err(CoreError::provision(
                    "shell",
                    format!("command '{command}' failed: {e}"),
                ));
            }
        }
        Ok(())
    }
}

impl ShellProvisioner {
    /// Run one command, retrying transient communicator failures up to the
    /// configured budget; a deadline expiry surfaces as a timeout error
    async fn run_with_retries(
        &self,
        token: &CancelToken,
        ui: &Arc<dyn Ui>,
        comm: &dyn Communicator,
        command: &str,
        env_prefix: &str,
    ) -> ironcast_core::Result<ironcast_core::communicator::CommandOutput> {
        let mut attempt = 0;
        loop {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let run = run_command(comm, token.clone(), Cmd::new(format!("{env_prefix}{command}")));
            let result = match self.config.timeout {
                0 => run.await,
                secs => {
                    match tokio::time::timeout(std::time::Duration::from_secs(secs), run).await {
                        Ok(result) => result,
                        Err(_) => Err(CommError::Timeout),
                    }
                }
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    ui.message(&format!(
                        "Transient failure ({e}); retrying ({attempt}/{})",
                        self.config.max_retries
                    ));
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
