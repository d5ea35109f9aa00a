//! The `file` builder
//!
//! Produces an image that is simply a file on disk, either from inline
//! content or by copying a source file. Small enough to be useful for
//! pipeline smoke tests, yet it runs the full lifecycle: a step sequence
//! over a state bag, the provision hook over a local-exec communicator,
//! and an artifact at the end.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use ironcast_core::artifact::ArtifactRef;
use ironcast_core::builder::Builder;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::hook::{Hook, HookPayload, HOOK_PROVISION};
use ironcast_core::template::merge_config;
use ironcast_core::ui::Ui;
use ironcast_multistep::{
    policy_prompt, PauseFn, StateBag, Step, StepAction, StepRunner, STATE_CONFIG, STATE_DEBUG,
    STATE_FORCE, STATE_HOOK, STATE_UI,
};
use serde::Deserialize;
use tracing::debug;

use crate::artifact::FileArtifact;

/// Stable public identifier of artifacts produced by this builder
pub const BUILDER_ID: &str = "ironcast.file";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    /// Path of the file to produce
    target: String,
    /// Inline contents of the target
    content: Option<String>,
    /// Copy this file instead of writing inline content
    source: Option<String>,

    #[serde(rename = "ironcast_build_name")]
    build_name: String,
    #[serde(rename = "ironcast_debug")]
    debug: bool,
    #[serde(rename = "ironcast_force")]
    force: bool,
    #[serde(rename = "ironcast_on_error")]
    on_error: String,
}

/// Builder writing a single file as its image
#[derive(Default)]
pub struct FileBuilder {
    config: FileConfig,
}

#[async_trait]
impl Builder for FileBuilder {
    async fn prepare(&mut self, raws: &[serde_json::Value]) -> ironcast_core::Result<Vec<String>> {
        let config: FileConfig = serde_json::from_value(merge_config(raws))?;

        let mut errs = Vec::new();
        let mut warnings = Vec::new();

        if config.target.is_empty() {
            errs.push("target is required".to_string());
        }
        if config.content.is_some() && config.source.is_some() {
            errs.push("only one of content or source may be specified".to_string());
        }
        if config.content.is_none() && config.source.is_none() {
            warnings.push(
                "neither content nor source is set; an empty target will be created".to_string(),
            );
        }

        if !errs.is_empty() {
            return Err(CoreError::ConfigErrors(errs));
        }
        self.config = config;
        Ok(warnings)
    }

    async fn run(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn Hook>,
    ) -> ironcast_core::Result<Option<ArtifactRef>> {
        let target = PathBuf::from(&self.config.target);

        let state = StateBag::new();
        state.put(STATE_CONFIG, self.config.clone());
        state.put(STATE_UI, Arc::clone(&ui));
        state.put(STATE_HOOK, Arc::clone(&hook));
        state.put(STATE_DEBUG, self.config.debug);
        state.put(STATE_FORCE, self.config.force);

        let comm_root = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf());

        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(StepCheckTarget {
                target: target.clone(),
                force: self.config.force,
            }),
            Box::new(StepWriteTarget {
                target: target.clone(),
                content: self.config.content.clone(),
                source: self.config.source.clone().map(PathBuf::from),
            }),
            Box::new(StepProvision { comm_root }),
        ];

        let mut runner = StepRunner::new(steps);
        if let Some(prompt) = policy_prompt(&self.config.on_error, Arc::clone(&ui)) {
            runner = runner.with_error_prompt(prompt);
        }
        if self.config.debug {
            let pause_ui = Arc::clone(&ui);
            let pause: PauseFn = Arc::new(move |name, _state| {
                let ui = Arc::clone(&pause_ui);
                let name = name.to_string();
                async move {
                    let _ = ui.ask(&format!(
                        "Pausing after step '{name}'. Press enter to continue."
                    ));
                }
                .boxed()
            });
            runner = runner.with_pause(pause);
        }

        runner.run(token.child(), &state).await;

        if let Some(error) = state.error() {
            return Err(error);
        }
        if state.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if state.is_halted() {
            return Err(CoreError::Halted);
        }

        ui.say(&format!(
            "Build '{}' stored file: {}",
            self.config.build_name,
            target.display()
        ));
        Ok(Some(Arc::new(FileArtifact::new(BUILDER_ID, vec![target]))))
    }
}

/// Refuses to overwrite an existing target unless forced
struct StepCheckTarget {
    target: PathBuf,
    force: bool,
}

#[async_trait]
impl Step for StepCheckTarget {
    fn name(&self) -> &str {
        "check target"
    }

    async fn execute(&self, _token: CancelToken, state: &StateBag) -> StepAction {
        if self.target.exists() && !self.force {
            state.set_error(CoreError::step(
                self.name(),
                format!(
                    "target '{}' already exists; rerun with -force to overwrite",
                    self.target.display()
                ),
            ));
            return StepAction::Halt;
        }
        StepAction::Continue
    }
}

/// Writes or copies the target file
struct StepWriteTarget {
    target: PathBuf,
    content: Option<String>,
    source: Option<PathBuf>,
}

#[async_trait]
impl Step for StepWriteTarget {
    fn name(&self) -> &str {
        "write target"
    }

    async fn execute(&self, token: CancelToken, state: &StateBag) -> StepAction {
        if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                state.set_error(CoreError::step(self.name(), e.to_string()));
                return StepAction::Halt;
            }
        }

        let write = async {
            match (&self.content, &self.source) {
                (Some(content), _) => {
                    tokio::fs::write(&self.target, content).await?;
                }
                (None, Some(source)) => {
                    tokio::fs::copy(source, &self.target).await?;
                }
                (None, None) => {
                    tokio::fs::write(&self.target, b"").await?;
                }
            }
            Ok::<_, std::io::Error>(())
        };

        tokio::select! {
            result = write => match result {
                Ok(()) => StepAction::Continue,
                Err(e) => {
                    state.set_error(CoreError::step(self.name(), e.to_string()));
                    StepAction::Halt
                }
            },
            _ = token.cancelled() => StepAction::Halt,
        }
    }

    async fn cleanup(&self, state: &StateBag) {
        // Leave the target in place on success; remove partial output when
        // the run failed or was interrupted.
        if state.error().is_some() || state.is_cancelled() || state.is_halted() {
            debug!(path = %self.target.display(), "removing partial target");
            let _ = tokio::fs::remove_file(&self.target).await;
        }
    }
}

/// Invites the provisioning subsystem in over a local-exec communicator
struct StepProvision {
    comm_root: Option<PathBuf>,
}

#[async_trait]
impl Step for StepProvision {
    fn name(&self) -> &str {
        "provision"
    }

    async fn execute(&self, token: CancelToken, state: &StateBag) -> StepAction {
        let hook: Arc<dyn Hook> = match state.require(STATE_HOOK) {
            Ok(hook) => hook,
            Err(e) => {
                state.set_error(e);
                return StepAction::Halt;
            }
        };
        let ui: Arc<dyn Ui> = match state.require(STATE_UI) {
            Ok(ui) => ui,
            Err(e) => {
                state.set_error(e);
                return StepAction::Halt;
            }
        };

        let mut comm = ironcast_comm::LocalExec::new();
        if let Some(root) = &self.comm_root {
            comm = comm.with_root(root.clone());
        }
        let payload = HookPayload::Provision { communicator: Arc::new(comm) };

        match hook.run(HOOK_PROVISION, ui, Some(payload), token.clone()).await {
            Ok(()) => StepAction::Continue,
            Err(e) => {
                if !token.is_cancelled() && !e.is_cancellation() {
                    state.set_error(e);
                }
                StepAction::Halt
            }
        }
    }
}
