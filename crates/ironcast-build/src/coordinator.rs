//! Parallel build coordination
//!
//! Runs many builds concurrently with bounded parallelism. Builds launch in
//! template order and results are reported in that order regardless of
//! completion order. Cancellation flows through a tree of tokens: the
//! caller's token, a fleet token shared by all builds, and a child per
//! build.

use std::str::FromStr;
use std::sync::Arc;

use ironcast_core::artifact::ArtifactRef;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::template::RunFilter;
use ironcast_core::ui::Ui;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::build::CoreBuild;
use crate::chain;
use crate::error::{BuildError, Result};

/// Failure policy for in-flight sibling builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Cancel siblings but let cleanup run
    #[default]
    Cleanup,
    /// Cancel siblings and skip cleanup
    Abort,
    /// Prompt the operator at the failing step; siblings keep running
    Ask,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Abort => "abort",
            Self::Ask => "ask",
        }
    }
}

impl FromStr for OnError {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cleanup" => Ok(Self::Cleanup),
            "abort" => Ok(Self::Abort),
            "ask" => Ok(Self::Ask),
            other => Err(CoreError::config(format!(
                "invalid on-error policy '{other}', expected cleanup, abort or ask"
            ))),
        }
    }
}

/// Options controlling a coordinator run
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Maximum concurrent builds; 0 means unlimited
    pub parallel_builds: usize,
    /// Run only these builds
    pub only: Vec<String>,
    /// Skip these builds and post-processors
    pub except: Vec<String>,
    pub on_error: OnError,
    /// Pause between steps and force serial execution
    pub debug: bool,
    /// Allow rebuilding over prior artifacts
    pub force: bool,
}

/// Terminal state of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Per-build result slot, reported in template order
#[derive(Debug)]
pub struct BuildOutcome {
    pub name: String,
    pub status: BuildStatus,
    pub artifacts: Vec<ArtifactRef>,
    pub error: Option<BuildError>,
}

impl BuildOutcome {
    fn cancelled(name: String) -> Self {
        Self {
            name: name.clone(),
            status: BuildStatus::Cancelled,
            artifacts: Vec::new(),
            error: Some(BuildError::Cancelled { build: name }),
        }
    }
}

/// Orchestrates N concurrent builds and their post-processor chains
pub struct BuildCoordinator {
    options: CoordinatorOptions,
}

impl BuildCoordinator {
    pub fn new(options: CoordinatorOptions) -> Self {
        Self { options }
    }

    /// Run the selected builds to completion
    ///
    /// Fails before launching anything when filtering leaves no builds or
    /// any prepare reports an error. Individual build failures are carried
    /// in the returned outcomes, not the Err channel.
    pub async fn run(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        builds: Vec<CoreBuild>,
    ) -> Result<Vec<BuildOutcome>> {
        let filter = RunFilter::new(self.options.only.clone(), self.options.except.clone());
        let mut selected: Vec<CoreBuild> = builds
            .into_iter()
            .filter(|b| filter.allows(b.name()))
            .collect();
        if selected.is_empty() {
            return Err(BuildError::Core(CoreError::NoBuildsMatched));
        }

        let parallel = if self.options.debug && self.options.parallel_builds != 1 {
            ui.say("Debug mode enabled: limiting build parallelism to 1");
            1
        } else {
            self.options.parallel_builds
        };

        // Prepare everything before running anything; prepare is
        // side-effect-free so failing here leaves nothing to undo.
        let mut prepare_failures = Vec::new();
        for build in &mut selected {
            build.set_debug(self.options.debug);
            build.set_force(self.options.force);
            build.set_on_error(self.options.on_error);
            match build.prepare().await {
                Ok(warnings) => {
                    for warning in warnings {
                        ui.say(&format!("Warning: build '{}': {warning}", build.name()));
                    }
                }
                Err(e) => prepare_failures.push(e.to_string()),
            }
        }
        if !prepare_failures.is_empty() {
            return Err(BuildError::Core(CoreError::ConfigErrors(prepare_failures)));
        }

        let limiter = match parallel {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let fleet = token.child();
        let except: Arc<Vec<String>> = Arc::new(self.options.except.clone());
        let on_error = self.options.on_error;

        info!(builds = selected.len(), parallel, "launching builds");

        let mut names = Vec::with_capacity(selected.len());
        let mut handles = Vec::with_capacity(selected.len());
        for build in selected {
            names.push(build.name().to_string());
            handles.push(tokio::spawn(run_one(
                build,
                fleet.clone(),
                limiter.clone(),
                Arc::clone(&ui),
                Arc::clone(&except),
                on_error,
            )));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in names.into_iter().zip(handles) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_err) => {
                    warn!(build = %name, "build task panicked: {join_err}");
                    outcomes.push(BuildOutcome {
                        name: name.clone(),
                        status: BuildStatus::Failed,
                        artifacts: Vec::new(),
                        error: Some(BuildError::Run {
                            build: name,
                            source: CoreError::step("build task", "panicked"),
                        }),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

async fn run_one(
    build: CoreBuild,
    fleet: CancelToken,
    limiter: Option<Arc<Semaphore>>,
    ui: Arc<dyn Ui>,
    except: Arc<Vec<String>>,
    on_error: OnError,
) -> BuildOutcome {
    let name = build.name().to_string();

    let permit = match &limiter {
        Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => return BuildOutcome::cancelled(name),
        },
        None => None,
    };
    if fleet.is_cancelled() {
        debug!(build = %name, "cancelled before start");
        return BuildOutcome::cancelled(name);
    }

    let build_token = fleet.child();
    ui.say(&format!("==> {name}: starting build"));

    match build.run(build_token.clone(), Arc::clone(&ui)).await {
        Ok(artifact) => {
            // Release the build slot before post-processing; chain
            // sequences draw from the same limiter.
            drop(permit);

            let mut artifacts = Vec::new();
            let mut status = BuildStatus::Succeeded;
            let mut error = None;

            if let Some(artifact) = artifact {
                let outcome = chain::run_chain(
                    build_token,
                    Arc::clone(&ui),
                    &name,
                    &except,
                    artifact,
                    build.post_processors(),
                    limiter,
                )
                .await;
                artifacts = outcome.artifacts;
                if let Some(e) = outcome.errors.into_iter().next() {
                    status = BuildStatus::Failed;
                    error = Some(BuildError::PostProcess { build: name.clone(), source: e });
                }
            }

            ui.say(&format!("==> {name}: build finished"));
            BuildOutcome { name, status, artifacts, error }
        }
        Err(e) => {
            if e.is_cancellation() {
                ui.say(&format!("==> {name}: build cancelled"));
                return BuildOutcome {
                    name,
                    status: BuildStatus::Cancelled,
                    artifacts: Vec::new(),
                    error: Some(e),
                };
            }

            ui.error(&format!("==> {name}: {e}"));
            match on_error {
                OnError::Abort => {
                    ui.error("Aborting remaining builds without cleanup");
                    fleet.abort();
                }
                OnError::Cleanup => fleet.cancel(),
                OnError::Ask => {}
            }
            BuildOutcome {
                name,
                status: BuildStatus::Failed,
                artifacts: Vec::new(),
                error: Some(e),
            }
        }
    }
}
