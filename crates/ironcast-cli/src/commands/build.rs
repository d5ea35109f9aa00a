//! Build command implementation

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result};
use ironcast_build::{
    setup_signal_handlers, BuildCoordinator, BuildError, BuildStatus, CoordinatorOptions,
};
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::template::Template;
use ironcast_core::ui::Ui;
use tracing::info;

use crate::ui::{SpinnerUi, TimestampUi};

use super::{assemble_builds, load_vars};

/// Exit code for an invalid invocation: bad flags, template parse error,
/// or no builds matched
pub const EXIT_INVALID: i32 = 2;
/// Exit code when at least one build failed
pub const EXIT_BUILD_FAILED: i32 = 1;

pub struct BuildCommand {
    pub template_path: PathBuf,
    pub options: CoordinatorOptions,
    pub vars: Vec<String>,
    pub var_file: Option<PathBuf>,
    pub timestamp_ui: bool,
    /// Spinner-and-color output; plain line output when disabled
    pub color: bool,
}

impl BuildCommand {
    /// Run the builds; returns the process exit code
    pub async fn execute(&self) -> Result<i32> {
        let vars = load_vars(&self.vars, self.var_file.as_deref())?;

        let source = std::fs::read_to_string(&self.template_path).with_context(|| {
            format!("failed to read template {}", self.template_path.display())
        })?;

        let template = match Template::parse_with_vars(&source, &vars) {
            Ok(template) => template,
            Err(e) => {
                eprintln!("Template is invalid: {e}");
                return Ok(EXIT_INVALID);
            }
        };

        let builds = match assemble_builds(&template) {
            Ok(builds) => builds,
            Err(e) => {
                eprintln!("Template is invalid: {e}");
                return Ok(EXIT_INVALID);
            }
        };

        info!(
            template = %self.template_path.display(),
            builds = builds.len(),
            "starting build run"
        );

        let spinner = if self.color {
            Some(Arc::new(SpinnerUi::new("Building...")))
        } else {
            None
        };
        let base: Arc<dyn Ui> = match &spinner {
            Some(spinner) => Arc::clone(spinner) as Arc<dyn Ui>,
            None => Arc::new(ironcast_core::ui::BasicUi::stdio()),
        };
        let ui: Arc<dyn Ui> = if self.timestamp_ui {
            Arc::new(TimestampUi::new(base))
        } else {
            base
        };

        let token = CancelToken::new();
        setup_signal_handlers(token.clone(), Arc::clone(&ui));

        let coordinator = BuildCoordinator::new(self.options.clone());
        let outcomes = match coordinator.run(token, Arc::clone(&ui), builds).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                if let Some(spinner) = &spinner {
                    spinner.finish();
                }
                eprintln!("Error: {e}");
                let code = match e {
                    BuildError::Core(CoreError::NoBuildsMatched) => EXIT_INVALID,
                    _ => EXIT_BUILD_FAILED,
                };
                return Ok(code);
            }
        };
        if let Some(spinner) = &spinner {
            spinner.finish();
        }

        let mut failed = false;
        println!("\n==> Builds finished:");
        for outcome in &outcomes {
            match outcome.status {
                BuildStatus::Succeeded => {
                    println!("  {}: success", outcome.name);
                    for artifact in &outcome.artifacts {
                        println!("      {}", artifact.summary());
                    }
                }
                BuildStatus::Failed => {
                    failed = true;
                    match &outcome.error {
                        Some(e) => println!("  {}: failed: {e}", outcome.name),
                        None => println!("  {}: failed", outcome.name),
                    }
                }
                BuildStatus::Cancelled => {
                    failed = true;
                    println!("  {}: cancelled", outcome.name);
                }
            }
        }

        Ok(if failed { EXIT_BUILD_FAILED } else { 0 })
    }
}
