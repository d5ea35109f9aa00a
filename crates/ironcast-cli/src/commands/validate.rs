//! Validate command implementation
//!
//! Parses the template and prepares every build without running anything;
//! prepare is side-effect-free, so this is safe to run anywhere.

use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use ironcast_core::template::Template;

use super::{assemble_builds, load_vars};
use crate::commands::build::{EXIT_BUILD_FAILED, EXIT_INVALID};

pub struct ValidateCommand {
    pub template_path: PathBuf,
    pub vars: Vec<String>,
    pub var_file: Option<PathBuf>,
}

impl ValidateCommand {
    /// Check the template; returns the process exit code
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

        let mut builds = match assemble_builds(&template) {
            Ok(builds) => builds,
            Err(e) => {
                eprintln!("Template is invalid: {e}");
                return Ok(EXIT_BUILD_FAILED);
            }
        };

        let mut errors = Vec::new();
        for build in &mut builds {
            match build.prepare().await {
                Ok(warnings) => {
                    for warning in warnings {
                        println!("Warning: build '{}': {warning}", build.name());
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        if !errors.is_empty() {
            for error in &errors {
                eprintln!("Error: {error}");
            }
            return Ok(EXIT_BUILD_FAILED);
        }

        println!("Template validated successfully.");
        Ok(0)
    }
}
