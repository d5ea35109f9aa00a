//! Main CLI entry point for ironcast

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use ironcast_build::{CoordinatorOptions, OnError};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

/// ironcast - build machine images from declarative templates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    /// Colorized output
    #[arg(
        long,
        global = true,
        value_name = "BOOL",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the builds defined in a template
    Build {
        /// Template file to build from
        template: PathBuf,

        /// Pause between steps and disable parallelism
        #[arg(long)]
        debug: bool,

        /// Allow rebuilding over prior artifacts
        #[arg(long)]
        force: bool,

        /// Run only the named builds
        #[arg(long, value_delimiter = ',', value_name = "NAMES")]
        only: Vec<String>,

        /// Skip the named builds or post-processors
        #[arg(long, value_delimiter = ',', value_name = "NAMES")]
        except: Vec<String>,

        /// Failure policy for in-flight builds
        #[arg(long, default_value = "cleanup", value_parser = parse_on_error, value_name = "POLICY")]
        on_error: OnError,

        /// Maximum concurrent builds (0 = unlimited)
        #[arg(long, default_value_t = 0, value_name = "N")]
        parallel_builds: usize,

        /// Prefix each UI line with an RFC3339 timestamp
        #[arg(long)]
        timestamp_ui: bool,

        /// Template variable, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// JSON file of template variables
        #[arg(long, value_name = "FILE")]
        var_file: Option<PathBuf>,
    },

    /// Check that a template is syntactically valid and prepares cleanly
    Validate {
        /// Template file to check
        template: PathBuf,

        /// Template variable, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// JSON file of template variables
        #[arg(long, value_name = "FILE")]
        var_file: Option<PathBuf>,
    },
}

fn parse_on_error(s: &str) -> Result<OnError, String> {
    s.parse().map_err(|e: ironcast_core::error::CoreError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet, cli.color)?;

    let result = match cli.command {
        Commands::Build {
            template,
            debug,
            force,
            only,
            except,
            on_error,
            parallel_builds,
            timestamp_ui,
            vars,
            var_file,
        } => {
            let command = commands::BuildCommand {
                template_path: template,
                options: CoordinatorOptions {
                    parallel_builds,
                    only,
                    except,
                    on_error,
                    debug,
                    force,
                },
                vars,
                var_file,
                timestamp_ui,
                color: cli.color,
            };
            command.execute().await
        }

        Commands::Validate { template, vars, var_file } => {
            let command = commands::ValidateCommand {
                template_path: template,
                vars,
                var_file,
            };
            command.execute().await
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            eprintln!("Error: {e}");
            // Invocation-level failures: unreadable files, bad variables.
            std::process::exit(2);
        }
    }
}

fn setup_logging(verbose: u8, quiet: u8, color: bool) -> Result<()> {
    let log_level = match (verbose, quiet) {
        (0, 0) => "warn",
        (1, 0) => "info",
        (2, 0) => "debug",
        (v, 0) if v > 2 => "trace",
        (0, 1) => "error",
        (0, q) if q >= 2 => "off",
        _ => "warn",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
