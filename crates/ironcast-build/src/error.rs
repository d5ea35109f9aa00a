//! Error types for build coordination

use ironcast_core::error::CoreError;
use thiserror::Error;

/// Build-level error taxonomy
///
/// The coordinator never reinterprets a build's error; it aggregates and
/// reports. Cloneable so results can carry errors into per-build slots.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Preparing a build's configuration failed
    #[error("failed to prepare build '{build}': {source}")]
    Prepare {
        build: String,
        #[source]
        source: CoreError,
    },

    /// A build's run failed
    #[error("build '{build}' failed: {source}")]
    Run {
        build: String,
        #[source]
        source: CoreError,
    },

    /// A post-processor sequence failed for a build
    #[error("post-processing for build '{build}' failed: {source}")]
    PostProcess {
        build: String,
        #[source]
        source: CoreError,
    },

    /// Run was requested before prepare
    #[error("build '{build}' has not been prepared")]
    NotPrepared { build: String },

    /// The build was cancelled before it could start
    #[error("build '{build}' was cancelled")]
    Cancelled { build: String },

    /// Core contract error
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Check whether this error records a cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Run { source, .. } | Self::Prepare { source, .. } => source.is_cancellation(),
            Self::Core(source) => source.is_cancellation(),
            _ => false,
        }
    }
}
