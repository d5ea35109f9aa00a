//! Error types shared by the core contracts

use thiserror::Error;

/// Core error type for build contracts
///
/// Variants carry owned strings so errors can be stored in a state bag and
/// cloned into per-build result slots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Configuration validation failed; all problems are reported at once
    #[error("{} error(s) occurred:\n\n{}", .0.len(), .0.join("\n"))]
    ConfigErrors(Vec<String>),

    /// A step's execute phase failed
    #[error("step '{step}' failed: {reason}")]
    Step { step: String, reason: String },

    /// A provisioner failed
    #[error("provisioner '{provisioner}' failed: {reason}")]
    Provision { provisioner: String, reason: String },

    /// A post-processor failed
    #[error("post-processor '{post_processor}' failed: {reason}")]
    PostProcess { post_processor: String, reason: String },

    /// A required state bag key was absent
    #[error("missing state key: {key}")]
    MissingStateKey { key: String },

    /// A hook was invoked without its required payload
    #[error("hook event '{event}' requires a payload")]
    HookPayload { event: String },

    /// Destroying an artifact failed
    #[error("failed to destroy artifact {id}: {reason}")]
    ArtifactDestroy { id: String, reason: String },

    /// The run was cancelled by an external signal
    #[error("build was cancelled")]
    Cancelled,

    /// A step halted the run
    #[error("build was halted")]
    Halted,

    /// Filtering left nothing to run
    #[error("no builds matched the given filters")]
    NoBuildsMatched,

    /// I/O operation failed
    #[error("i/o error: {0}")]
    Io(String),

    /// Template or config (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Communicator failure surfaced through a provisioner or step
    #[error(transparent)]
    Comm(#[from] crate::communicator::CommError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a single-message configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigErrors(vec![msg.into()])
    }

    /// Create a step failure error
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Step { step: step.into(), reason: reason.into() }
    }

    /// Create a provisioner failure error
    pub fn provision(provisioner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provision { provisioner: provisioner.into(), reason: reason.into() }
    }

    /// Create a post-processor failure error
    pub fn post_process(post_processor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PostProcess { post_processor: post_processor.into(), reason: reason.into() }
    }

    /// Check whether this error records an external cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Halted
                | Self::Comm(crate::communicator::CommError::Cancelled)
        )
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
