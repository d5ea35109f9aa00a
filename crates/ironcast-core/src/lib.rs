//! Core contracts for the ironcast build engine
//!
//! This crate defines the capability surfaces the engine is built from:
//! builders, provisioners, post-processors, communicators, artifacts and
//! hooks, plus the template model and cancellation primitives they share.

pub mod artifact;
pub mod builder;
pub mod cancel;
pub mod communicator;
pub mod error;
pub mod hook;
pub mod postprocessor;
pub mod provisioner;
pub mod template;
pub mod ui;

pub use artifact::{Artifact, ArtifactRef};
pub use builder::{
    Builder, CONFIG_BUILDER_TYPE, CONFIG_BUILD_NAME, CONFIG_DEBUG, CONFIG_FORCE, CONFIG_ON_ERROR,
};
pub use cancel::CancelToken;
pub use communicator::{Cmd, CommError, CommResult, CommandOutput, Communicator, RemoteCommand};
pub use error::{CoreError, Result};
pub use hook::{Hook, HookBus, HookPayload, NoopHook, HOOK_PROVISION};
pub use postprocessor::{PostProcessed, PostProcessor};
pub use provisioner::Provisioner;
pub use template::{
    interpolate, merge_config, BuilderDef, PostProcessorDef, PostProcessorEntry, ProvisionerDef,
    RunFilter, Template,
};
pub use ui::{BasicUi, NoopUi, Ui};
