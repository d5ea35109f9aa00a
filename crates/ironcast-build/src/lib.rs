//! Build coordination for ironcast
//!
//! This crate wires the core contracts into a running engine: a build
//! lifecycle around each builder, the provisioner driver behind the
//! `provision` hook, post-processor chain execution, and the coordinator
//! that runs many builds concurrently.

pub mod build;
pub mod chain;
pub mod coordinator;
pub mod error;
pub mod provision;
pub mod shutdown;

pub use build::{BuildPhase, CoreBuild, PostProcessorSpec, ProvisionerSpec};
pub use chain::{run_chain, ChainOutcome, PostProcessorSlot};
pub use coordinator::{
    BuildCoordinator, BuildOutcome, BuildStatus, CoordinatorOptions, OnError,
};
pub use error::{BuildError, Result};
pub use provision::{ProvisionHook, ProvisionerEntry};
pub use shutdown::setup_signal_handlers;
