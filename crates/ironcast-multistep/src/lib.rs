//! Multi-step execution for ironcast builders
//!
//! A builder's run is a sequence of steps over a shared state bag. The
//! runner guarantees LIFO cleanup on success, failure and cancellation.

pub mod runner;
pub mod state;

pub use runner::{
    policy_prompt, ErrorChoice, ErrorPromptFn, PauseFn, Step, StepAction, StepRunner,
};
pub use state::{
    StateBag, STATE_CANCELLED, STATE_CONFIG, STATE_DEBUG, STATE_DRIVER, STATE_ERROR, STATE_FORCE,
    STATE_HALTED, STATE_HOOK, STATE_UI,
};
