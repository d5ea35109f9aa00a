//! Sequential step runner with guaranteed cleanup
//!
//! Steps execute in order; cleanup runs LIFO over every step whose execute
//! was entered, regardless of how the run ended. A panic inside execute or
//! cleanup is contained so unwinding continues.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use tracing::{debug, warn};

use crate::state::{StateBag, STATE_ERROR};

/// Directive returned by a step's execute phase
///
/// Halt is not itself an error; a step that wants to report one records it
/// under the bag's `error` key before halting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Continue,
    Halt,
}

/// A unit of work inside a builder's run
#[async_trait::async_trait]
pub trait Step: Send + Sync {
    /// Name used in error reporting and the debug pause prompt
    fn name(&self) -> &str;

    /// Perform the step's work
    async fn execute(&self, token: CancelToken, state: &StateBag) -> StepAction;

    /// Undo the step's work; called exactly once on unwind
    ///
    /// Runs even when cancellation is active and must bound its own waits.
    async fn cleanup(&self, _state: &StateBag) {}
}

/// Operator decision when a step fails under the `ask` policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorChoice {
    /// Run the failed step again
    Retry,
    /// Halt and unwind normally
    Cleanup,
    /// Halt without running any cleanup
    Abort,
}

/// Blocking confirmation invoked between steps in debug mode
pub type PauseFn = Arc<dyn Fn(&str, &StateBag) -> BoxFuture<'static, ()> + Send + Sync>;

/// Prompt invoked when a step halts with an error recorded
pub type ErrorPromptFn =
    Arc<dyn Fn(&str, &StateBag) -> BoxFuture<'static, ErrorChoice> + Send + Sync>;

/// Build the error prompt matching an on-error policy string
///
/// `cleanup` needs no prompt (halting and unwinding is the default),
/// `abort` always skips cleanup, and `ask` defers to the operator through
/// the UI, re-asking until the answer is recognized.
pub fn policy_prompt(
    policy: &str,
    ui: Arc<dyn ironcast_core::ui::Ui>,
) -> Option<ErrorPromptFn> {
    match policy {
        "abort" => Some(Arc::new(|_name, _state| {
            async { ErrorChoice::Abort }.boxed()
        })),
        "ask" => Some(Arc::new(move |name, _state| {
            let ui = Arc::clone(&ui);
            let name = name.to_string();
            async move {
                loop {
                    let answer = ui.ask(&format!(
                        "Step '{name}' failed. [c] clean up and fail, \
                         [a] abort without cleanup, [r] retry step:"
                    ));
                    match answer.as_deref().map(str::trim) {
                        Ok("c") | Err(_) => return ErrorChoice::Cleanup,
                        Ok("a") => return ErrorChoice::Abort,
                        Ok("r") => return ErrorChoice::Retry,
                        Ok(_) => continue,
                    }
                }
            }
            .boxed()
        })),
        _ => None,
    }
}

/// Executes an ordered sequence of steps over a state bag
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    pause: Option<PauseFn>,
    on_error: Option<ErrorPromptFn>,
}

impl StepRunner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps, pause: None, on_error: None }
    }

    /// Install a pause-after-step hook; used in debug mode
    pub fn with_pause(mut self, pause: PauseFn) -> Self {
        self.pause = Some(pause);
        self
    }

    /// Install the `ask` failure-policy prompt
    pub fn with_error_prompt(mut self, prompt: ErrorPromptFn) -> Self {
        self.on_error = Some(prompt);
        self
    }

    /// Run all steps, then unwind
    ///
    /// The outcome is recorded in the bag: `error` for a failing step,
    /// `cancelled` when the token fired, `halted` when a step stopped the
    /// run.
    pub async fn run(&self, token: CancelToken, state: &StateBag) {
        let mut entered = 0;
        let mut skip_cleanup = false;

        'steps: for step in &self.steps {
            if token.is_cancelled() {
                state.mark_cancelled();
                break;
            }
            entered += 1;

            loop {
                debug!(step = step.name(), "executing step");
                let outcome = AssertUnwindSafe(step.execute(token.clone(), state))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(StepAction::Continue) => {
                        if let Some(pause) = &self.pause {
                            pause(step.name(), state).await;
                        }
                        continue 'steps;
                    }
                    Ok(StepAction::Halt) => {
                        if state.error().is_some() {
                            if let Some(prompt) = &self.on_error {
                                match prompt(step.name(), state).await {
                                    ErrorChoice::Retry => {
                                        state.remove(STATE_ERROR);
                                        continue;
                                    }
                                    ErrorChoice::Cleanup => {}
                                    ErrorChoice::Abort => skip_cleanup = true,
                                }
                            }
                        }
                        state.mark_halted();
                        break 'steps;
                    }
                    Err(_) => {
                        warn!(step = step.name(), "step execute panicked");
                        state.set_error(CoreError::step(step.name(), "step panicked"));
                        state.mark_halted();
                        break 'steps;
                    }
                }
            }
        }

        if token.is_cancelled() {
            state.mark_cancelled();
        }

        if skip_cleanup || token.is_aborted() {
            debug!("abort in effect, skipping cleanup");
            return;
        }

        for step in self.steps[..entered].iter().rev() {
            debug!(step = step.name(), "cleaning up step");
            if AssertUnwindSafe(step.cleanup(state)).catch_unwind().await.is_err() {
                warn!(step = step.name(), "step cleanup panicked");
            }
        }
    }
}
