//! Post-processor chain execution
//!
//! Each template entry is a sequence of post-processors. Sequences run
//! sequentially within and fan out in parallel across, bounded by the
//! coordinator's limiter. The chain owns artifact conservation: an input
//! either survives (some post-processor keeps it) or is destroyed exactly
//! once after every sequence has finished with it.

use std::sync::Arc;

use ironcast_core::artifact::ArtifactRef;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::postprocessor::PostProcessor;
use ironcast_core::template::RunFilter;
use ironcast_core::ui::Ui;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A configured post-processor within a sequence
#[derive(Clone)]
pub struct PostProcessorSlot {
    /// Name used by `-except` filtering; empty names are skipped silently
    pub name: String,
    /// Configured `keep_input_artifact` vote
    pub keep_input: bool,
    /// `only`/`except` filter keyed on the build name
    pub filter: RunFilter,
    pub inner: Arc<dyn PostProcessor>,
}

/// Result of running every sequence over one input artifact
pub struct ChainOutcome {
    /// Final artifacts in sequence order; the input itself when it survived
    pub artifacts: Vec<ArtifactRef>,
    /// One error per failed sequence; other sequences are unaffected
    pub errors: Vec<CoreError>,
}

struct SequenceOutcome {
    last: ArtifactRef,
    keep_input: bool,
    error: Option<CoreError>,
}

/// Run all sequences over `input`
///
/// `except` carries post-processor names excluded on the command line;
/// excluding one skips the rest of its sequence as well.
pub async fn run_chain(
    token: CancelToken,
    ui: Arc<dyn Ui>,
    build_name: &str,
    except: &[String],
    input: ArtifactRef,
    sequences: Vec<Vec<PostProcessorSlot>>,
    limiter: Option<Arc<Semaphore>>,
) -> ChainOutcome {
    if sequences.is_empty() {
        return ChainOutcome { artifacts: vec![input], errors: Vec::new() };
    }

    let mut handles = Vec::with_capacity(sequences.len());
    for sequence in sequences {
        let token = token.child();
        let ui = Arc::clone(&ui);
        let build_name = build_name.to_string();
        let except = except.to_vec();
        let input = Arc::clone(&input);
        let limiter = limiter.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match &limiter {
                Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        return SequenceOutcome {
                            last: input,
                            keep_input: false,
                            error: Some(CoreError::Cancelled),
                        }
                    }
                },
                None => None,
            };
            run_sequence(token, ui, &build_name, &except, input, sequence).await
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                warn!("post-processor sequence task failed: {join_err}");
                outcomes.push(SequenceOutcome {
                    last: Arc::clone(&input),
                    keep_input: false,
                    error: Some(CoreError::post_process("sequence", "task panicked")),
                });
            }
        }
    }

    let mut artifacts: Vec<ArtifactRef> = Vec::new();
    let mut errors = Vec::new();
    let mut keep_input = false;

    for outcome in outcomes {
        keep_input |= outcome.keep_input;
        if Arc::ptr_eq(&outcome.last, &input) {
            // Sequence passed the input through untouched; the artifact
            // survives as a result, deduplicated across sequences.
            keep_input = true;
            if !artifacts.iter().any(|a| Arc::ptr_eq(a, &input)) {
                artifacts.push(Arc::clone(&input));
            }
        } else {
            artifacts.push(outcome.last);
        }
        if let Some(error) = outcome.error {
            errors.push(error);
        }
    }

    if keep_input && !artifacts.iter().any(|a| Arc::ptr_eq(a, &input)) {
        artifacts.push(Arc::clone(&input));
    }

    if !keep_input {
        debug!(artifact = %input.id(), "destroying superseded input artifact");
        if let Err(e) = input.destroy().await {
            warn!("failed to destroy input artifact: {e}");
        }
    }

    ChainOutcome { artifacts, errors }
}

async fn run_sequence(
    token: CancelToken,
    ui: Arc<dyn Ui>,
    build_name: &str,
    except: &[String],
    input: ArtifactRef,
    sequence: Vec<PostProcessorSlot>,
) -> SequenceOutcome {
    let mut current = Arc::clone(&input);
    let mut keep_input = false;
    let mut error = None;

    for slot in &sequence {
        if slot.name.is_empty() {
            continue;
        }
        if except.iter().any(|n| n == &slot.name) || !slot.filter.allows(build_name) {
            // An excluded post-processor takes the rest of its sequence
            // with it; downstream processors expect its output.
            debug!(
                post_processor = %slot.name,
                "post-processor excluded, skipping remainder of sequence"
            );
            break;
        }
        if token.is_cancelled() {
            error = Some(CoreError::Cancelled);
            break;
        }

        ui.say(&format!("Running post-processor: {}", slot.name));
        match slot
            .inner
            .post_process(token.clone(), Arc::clone(&ui), Arc::clone(&current))
            .await
        {
            Ok(result) => {
                let keep = result.keep_input || result.force_keep || slot.keep_input;
                if Arc::ptr_eq(&result.artifact, &current) {
                    // Pass-through; nothing changes hands.
                    continue;
                }
                if Arc::ptr_eq(&current, &input) {
                    keep_input |= keep;
                } else if !keep {
                    debug!(artifact = %current.id(), "destroying intermediate artifact");
                    if let Err(e) = current.destroy().await {
                        warn!("failed to destroy intermediate artifact: {e}");
                    }
                }
                current = result.artifact;
            }
            Err(e) => {
                ui.error(&format!("Post-processor '{}' failed: {e}", slot.name));
                error = Some(e);
                break;
            }
        }
    }

    SequenceOutcome { last: current, keep_input, error }
}
