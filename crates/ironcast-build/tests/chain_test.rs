//! Post-processor chain semantics
//!
//! Sequence halts, keep-input voting, `-except` skipping the remainder of
//! a sequence, and artifact conservation.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use ironcast_build::chain::{run_chain, PostProcessorSlot};
use ironcast_core::cancel::CancelToken;
use ironcast_core::template::RunFilter;
use ironcast_core::ui::{NoopUi, Ui};

fn slot(pp: MockPostProcessor) -> PostProcessorSlot {
    PostProcessorSlot {
        name: pp.label.clone(),
        keep_input: false,
        filter: RunFilter::default(),
        inner: Arc::new(pp),
    }
}

fn keeping_slot(pp: MockPostProcessor) -> PostProcessorSlot {
    PostProcessorSlot { keep_input: true, ..slot(pp) }
}

fn ui() -> Arc<dyn Ui> {
    Arc::new(NoopUi)
}

#[tokio::test]
async fn test_failing_sequence_skips_remainder_but_not_other_sequences() {
    let log = op_log();
    let (input, destroyed) = MockArtifact::new("input");

    let sequences = vec![
        vec![
            slot(MockPostProcessor::new("p1", &log)),
            slot(MockPostProcessor::new("p2", &log).failing()),
            slot(MockPostProcessor::new("p3", &log)),
        ],
        vec![slot(MockPostProcessor::new("q1", &log))],
    ];

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        input,
        sequences,
        None,
    )
    .await;

    let recorded = entries(&log);
    assert!(recorded.contains(&"pp:p1".to_string()));
    assert!(recorded.contains(&"pp:p2".to_string()));
    assert!(!recorded.contains(&"pp:p3".to_string()));
    assert!(recorded.contains(&"pp:q1".to_string()));

    assert_eq!(outcome.errors.len(), 1);
    // Neither p1 nor q1 kept the input, so it is destroyed exactly once.
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keep_input_vote_preserves_artifact() {
    let log = op_log();
    let (input, destroyed) = MockArtifact::new("input");

    let sequences = vec![vec![
        keeping_slot(MockPostProcessor::new("p1", &log)),
        slot(MockPostProcessor::new("p2", &log)),
    ]];

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        Arc::clone(&input),
        sequences,
        None,
    )
    .await;

    assert!(outcome.errors.is_empty());
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    assert!(
        outcome.artifacts.iter().any(|a| Arc::ptr_eq(a, &input)),
        "kept input must appear in the results"
    );
}

#[tokio::test]
async fn test_unkept_input_destroyed_exactly_once_across_sequences() {
    let log = op_log();
    let (input, destroyed) = MockArtifact::new("input");

    let sequences = vec![
        vec![slot(MockPostProcessor::new("p1", &log))],
        vec![slot(MockPostProcessor::new("q1", &log))],
    ];

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        input,
        sequences,
        None,
    )
    .await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_except_skips_rest_of_sequence_and_passes_input_through() {
    let log = op_log();
    let (input, destroyed) = MockArtifact::new("input");

    let sequences = vec![vec![
        slot(MockPostProcessor::new("p1", &log).passing_through()),
        slot(MockPostProcessor::new("p2", &log)),
        slot(MockPostProcessor::new("p3", &log)),
    ]];

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &["p2".to_string()],
        Arc::clone(&input),
        sequences,
        None,
    )
    .await;

    let recorded = entries(&log);
    assert_eq!(recorded, vec!["pp:p1"]);

    // The input artifact is passed through unchanged.
    assert!(outcome.errors.is_empty());
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.artifacts.len(), 1);
    assert!(Arc::ptr_eq(&outcome.artifacts[0], &input));
}

#[tokio::test]
async fn test_build_filter_excludes_sequence_remainder() {
    let log = op_log();
    let (input, _destroyed) = MockArtifact::new("input");

    let mut filtered = slot(MockPostProcessor::new("p1", &log));
    filtered.filter = RunFilter::new(vec!["other-build".to_string()], Vec::new());
    let sequences = vec![vec![filtered, slot(MockPostProcessor::new("p2", &log))]];

    run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        input,
        sequences,
        None,
    )
    .await;

    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_unnamed_post_processor_ignored_silently() {
    let log = op_log();
    let (input, _destroyed) = MockArtifact::new("input");

    let mut unnamed = slot(MockPostProcessor::new("ignored", &log));
    unnamed.name = String::new();
    let sequences = vec![vec![unnamed, slot(MockPostProcessor::new("p2", &log))]];

    run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        input,
        sequences,
        None,
    )
    .await;

    // The unnamed slot is skipped without taking the sequence with it.
    assert_eq!(entries(&log), vec!["pp:p2"]);
}

#[tokio::test]
async fn test_intermediate_artifacts_destroyed_when_replaced() {
    let log = op_log();
    let (input, input_destroyed) = MockArtifact::new("input");

    // p1 replaces the input, p2 replaces p1's output; p1's output is an
    // intermediate and must be destroyed when superseded.
    let sequences = vec![vec![
        slot(MockPostProcessor::new("p1", &log)),
        slot(MockPostProcessor::new("p2", &log)),
    ]];

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        input,
        sequences,
        None,
    )
    .await;

    assert_eq!(input_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].id(), "p2-output");
}

#[tokio::test]
async fn test_no_sequences_passes_input_through() {
    let (input, destroyed) = MockArtifact::new("input");

    let outcome = run_chain(
        CancelToken::new(),
        ui(),
        "primary",
        &[],
        Arc::clone(&input),
        Vec::new(),
        None,
    )
    .await;

    assert_eq!(outcome.artifacts.len(), 1);
    assert!(Arc::ptr_eq(&outcome.artifacts[0], &input));
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
}
