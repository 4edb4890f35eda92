/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the [BranchReporter]. Time is controlled with a [ManualClock], so that the log cooldown
//! can be crossed without sleeping.

mod common;

use std::time::Duration;

use hashgraph_integrity::branch_detection::{
    BranchDetectorError, BranchReporter, BranchReporterConfiguration, DefaultBranchDetector,
};
use hashgraph_integrity::branch_detection::metrics::BranchMetricsSnapshot;
use hashgraph_integrity::types::event_window::{AncientMode, EventWindow};
use log::LevelFilter;

use common::clock::ManualClock;
use common::events::*;
use common::logging::setup_logger;

const COOLDOWN: Duration = Duration::from_secs(60);

fn reporter(nodes: u64, clock: &ManualClock) -> BranchReporter<DefaultBranchDetector, ManualClock> {
    BranchReporter::from_parts(
        DefaultBranchDetector::with_event_window(
            equal_weight_roster(nodes),
            EventWindow::genesis(AncientMode::BirthRoundThreshold),
        ),
        clock.clone(),
        BranchReporterConfiguration {
            log_cooldown: COOLDOWN,
        },
    )
}

#[test]
fn branches_update_metrics() {
    setup_logger(LevelFilter::Info);

    let clock = ManualClock::new();
    let mut reporter = reporter(8, &clock);
    let metrics = reporter.metrics();

    let honest = first_event(0, 1);
    assert_eq!(reporter.report_branch(&honest).unwrap(), None);
    assert_eq!(metrics.branch_events(), 0);

    let fork_point = first_event(3, 10);
    let b = child_event(&fork_point, 11, Vec::new());
    let c = child_event(&fork_point, 11, Vec::new());
    reporter.report_branch(&fork_point).unwrap();
    reporter.report_branch(&b).unwrap();
    assert_eq!(
        reporter.report_branch(&c).unwrap(),
        Some(c.descriptor().unwrap())
    );

    assert_eq!(
        metrics.snapshot(),
        BranchMetricsSnapshot {
            branch_events: 1,
            branching_nodes: 1,
            branching_weight_fraction: 0.125,
            suppressed_log_messages: 0,
        }
    );

    // The gauges follow the window, the counter does not.
    reporter
        .update_event_window(birth_round_window(12, 12))
        .unwrap();
    assert_eq!(metrics.branch_events(), 1);
    assert_eq!(metrics.branching_nodes(), 0);
    assert_eq!(metrics.branching_weight_fraction(), 0.0);
}

#[test]
fn branch_log_messages_are_rate_limited_per_creator() {
    setup_logger(LevelFilter::Info);

    let clock = ManualClock::new();
    let mut reporter = reporter(4, &clock);
    let metrics = reporter.metrics();

    // Every parentless event after the first one is a branch.
    for _ in 0..5 {
        reporter.report_branch(&first_event(0, 1)).unwrap();
    }
    assert_eq!(metrics.branch_events(), 4);
    assert_eq!(metrics.suppressed_log_messages(), 3);

    // A different creator has its own cooldown.
    reporter.report_branch(&first_event(1, 1)).unwrap();
    reporter.report_branch(&first_event(1, 1)).unwrap();
    assert_eq!(metrics.suppressed_log_messages(), 3);

    clock.advance(COOLDOWN - Duration::from_secs(1));
    reporter.report_branch(&first_event(0, 1)).unwrap();
    assert_eq!(metrics.suppressed_log_messages(), 4);

    clock.advance(Duration::from_secs(1));
    reporter.report_branch(&first_event(0, 1)).unwrap();
    assert_eq!(metrics.suppressed_log_messages(), 4);
    assert_eq!(metrics.branch_events(), 7);
    assert_eq!(metrics.branching_nodes(), 2);
}

#[test]
fn clear_resets_gauges_and_keeps_cooldowns() {
    setup_logger(LevelFilter::Info);

    let clock = ManualClock::new();
    let mut reporter = reporter(4, &clock);
    let metrics = reporter.metrics();

    reporter.report_branch(&first_event(2, 1)).unwrap();
    reporter.report_branch(&first_event(2, 1)).unwrap();
    assert_eq!(metrics.branching_nodes(), 1);

    reporter.clear();
    assert_eq!(metrics.branching_nodes(), 0);
    assert_eq!(metrics.branching_weight_fraction(), 0.0);
    assert_eq!(metrics.branch_events(), 1);

    reporter
        .update_event_window(EventWindow::genesis(AncientMode::BirthRoundThreshold))
        .unwrap();
    reporter.report_branch(&first_event(2, 1)).unwrap();
    reporter.report_branch(&first_event(2, 1)).unwrap();
    assert_eq!(metrics.branch_events(), 2);
    assert_eq!(metrics.suppressed_log_messages(), 1);
}

#[test]
fn reporting_before_any_window_fails() {
    setup_logger(LevelFilter::Info);

    let clock = ManualClock::new();
    let mut reporter = BranchReporter::from_parts(
        DefaultBranchDetector::new(equal_weight_roster(4)),
        clock,
        BranchReporterConfiguration::default(),
    );

    assert!(matches!(
        reporter.report_branch(&first_event(0, 1)),
        Err(BranchDetectorError::EventWindowNotSet)
    ));
    assert_eq!(reporter.metrics().branch_events(), 0);
}
