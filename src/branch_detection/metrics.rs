/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Branch detection metrics. No allocations, no locks, just atomics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Observations published by the [`BranchReporter`](super::BranchReporter).
///
/// The reporter is the only writer. Any number of exporters may read concurrently.
#[derive(Debug)]
pub struct BranchMetrics {
    branch_events: AtomicU64,
    branching_nodes: AtomicU64,
    // Bit pattern of an f64.
    branching_weight_fraction: AtomicU64,
    suppressed_log_messages: AtomicU64,
}

/// Point-in-time copy of [`BranchMetrics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BranchMetricsSnapshot {
    pub branch_events: u64,
    pub branching_nodes: u64,
    pub branching_weight_fraction: f64,
    pub suppressed_log_messages: u64,
}

impl BranchMetrics {
    pub const fn new() -> Self {
        Self {
            branch_events: AtomicU64::new(0),
            branching_nodes: AtomicU64::new(0),
            branching_weight_fraction: AtomicU64::new(0),
            suppressed_log_messages: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_branch_event(&self) {
        self.branch_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed_log_message(&self) {
        self.suppressed_log_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_branching(&self, branching_nodes: usize, branching_weight_fraction: f64) {
        self.branching_nodes
            .store(branching_nodes as u64, Ordering::Relaxed);
        self.branching_weight_fraction
            .store(branching_weight_fraction.to_bits(), Ordering::Relaxed);
    }

    /// Monotonic count of branching events reported.
    pub fn branch_events(&self) -> u64 {
        self.branch_events.load(Ordering::Relaxed)
    }

    /// Number of creators that currently have a non-ancient branching event.
    pub fn branching_nodes(&self) -> u64 {
        self.branching_nodes.load(Ordering::Relaxed)
    }

    /// Weight of the branching creators divided by the total roster weight, in `[0.0, 1.0]`.
    pub fn branching_weight_fraction(&self) -> f64 {
        f64::from_bits(self.branching_weight_fraction.load(Ordering::Relaxed))
    }

    /// Number of branch log messages that were dropped by the per-creator cooldown.
    pub fn suppressed_log_messages(&self) -> u64 {
        self.suppressed_log_messages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BranchMetricsSnapshot {
        BranchMetricsSnapshot {
            branch_events: self.branch_events(),
            branching_nodes: self.branching_nodes(),
            branching_weight_fraction: self.branching_weight_fraction(),
            suppressed_log_messages: self.suppressed_log_messages(),
        }
    }
}

impl Default for BranchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
