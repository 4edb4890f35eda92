/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Garbage collector metrics. All counters except `queued_states` are monotonic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct GarbageCollectorMetrics {
    registered_states: AtomicU64,
    destroyed_states: AtomicU64,
    queued_states: AtomicU64,
    total_teardown_micros: AtomicU64,
    max_teardown_micros: AtomicU64,
}

/// Point-in-time copy of [`GarbageCollectorMetrics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GarbageCollectorMetricsSnapshot {
    pub registered_states: u64,
    pub destroyed_states: u64,
    pub queued_states: u64,
    pub total_teardown_micros: u64,
    pub max_teardown_micros: u64,
}

impl GarbageCollectorMetrics {
    pub const fn new() -> Self {
        Self {
            registered_states: AtomicU64::new(0),
            destroyed_states: AtomicU64::new(0),
            queued_states: AtomicU64::new(0),
            total_teardown_micros: AtomicU64::new(0),
            max_teardown_micros: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_registration(&self, queued_states: usize) {
        self.registered_states.fetch_add(1, Ordering::Relaxed);
        self.queued_states
            .store(queued_states as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_teardown(&self, teardown_time: Duration) {
        let micros = teardown_time.as_micros() as u64;
        self.destroyed_states.fetch_add(1, Ordering::Relaxed);
        self.total_teardown_micros
            .fetch_add(micros, Ordering::Relaxed);
        self.max_teardown_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub(crate) fn set_queued_states(&self, queued_states: usize) {
        self.queued_states
            .store(queued_states as u64, Ordering::Relaxed);
    }

    pub fn registered_states(&self) -> u64 {
        self.registered_states.load(Ordering::Relaxed)
    }

    pub fn destroyed_states(&self) -> u64 {
        self.destroyed_states.load(Ordering::Relaxed)
    }

    /// Number of registered states that have not been torn down yet.
    pub fn queued_states(&self) -> u64 {
        self.queued_states.load(Ordering::Relaxed)
    }

    pub fn avg_teardown_micros(&self) -> u64 {
        let destroyed = self.destroyed_states();
        if destroyed == 0 {
            0
        } else {
            self.total_teardown_micros.load(Ordering::Relaxed) / destroyed
        }
    }

    pub fn snapshot(&self) -> GarbageCollectorMetricsSnapshot {
        GarbageCollectorMetricsSnapshot {
            registered_states: self.registered_states(),
            destroyed_states: self.destroyed_states(),
            queued_states: self.queued_states(),
            total_teardown_micros: self.total_teardown_micros.load(Ordering::Relaxed),
            max_teardown_micros: self.max_teardown_micros.load(Ordering::Relaxed),
        }
    }
}

impl Default for GarbageCollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
