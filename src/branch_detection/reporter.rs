/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Wraps a [`BranchDetector`] to turn detected branches into log lines, metrics and events.

use std::collections::HashMap;
use std::sync::{mpsc::Sender, Arc};
use std::time::{Duration, Instant, SystemTime};

use super::{BranchDetector, BranchDetectorError, BranchMetrics, DefaultBranchDetector};
use crate::clock::{Clock, SystemClock};
use crate::events::{BranchDetectedEvent, Event, UpdateEventWindowEvent};
use crate::logging::first_seven_base64_chars;
use crate::types::{
    data_types::NodeId,
    event::{EventDescriptor, PlatformEvent},
    event_window::EventWindow,
    roster::Roster,
};

/// Default minimum time between two branch log messages about the same creator.
pub const DEFAULT_BRANCH_LOG_COOLDOWN: Duration = Duration::from_secs(60);

/// Configuration parameters for the [`BranchReporter`].
#[derive(Clone, Debug)]
pub struct BranchReporterConfiguration {
    /// Minimum time between two branch log messages about the same creator.
    pub log_cooldown: Duration,
}

impl Default for BranchReporterConfiguration {
    fn default() -> Self {
        Self {
            log_cooldown: DEFAULT_BRANCH_LOG_COOLDOWN,
        }
    }
}

// Per-creator state of the log rate limiter.
struct LogCooldown {
    last_logged: Instant,
    suppressed: u64,
}

/// Reports the branches found by a [`BranchDetector`].
///
/// For every branch, the reporter:
/// 1. Logs an error, unless it already logged one about the same creator within the configured
///    [cooldown](BranchReporterConfiguration::log_cooldown).
/// 2. Updates its [`BranchMetrics`].
/// 3. Publishes a [`BranchDetectedEvent`], if it is connected to an event bus.
///
/// A branch is reported data, not an error: `report_branch` only fails for the same contract
/// violations as the wrapped detector.
pub struct BranchReporter<D: BranchDetector = DefaultBranchDetector, C: Clock = SystemClock> {
    detector: D,
    clock: C,
    config: BranchReporterConfiguration,
    log_cooldowns: HashMap<NodeId, LogCooldown>,
    metrics: Arc<BranchMetrics>,
    event_publisher: Option<Sender<Event>>,
}

impl BranchReporter<DefaultBranchDetector, SystemClock> {
    /// Create a reporter around a [`DefaultBranchDetector`] for `roster`, using the system clock.
    pub fn new(roster: Roster, config: BranchReporterConfiguration) -> Self {
        Self::from_parts(DefaultBranchDetector::new(roster), SystemClock, config)
    }
}

impl<D: BranchDetector, C: Clock> BranchReporter<D, C> {
    /// Create a reporter around an existing `detector`, taking time from `clock`.
    pub fn from_parts(detector: D, clock: C, config: BranchReporterConfiguration) -> Self {
        Self {
            detector,
            clock,
            config,
            log_cooldowns: HashMap::new(),
            metrics: Arc::new(BranchMetrics::new()),
            event_publisher: None,
        }
    }

    /// Connect the reporter to an event bus.
    pub(crate) fn with_event_publisher(mut self, event_publisher: Option<Sender<Event>>) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    /// Check `event` for a branch and report it if it is one.
    ///
    /// Returns what the wrapped detector's [`add_event`](BranchDetector::add_event) returns.
    pub fn report_branch(
        &mut self,
        event: &PlatformEvent,
    ) -> Result<Option<EventDescriptor>, BranchDetectorError> {
        let branch = self.detector.add_event(event)?;

        if let Some(descriptor) = &branch {
            self.metrics.record_branch_event();
            self.update_gauges();
            self.log_branch(descriptor);

            Event::publish(
                &self.event_publisher,
                Event::BranchDetected(BranchDetectedEvent {
                    timestamp: SystemTime::now(),
                    event: *descriptor,
                    branching_node_count: self.detector.branching_node_count(),
                    branching_weight_fraction: self.detector.branching_weight_fraction(),
                }),
            );
        }

        Ok(branch)
    }

    /// Pass `event_window` to the wrapped detector and refresh the branching gauges.
    pub fn update_event_window(
        &mut self,
        event_window: EventWindow,
    ) -> Result<(), BranchDetectorError> {
        self.detector.update_event_window(event_window)?;
        self.update_gauges();

        Event::publish(
            &self.event_publisher,
            Event::UpdateEventWindow(UpdateEventWindowEvent {
                timestamp: SystemTime::now(),
                event_window,
                branching_node_count: self.detector.branching_node_count(),
            }),
        );

        Ok(())
    }

    /// Clear the wrapped detector and reset the branching gauges.
    ///
    /// Log cooldowns survive a clear, so that repeatedly clearing cannot be used to flood the log.
    pub fn clear(&mut self) {
        self.detector.clear();
        self.update_gauges();
    }

    /// Get a handle to the reporter's metrics.
    pub fn metrics(&self) -> Arc<BranchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    fn update_gauges(&self) {
        self.metrics.set_branching(
            self.detector.branching_node_count(),
            self.detector.branching_weight_fraction(),
        );
    }

    fn log_branch(&mut self, descriptor: &EventDescriptor) {
        let now = self.clock.now();
        let cooldown = self.config.log_cooldown;

        let suppressed = match self.log_cooldowns.get_mut(&descriptor.creator) {
            Some(state) if now.saturating_duration_since(state.last_logged) < cooldown => {
                state.suppressed += 1;
                self.metrics.record_suppressed_log_message();
                return;
            }
            Some(state) => state.suppressed,
            None => 0,
        };

        log::error!(
            "Node {} is branching. Branching event: {}, birth round: {}, generation: {}, \
             {} branching nodes, {:.4} of roster weight branching ({} similar messages suppressed)",
            descriptor.creator,
            first_seven_base64_chars(&descriptor.hash.bytes()),
            descriptor.birth_round,
            descriptor.generation,
            self.detector.branching_node_count(),
            self.detector.branching_weight_fraction(),
            suppressed
        );

        self.log_cooldowns.insert(
            descriptor.creator,
            LogCooldown {
                last_logged: now,
                suppressed: 0,
            },
        );
    }
}
