/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Detection of creators that publish two different children of the same parent event.
//!
//! ## Branches
//!
//! An honest creator builds a single chain of events: each of its events names the creator's
//! previous event as its self-parent. A creator *branches* when it publishes an event whose
//! self-parent is not the most recent event the detector has seen from that creator, or when it
//! publishes a parentless event while one of its earlier events is still non-ancient.
//!
//! Branch detection is best effort over the non-ancient window only. Once the evidence of a branch
//! (the sibling and the shared parent) has become ancient it is forgotten, and an event that would
//! have revealed the branch is no longer flagged.
//!
//! ## Components
//!
//! - [`DefaultBranchDetector`] decides per event whether it is a branch, and keeps per-creator
//!   bookkeeping including the number and weight of creators currently branching.
//! - [`BranchReporter`] wraps a detector, and adds rate-limited logging, [metrics](BranchMetrics)
//!   and [events](crate::events::BranchDetectedEvent).
//!
//! ## Threading
//!
//! Neither component synchronizes internally. Calls to `add_event`, `update_event_window` and
//! `clear` on one instance must be serialized by the caller, typically by running them in a single
//! pipeline stage.
//!
//! ## Delivery order
//!
//! Events from different creators may arrive in any order. Events from the *same* creator must be
//! delivered in topological order, which the intake pipeline guarantees before events reach this
//! module. An older event from a creator that arrives after a newer one is reported as a branch.

pub mod detector;

pub mod metrics;

pub mod reporter;

pub use detector::DefaultBranchDetector;
pub use metrics::BranchMetrics;
pub use reporter::{BranchReporter, BranchReporterConfiguration};

use crate::types::{
    data_types::TotalWeight,
    event::{EventDescriptor, EventError, PlatformEvent},
    event_window::{AncientMode, EventWindow},
};

/// Decides whether events are branches, within a continuously advancing [`EventWindow`].
pub trait BranchDetector {
    /// Check whether `event` is a branch, and record it as the most recent event of its creator.
    ///
    /// Returns the descriptor of `event` if it is a branch, and `None` if it is not, or if it is
    /// ancient.
    ///
    /// # Preconditions
    ///
    /// An event window must have been set with [`update_event_window`](Self::update_event_window).
    fn add_event(
        &mut self,
        event: &PlatformEvent,
    ) -> Result<Option<EventDescriptor>, BranchDetectorError>;

    /// Replace the current event window, forgetting all history that became ancient.
    fn update_event_window(&mut self, event_window: EventWindow)
        -> Result<(), BranchDetectorError>;

    /// Forget all history and unset the event window.
    fn clear(&mut self);

    /// Get the number of creators that currently have a non-ancient branching event.
    fn branching_node_count(&self) -> usize;

    /// Get the sum of the weights of the creators counted by
    /// [`branching_node_count`](Self::branching_node_count).
    fn branching_weight(&self) -> TotalWeight;

    /// Get the total weight of the roster the detector was constructed with.
    fn total_weight(&self) -> TotalWeight;

    /// Get the fraction of the roster's weight that is currently branching.
    fn branching_weight_fraction(&self) -> f64 {
        self.branching_weight().fraction_of(self.total_weight())
    }
}

/// Enumerates the different ways a call to a [`BranchDetector`]'s methods can fail.
///
/// Every variant signals a bug in the calling pipeline, not misbehavior of a creator.
#[derive(Debug)]
pub enum BranchDetectorError {
    /// An event was added before any event window was set.
    EventWindowNotSet,

    /// An attempt was made to move the ancient threshold backwards. This violates the invariant that
    /// event windows are non-decreasing.
    EventWindowRegression {
        /// The ancient threshold currently in effect.
        current_threshold: u64,

        /// The lower ancient threshold the caller tried to apply.
        new_threshold: u64,
    },

    /// An event window expressed in a different ancient mode than the current one was applied.
    AncientModeMismatch {
        current_mode: AncientMode,
        new_mode: AncientMode,
    },

    /// See: [`EventError`].
    EventError(EventError),
}

impl From<EventError> for BranchDetectorError {
    fn from(value: EventError) -> Self {
        BranchDetectorError::EventError(value)
    }
}
