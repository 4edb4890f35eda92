/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reference-counted ownership of immutable ledger state snapshots.
//!
//! ## Lifecycle of a signed state
//!
//! A [`SignedState`] starts *unreserved*, with a reservation count of 0, owned implicitly by the
//! component that created it. Consumers take reservations on it through
//! [`ReservedSignedState`] handles. Every handle owns exactly one reservation, and gives it back
//! exactly once: either explicitly through [`close`](ReservedSignedState::close), or implicitly
//! when the handle is dropped.
//!
//! When the last outstanding reservation is given back, the reservation count is atomically
//! replaced by the [`DESTROYED`] sentinel. Exactly one releasing thread observes this transition.
//! The destroyed state is absorbing: every later attempt to reserve the state fails with
//! [`ReservationError::ReferenceCountViolation`], except the
//! [`try_get_and_reserve`](ReservedSignedState::try_get_and_reserve) family, which returns `None`.
//!
//! ```text
//!  Unreserved (0) ──reserve──▶ Reserved (n ≥ 1) ──release last──▶ Destroyed (-1)
//!                               ▲         │
//!                               └─────────┘ reserve / release
//! ```
//!
//! ## Teardown
//!
//! Tearing down the resources of a snapshot can be slow. A state that was handed to the
//! [`StateGarbageCollector`](crate::garbage_collector::StateGarbageCollector) is torn down on the
//! collector's heartbeat. A state that was never handed to the collector is torn down by the thread
//! that released its last reservation.

pub mod nexus;

pub mod reserved;

pub mod state;

pub use nexus::SignedStateNexus;
pub use reserved::ReservedSignedState;
pub use state::{SignedState, StateSnapshot, DESTROYED};

use crate::types::data_types::Round;

/// The reservation operation that was being performed when a [`ReservationError`] occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationAction {
    Reserve,
    Release,
}

/// Enumerates the different ways an operation on a [`ReservedSignedState`] can fail.
#[derive(Debug)]
pub enum ReservationError {
    /// The handle is a null reservation, and there is no state to get.
    NullReservation,

    /// The reservation count of the state did not allow the requested action. Either the state is
    /// already destroyed, or a reservation is given back that was never taken.
    ReferenceCountViolation {
        round: Round,
        action: ReservationAction,
        reservation_count: i64,
    },
}
