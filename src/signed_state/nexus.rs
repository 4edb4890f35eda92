/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread-safe holder of the latest signed state.

use std::mem;
use std::sync::Mutex;

use super::{state::lock, ReservationError, ReservedSignedState, StateSnapshot};
use crate::types::data_types::Round;

/// Holds a reservation on the most recent [`SignedState`](super::SignedState) produced by this node,
/// and hands out further reservations on it to any thread that asks.
///
/// The nexus starts out holding a null reservation.
pub struct SignedStateNexus<S: StateSnapshot> {
    current: Mutex<ReservedSignedState<S>>,
}

impl<S: StateSnapshot> SignedStateNexus<S> {
    pub fn new() -> SignedStateNexus<S> {
        Self {
            current: Mutex::new(ReservedSignedState::create_null_reservation()),
        }
    }

    /// Get a new reservation on the held state, or a null reservation if the nexus holds none.
    pub fn get_state(&self, reason: &str) -> ReservedSignedState<S> {
        lock(&self.current)
            .try_get_and_reserve(reason)
            .unwrap_or_else(ReservedSignedState::create_null_reservation)
    }

    /// Replace the held state with `reserved_state`, taking over its reservation, and give back the
    /// reservation on the previously held state.
    ///
    /// The previous reservation is given back after the nexus is unlocked, since giving back the last
    /// reservation of a state may tear it down.
    pub fn set_state(&self, reserved_state: ReservedSignedState<S>) -> Result<(), ReservationError> {
        let previous = mem::replace(&mut *lock(&self.current), reserved_state);
        previous.close()
    }

    /// Give back the reservation on the held state and hold a null reservation instead.
    pub fn clear(&self) -> Result<(), ReservationError> {
        self.set_state(ReservedSignedState::create_null_reservation())
    }

    /// Get the round of the held state, if there is one.
    pub fn round(&self) -> Option<Round> {
        lock(&self.current).get_nullable().map(|state| state.round())
    }
}

impl<S: StateSnapshot> Default for SignedStateNexus<S> {
    fn default() -> Self {
        Self::new()
    }
}
