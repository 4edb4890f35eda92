/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Handles that own exactly one reservation on a [`SignedState`].

use std::fmt::{self, Debug, Formatter};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use super::{ReservationError, SignedState, StateSnapshot};

static NEXT_RESERVATION_ID: AtomicU64 = AtomicU64::new(0);

fn next_reservation_id() -> u64 {
    NEXT_RESERVATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A scoped, single-use handle that owns exactly one reservation on a [`SignedState`], or a *null
/// reservation* that owns nothing.
///
/// ## Giving the reservation back
///
/// The reservation is given back exactly once: by [`close`](Self::close), which consumes the handle,
/// or by dropping the handle. Since `close` takes the handle by value, neither a double close nor
/// the use of a closed handle can be expressed.
///
/// ## Identity
///
/// Every handle has its own [`reservation_id`](Self::reservation_id). Two handles are equal only if
/// they are the same handle, even if they reserve the same state.
pub struct ReservedSignedState<S: StateSnapshot> {
    state: Option<Arc<SignedState<S>>>,
    reason: String,
    reservation_id: u64,
    closed: bool,
}

impl<S: StateSnapshot> ReservedSignedState<S> {
    /// Take a new reservation on `state`.
    ///
    /// Fails with [`ReservationError::ReferenceCountViolation`] if `state` is already destroyed.
    pub fn create_and_reserve(
        state: Arc<SignedState<S>>,
        reason: &str,
    ) -> Result<ReservedSignedState<S>, ReservationError> {
        let reservation_id = next_reservation_id();
        state.increment_reservations(reservation_id, reason)?;

        Ok(Self {
            state: Some(state),
            reason: reason.to_string(),
            reservation_id,
            closed: false,
        })
    }

    /// Take a new reservation on `state`, or return `None` if it is already destroyed.
    pub fn try_create_and_reserve(
        state: Arc<SignedState<S>>,
        reason: &str,
    ) -> Option<ReservedSignedState<S>> {
        Self::create_and_reserve(state, reason).ok()
    }

    /// Create a handle that represents "no state". Its reason is always the empty string.
    pub fn create_null_reservation() -> ReservedSignedState<S> {
        Self {
            state: None,
            reason: String::new(),
            reservation_id: next_reservation_id(),
            closed: false,
        }
    }

    /// Get the reserved state.
    ///
    /// Fails with [`ReservationError::NullReservation`] if this is a null reservation.
    pub fn get(&self) -> Result<&Arc<SignedState<S>>, ReservationError> {
        self.state.as_ref().ok_or(ReservationError::NullReservation)
    }

    /// Get the reserved state, or `None` if this is a null reservation.
    pub fn get_nullable(&self) -> Option<&Arc<SignedState<S>>> {
        self.state.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.state.is_none()
    }

    pub fn is_not_null(&self) -> bool {
        self.state.is_some()
    }

    /// Take an additional reservation on the same state, returned as a new, independent handle.
    ///
    /// Reserving through a null reservation returns another null reservation.
    pub fn get_and_reserve(&self, reason: &str) -> Result<ReservedSignedState<S>, ReservationError> {
        match &self.state {
            Some(state) => Self::create_and_reserve(Arc::clone(state), reason),
            None => Ok(Self::create_null_reservation()),
        }
    }

    /// Like [`get_and_reserve`](Self::get_and_reserve), but returns `None` instead of failing if the
    /// state has been destroyed concurrently.
    pub fn try_get_and_reserve(&self, reason: &str) -> Option<ReservedSignedState<S>> {
        match &self.state {
            Some(state) => Self::try_create_and_reserve(Arc::clone(state), reason),
            None => Some(Self::create_null_reservation()),
        }
    }

    /// Give the reservation back.
    ///
    /// Fails with [`ReservationError::ReferenceCountViolation`] if the reservation count of the state
    /// does not account for this handle's reservation, which means that it was corrupted elsewhere.
    pub fn close(mut self) -> Result<(), ReservationError> {
        self.release()
    }

    /// Get the reason this reservation was taken for.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn reservation_id(&self) -> u64 {
        self.reservation_id
    }

    fn release(&mut self) -> Result<(), ReservationError> {
        self.closed = true;
        match self.state.take() {
            Some(state) => state.decrement_reservations(self.reservation_id),
            None => Ok(()),
        }
    }
}

impl<S: StateSnapshot> Drop for ReservedSignedState<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        if let Err(err) = self.release() {
            log::error!(
                "Failed to release reservation {} ({}) on drop: {:?}",
                self.reservation_id,
                self.reason,
                err
            );
        }
    }
}

impl<S: StateSnapshot> PartialEq for ReservedSignedState<S> {
    fn eq(&self, other: &Self) -> bool {
        self.reservation_id == other.reservation_id
    }
}

impl<S: StateSnapshot> Eq for ReservedSignedState<S> {}

impl<S: StateSnapshot> Debug for ReservedSignedState<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservedSignedState")
            .field("reservation_id", &self.reservation_id)
            .field("reason", &self.reason)
            .field("round", &self.state.as_ref().map(|state| state.round()))
            .finish()
    }
}
