/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The signed state and its atomic reservation count.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::SystemTime;

use typed_builder::TypedBuilder;

use super::{ReservationAction, ReservationError, ReservedSignedState};
use crate::types::data_types::{CryptoHash, Round};

/// Reservation count of a state whose last reservation was released.
pub const DESTROYED: i64 = -1;

/// The ledger state held by a [`SignedState`], e.g., the root of a Merkle tree backed by off-heap
/// storage.
pub trait StateSnapshot: Send + 'static {
    /// Tear down the resources held by the snapshot. Called at most once, may be slow.
    fn release(self);
}

/// Immutable snapshot of the ledger state at the end of a consensus round.
///
/// `SignedState`s are shared between threads as `Arc<SignedState<S>>`, and reserved through
/// [`ReservedSignedState`] handles. See the [module documentation](super) for the lifecycle.
///
/// ## Reservation history
///
/// When built with `reservation_history(true)`, the state keeps the id and reason of every
/// outstanding reservation, available through
/// [`outstanding_reservations`](Self::outstanding_reservations). This helps find the consumer that
/// holds on to a state for too long, at the price of a lock on every reservation.
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SignedState]. On the builder call the following methods to construct a valid [SignedState].

    Required:
    - `.round(...)`
    - `.state_hash(...)`
    - `.snapshot(...)`

    Optional:
    - `.consensus_timestamp(...)`
    - `.state_to_save(...)`
    - `.reservation_history(...)`
"))]
pub struct SignedState<S: StateSnapshot> {
    #[builder(setter(doc = "Set the consensus round at the end of which the state was taken. Required."))]
    round: Round,
    #[builder(setter(doc = "Set the root hash of the state. Required."))]
    state_hash: CryptoHash,
    #[builder(setter(transform = |snapshot: S| Mutex::new(Some(snapshot)),
    doc = "Set the snapshot of the ledger state. Required."))]
    snapshot: Mutex<Option<S>>,
    #[builder(default = SystemTime::now(), setter(doc = "Set the consensus timestamp of the round. Optional, defaults to now."))]
    consensus_timestamp: SystemTime,
    #[builder(default, setter(doc = "Mark the state as one that must be written to disk. Optional."))]
    state_to_save: bool,
    #[builder(default, setter(transform = |record: bool| record.then(|| Mutex::new(BTreeMap::new())),
    doc = "Record the reason of every outstanding reservation. Optional."))]
    reservation_history: Option<Mutex<BTreeMap<u64, String>>>,
    #[builder(default, setter(skip))]
    reservations: AtomicI64,
    #[builder(default, setter(skip))]
    teardown_deferred: AtomicBool,
}

impl<S: StateSnapshot> SignedState<S> {
    /// Take a reservation on `state`.
    ///
    /// Fails with [`ReservationError::ReferenceCountViolation`] if the state is already destroyed.
    pub fn reserve(
        state: &Arc<SignedState<S>>,
        reason: &str,
    ) -> Result<ReservedSignedState<S>, ReservationError> {
        ReservedSignedState::create_and_reserve(Arc::clone(state), reason)
    }

    /// Take a reservation on `state`, unless it is already destroyed.
    pub fn try_reserve(state: &Arc<SignedState<S>>, reason: &str) -> Option<ReservedSignedState<S>> {
        ReservedSignedState::try_create_and_reserve(Arc::clone(state), reason)
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn state_hash(&self) -> CryptoHash {
        self.state_hash
    }

    pub fn consensus_timestamp(&self) -> SystemTime {
        self.consensus_timestamp
    }

    pub fn is_state_to_save(&self) -> bool {
        self.state_to_save
    }

    /// Get the current reservation count, or [`DESTROYED`].
    pub fn reservation_count(&self) -> i64 {
        self.reservations.load(Ordering::Acquire)
    }

    /// Check whether the last reservation of the state has been released.
    pub fn is_destroyed(&self) -> bool {
        self.reservation_count() == DESTROYED
    }

    /// Check whether the snapshot's resources have been torn down.
    pub fn is_torn_down(&self) -> bool {
        lock(&self.snapshot).is_none()
    }

    /// Run `f` on the snapshot, unless it has already been torn down.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        lock(&self.snapshot).as_ref().map(f)
    }

    /// Get the id and reason of every outstanding reservation, in the order they were taken.
    ///
    /// Returns `None` if the state does not record its reservation history.
    pub fn outstanding_reservations(&self) -> Option<Vec<(u64, String)>> {
        self.reservation_history.as_ref().map(|history| {
            lock(history)
                .iter()
                .map(|(id, reason)| (*id, reason.clone()))
                .collect()
        })
    }

    /// Add one reservation to the count.
    pub(crate) fn increment_reservations(
        &self,
        reservation_id: u64,
        reason: &str,
    ) -> Result<(), ReservationError> {
        let mut current = self.reservations.load(Ordering::Acquire);
        loop {
            if current == DESTROYED {
                return Err(self.violation(ReservationAction::Reserve, current));
            }

            match self.reservations.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if let Some(history) = &self.reservation_history {
            lock(history).insert(reservation_id, reason.to_string());
        }

        Ok(())
    }

    /// Give back one reservation. If it was the last one, the state becomes destroyed, and its
    /// snapshot is torn down unless the garbage collector is responsible for that.
    pub(crate) fn decrement_reservations(&self, reservation_id: u64) -> Result<(), ReservationError> {
        if let Some(history) = &self.reservation_history {
            lock(history).remove(&reservation_id);
        }

        let mut current = self.reservations.load(Ordering::Acquire);
        let was_last = loop {
            if current <= 0 {
                return Err(self.violation(ReservationAction::Release, current));
            }

            let next = if current == 1 { DESTROYED } else { current - 1 };
            match self.reservations.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break current == 1,
                Err(actual) => current = actual,
            }
        };

        if was_last && !self.teardown_deferred.load(Ordering::SeqCst) {
            self.teardown();
        }

        Ok(())
    }

    /// Leave the teardown of the snapshot to the garbage collector's heartbeat.
    pub(crate) fn defer_teardown(&self) {
        self.teardown_deferred.store(true, Ordering::SeqCst);
    }

    /// Release the snapshot's resources if the state is destroyed and the snapshot has not been torn
    /// down yet. Returns whether this call tore the snapshot down.
    pub(crate) fn teardown(&self) -> bool {
        if !self.is_destroyed() {
            return false;
        }

        // Take the snapshot out first so that the lock is not held during the release.
        let snapshot = lock(&self.snapshot).take();
        match snapshot {
            Some(snapshot) => {
                snapshot.release();
                true
            }
            None => false,
        }
    }

    fn violation(&self, action: ReservationAction, reservation_count: i64) -> ReservationError {
        ReservationError::ReferenceCountViolation {
            round: self.round,
            action,
            reservation_count,
        }
    }
}

impl<S: StateSnapshot> Debug for SignedState<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedState")
            .field("round", &self.round)
            .field("state_hash", &self.state_hash)
            .field("reservations", &self.reservation_count())
            .field("state_to_save", &self.state_to_save)
            .finish()
    }
}

// A poisoned lock only means that a snapshot's release panicked on another thread. The data behind
// these locks is never left half-updated, so it is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
