/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The garbage collector's registration queue and sweep.

use std::mem;
use std::sync::{mpsc::Sender, Arc, Mutex};
use std::time::{Instant, SystemTime};

use super::{metrics::GarbageCollectorMetrics, ConsensusRound, GarbageCollectorError, StateAndRound};
use crate::events::{DestroyStateEvent, Event, RegisterStateEvent};
use crate::signed_state::{state::lock, SignedState, StateSnapshot};

/// A registered state that has not been torn down yet.
struct PendingState<S: StateSnapshot> {
    state: Arc<SignedState<S>>,
    // Kept alive until the state is torn down.
    round: ConsensusRound,
    registered_at: Instant,
}

/// Tears down registered signed states once all of their reservations have been given back.
///
/// ## Concurrency
///
/// [`register_state`](Self::register_state) and [`heartbeat`](Self::heartbeat) can be called
/// concurrently from any number of threads. The queue lock is only held to push to or partition the
/// queue. Reservations are given back and snapshots are torn down after the lock is released.
pub struct StateGarbageCollector<S: StateSnapshot> {
    queue: Mutex<Vec<PendingState<S>>>,
    metrics: Arc<GarbageCollectorMetrics>,
    event_publisher: Option<Sender<Event>>,
}

impl<S: StateSnapshot> StateGarbageCollector<S> {
    pub fn new() -> StateGarbageCollector<S> {
        Self {
            queue: Mutex::new(Vec::new()),
            metrics: Arc::new(GarbageCollectorMetrics::new()),
            event_publisher: None,
        }
    }

    pub(crate) fn with_event_publisher(mut self, event_publisher: Option<Sender<Event>>) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    /// Take responsibility for tearing down the state in `state_and_round`, and give back the
    /// reservation that came with it.
    ///
    /// Fails with [`ReservationError::NullReservation`](crate::signed_state::ReservationError::NullReservation)
    /// if the handle is a null reservation, in which case nothing is registered.
    pub fn register_state(&self, state_and_round: StateAndRound<S>) -> Result<(), GarbageCollectorError> {
        let StateAndRound {
            reserved_state,
            round,
        } = state_and_round;

        let state = Arc::clone(reserved_state.get()?);
        state.defer_teardown();

        let queued_states = {
            let mut queue = lock(&self.queue);
            queue.push(PendingState {
                state: Arc::clone(&state),
                round,
                registered_at: Instant::now(),
            });
            queue.len()
        };

        // If no other consumer reserved the state, this makes it eligible for the next heartbeat.
        reserved_state.close()?;

        self.metrics.record_registration(queued_states);
        Event::publish(
            &self.event_publisher,
            Event::RegisterState(RegisterStateEvent {
                timestamp: SystemTime::now(),
                round: state.round(),
                state_hash: state.state_hash(),
                queued_states,
            }),
        );

        Ok(())
    }

    /// Tear down every registered state whose reservations have all been given back, and stop
    /// tracking them. Returns the number of states torn down.
    ///
    /// States that are still reserved are left in the queue, in registration order.
    pub fn heartbeat(&self) -> usize {
        let released = {
            let mut queue = lock(&self.queue);
            let (released, pending): (Vec<_>, Vec<_>) = mem::take(&mut *queue)
                .into_iter()
                .partition(|pending| pending.state.is_destroyed());
            *queue = pending;
            self.metrics.set_queued_states(queue.len());
            released
        };

        let mut torn_down = 0;
        for PendingState {
            state,
            round,
            registered_at,
        } in released
        {
            let start = Instant::now();
            if !state.teardown() {
                continue;
            }
            let teardown_time = start.elapsed();
            drop(round);

            torn_down += 1;
            self.metrics.record_teardown(teardown_time);
            log::debug!(
                "Tore down the state of round {} after {} ms in the queue, teardown took {} us",
                state.round(),
                registered_at.elapsed().as_millis(),
                teardown_time.as_micros(),
            );
            Event::publish(
                &self.event_publisher,
                Event::DestroyState(DestroyStateEvent {
                    timestamp: SystemTime::now(),
                    round: state.round(),
                    state_hash: state.state_hash(),
                    teardown_time,
                }),
            );
        }

        torn_down
    }

    /// Get the number of registered states that have not been torn down yet.
    pub fn queued_state_count(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn metrics(&self) -> Arc<GarbageCollectorMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<S: StateSnapshot> Default for StateGarbageCollector<S> {
    fn default() -> Self {
        Self::new()
    }
}
