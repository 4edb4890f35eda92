/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Background teardown of fully released signed states.
//!
//! Tearing down the Merkle and virtual map resources of a snapshot is slow, and must never happen on
//! a thread that consensus depends on. The component that produces signed states therefore hands
//! every new state to the [`StateGarbageCollector`] with [`register_state`](StateGarbageCollector::register_state).
//! From then on:
//! 1. The collector is responsible for tearing the state down.
//! 2. The reservation that came with the registration is given back immediately, so the state lives
//!    exactly as long as the consumers that reserved it.
//! 3. On every [`heartbeat`](StateGarbageCollector::heartbeat), the collector tears down the registered
//!    states whose last reservation was released. States that are still reserved stay queued.
//!
//! The heartbeat is driven by an external scheduler, or by the thread started with
//! [`start_heartbeat`].

pub mod collector;

pub mod heartbeat;

pub mod metrics;

pub use collector::StateGarbageCollector;
pub use heartbeat::start_heartbeat;
pub use metrics::GarbageCollectorMetrics;

use std::time::Duration;

use crate::signed_state::{ReservationError, ReservedSignedState, StateSnapshot};
use crate::types::{data_types::Round, event::PlatformEvent};

/// Default time between two heartbeats of the garbage collector.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(200);

/// Configuration parameters for the garbage collector's heartbeat thread.
#[derive(Clone, Debug)]
pub struct GarbageCollectorConfiguration {
    /// Time between two heartbeats.
    pub heartbeat_period: Duration,
}

impl Default for GarbageCollectorConfiguration {
    fn default() -> Self {
        Self {
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
        }
    }
}

/// A round that reached consensus, together with the events it contains.
///
/// The events are kept alive until the state created from the round is torn down.
#[derive(Clone, Debug)]
pub struct ConsensusRound {
    pub round: Round,
    pub events: Vec<PlatformEvent>,
}

impl ConsensusRound {
    pub fn new(round: Round, events: Vec<PlatformEvent>) -> ConsensusRound {
        Self { round, events }
    }
}

/// A newly produced signed state, and the round it was produced from.
pub struct StateAndRound<S: StateSnapshot> {
    pub reserved_state: ReservedSignedState<S>,
    pub round: ConsensusRound,
}

impl<S: StateSnapshot> StateAndRound<S> {
    pub fn new(reserved_state: ReservedSignedState<S>, round: ConsensusRound) -> StateAndRound<S> {
        Self {
            reserved_state,
            round,
        }
    }
}

/// Enumerates the different ways a call to a [`StateGarbageCollector`]'s methods can fail.
#[derive(Debug)]
pub enum GarbageCollectorError {
    /// See: [`ReservationError`].
    ReservationError(ReservationError),
}

impl From<ReservationError> for GarbageCollectorError {
    fn from(value: ReservationError) -> Self {
        GarbageCollectorError::ReservationError(value)
    }
}
