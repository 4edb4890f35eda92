/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by the integrity layer, for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are published
//! into an optional channel and are consumed by the [event bus](crate::event_bus), which invokes
//! the handlers registered through [`IntegrityLayerSpec`](crate::integrity_layer::IntegrityLayerSpec).

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::types::{
    data_types::{CryptoHash, Round},
    event::EventDescriptor,
    event_window::EventWindow,
};

pub enum Event {
    // Branch detection events.
    BranchDetected(BranchDetectedEvent),
    UpdateEventWindow(UpdateEventWindowEvent),
    // Signed state lifecycle events.
    RegisterState(RegisterStateEvent),
    DestroyState(DestroyStateEvent),
}

impl Event {
    /// Send `event` to the event bus, if there is one.
    ///
    /// A disconnected event bus is not an error: the bus is shut down before the components that
    /// publish into it.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

/// A creator was found to have branched.
pub struct BranchDetectedEvent {
    pub timestamp: SystemTime,
    /// Descriptor of the event that revealed the branch.
    pub event: EventDescriptor,
    /// Number of creators currently known to be branching, after this branch was accounted for.
    pub branching_node_count: usize,
    /// Weight of the branching creators divided by the total roster weight.
    pub branching_weight_fraction: f64,
}

/// A new event window was applied to the branch detector.
pub struct UpdateEventWindowEvent {
    pub timestamp: SystemTime,
    pub event_window: EventWindow,
    /// Number of creators still known to be branching after ancient history was forgotten.
    pub branching_node_count: usize,
}

/// A signed state was handed to the garbage collector.
pub struct RegisterStateEvent {
    pub timestamp: SystemTime,
    pub round: Round,
    pub state_hash: CryptoHash,
    /// Number of states waiting to be destroyed, including this one.
    pub queued_states: usize,
}

/// The resources of a fully released signed state were torn down.
pub struct DestroyStateEvent {
    pub timestamp: SystemTime,
    pub round: Round,
    pub state_hash: CryptoHash,
    pub teardown_time: Duration,
}
