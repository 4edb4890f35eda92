/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the integrity layer's
//! [configuration](crate::integrity_layer::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [BranchDetected](crate::events::BranchDetectedEvent) is printed:
//!
//! ```text
//! BranchDetected, 1701329264, 3, Id5u7f6, 11, 1, 0.125
//! ```
//!
//! In the snippet:
//! - The third value is the id of the branching creator.
//! - The fourth value is the first seven characters of the Base64 encoding of the hash of the event
//!   that revealed the branch.
//! - The fifth value is the birth round of that event.
//! - The sixth value is the number of creators currently known to be branching.
//! - The seventh value is the fraction of the roster's weight that is currently branching.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const BRANCH_DETECTED: &str = "BranchDetected";
pub const UPDATE_EVENT_WINDOW: &str = "UpdateEventWindow";
pub const REGISTER_STATE: &str = "RegisterState";
pub const DESTROY_STATE: &str = "DestroyState";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for BranchDetectedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |branch_detected_event: &BranchDetectedEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                BRANCH_DETECTED,
                secs_since_unix_epoch(branch_detected_event.timestamp),
                branch_detected_event.event.creator,
                first_seven_base64_chars(&branch_detected_event.event.hash.bytes()),
                branch_detected_event.event.birth_round,
                branch_detected_event.branching_node_count,
                branch_detected_event.branching_weight_fraction
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateEventWindowEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_event_window_event: &UpdateEventWindowEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}, {}",
                UPDATE_EVENT_WINDOW,
                secs_since_unix_epoch(update_event_window_event.timestamp),
                update_event_window_event.event_window.latest_consensus_round(),
                update_event_window_event.event_window.ancient_threshold(),
                update_event_window_event.event_window.ancient_mode(),
                update_event_window_event.branching_node_count
            )
        };
        Box::new(logger)
    }
}

impl Logger for RegisterStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |register_state_event: &RegisterStateEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                REGISTER_STATE,
                secs_since_unix_epoch(register_state_event.timestamp),
                register_state_event.round,
                first_seven_base64_chars(&register_state_event.state_hash.bytes()),
                register_state_event.queued_states
            )
        };
        Box::new(logger)
    }
}

impl Logger for DestroyStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |destroy_state_event: &DestroyStateEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                DESTROY_STATE,
                secs_since_unix_epoch(destroy_state_event.timestamp),
                destroy_state_event.round,
                first_seven_base64_chars(&destroy_state_event.state_hash.bytes()),
                destroy_state_event.teardown_time.as_micros()
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Timestamps before the Unix Epoch are printed as 0.
pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
