/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that drives the garbage collector's heartbeat.

use std::sync::{
    mpsc::{Receiver, RecvTimeoutError},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::StateGarbageCollector;
use crate::signed_state::StateSnapshot;

/// Start a thread that calls [`heartbeat`](StateGarbageCollector::heartbeat) on `garbage_collector`
/// every `heartbeat_period`, until a message is sent on `shutdown_signal` or its sender is dropped.
///
/// The thread runs one last heartbeat before it exits.
pub fn start_heartbeat<S: StateSnapshot>(
    garbage_collector: Arc<StateGarbageCollector<S>>,
    heartbeat_period: Duration,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.recv_timeout(heartbeat_period) {
            Err(RecvTimeoutError::Timeout) => {
                garbage_collector.heartbeat();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let torn_down = garbage_collector.heartbeat();
                log::debug!(
                    "Garbage collector heartbeat stopped, {} states torn down on shutdown, {} still queued",
                    torn_down,
                    garbage_collector.queued_state_count()
                );
                return;
            }
        }
    })
}
