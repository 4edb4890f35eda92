/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives [events](crate::events) and fires the handlers registered for them.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

// How long the event bus waits for an event before checking for a shutdown signal again.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct EventHandlers {
    pub(crate) branch_detected_handlers: Vec<HandlerPtr<BranchDetectedEvent>>,
    pub(crate) update_event_window_handlers: Vec<HandlerPtr<UpdateEventWindowEvent>>,
    pub(crate) register_state_handlers: Vec<HandlerPtr<RegisterStateEvent>>,
    pub(crate) destroy_state_handlers: Vec<HandlerPtr<DestroyStateEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, plus the default logging handlers if `log_events` is set.
    pub(crate) fn new(
        log_events: bool,
        branch_detected_handler: Option<HandlerPtr<BranchDetectedEvent>>,
        update_event_window_handler: Option<HandlerPtr<UpdateEventWindowEvent>>,
        register_state_handler: Option<HandlerPtr<RegisterStateEvent>>,
        destroy_state_handler: Option<HandlerPtr<DestroyStateEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(user_handler);
            handlers
        }

        Self {
            branch_detected_handlers: handlers(log_events, branch_detected_handler),
            update_event_window_handlers: handlers(log_events, update_event_window_handler),
            register_state_handlers: handlers(log_events, register_state_handler),
            destroy_state_handlers: handlers(log_events, destroy_state_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.branch_detected_handlers.is_empty()
            && self.update_event_window_handlers.is_empty()
            && self.register_state_handlers.is_empty()
            && self.destroy_state_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::BranchDetected(branch_detected_event) => self
                .branch_detected_handlers
                .iter()
                .for_each(|handler| handler(&branch_detected_event)),

            Event::UpdateEventWindow(update_event_window_event) => self
                .update_event_window_handlers
                .iter()
                .for_each(|handler| handler(&update_event_window_event)),

            Event::RegisterState(register_state_event) => self
                .register_state_handlers
                .iter()
                .for_each(|handler| handler(&register_state_event)),

            Event::DestroyState(destroy_state_event) => self
                .destroy_state_handlers
                .iter()
                .for_each(|handler| handler(&destroy_state_event)),
        }
    }
}

/// Start the event bus thread. On shutdown, events that were already published are handled before
/// the thread exits.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
