/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run the integrity layer of a node.
//!
//! The integrity layer bundles the two subsystems of this crate behind one handle:
//! - A [`BranchReporter`] that checks every event leaving the intake pipeline for branches.
//! - A [`StateGarbageCollector`] that tears down signed states after their last reservation is
//!   given back, driven by a background heartbeat thread.
//!
//! ## Starting the integrity layer
//!
//! ```ignore
//! let integrity_layer =
//!     IntegrityLayerSpec::builder()
//!     .roster(roster)
//!     .configuration(configuration)
//!     .on_branch_detected(branch_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//! - `.roster(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters register user-defined handlers for events from [crate::events]:
//! - `.on_branch_detected(...)`
//! - `.on_update_event_window(...)`
//! - `.on_register_state(...)`
//! - `.on_destroy_state(...)`
//!
//! The [configuration](Configuration) is also defined using the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .ancient_mode(AncientMode::BirthRoundThreshold)
//!     .branch_log_cooldown(Duration::from_secs(60))
//!     .gc_heartbeat_period(Duration::from_millis(200))
//!     .log_events(true)
//!     .build()
//! ```

use std::marker::PhantomData;
use std::sync::{
    mpsc::{self, Sender},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::branch_detection::{
    BranchDetectorError, BranchMetrics, BranchReporter, BranchReporterConfiguration,
    DefaultBranchDetector,
};
use crate::clock::SystemClock;
use crate::event_bus::*;
use crate::events::*;
use crate::garbage_collector::{
    start_heartbeat, GarbageCollectorConfiguration, GarbageCollectorError,
    StateAndRound, StateGarbageCollector,
};
use crate::signed_state::StateSnapshot;
use crate::types::{
    event::{EventDescriptor, PlatformEvent},
    event_window::{AncientMode, EventWindow},
    roster::Roster,
};

/// Stores the user-defined parameters required to start the integrity layer, that is:
/// 1. The [ancient mode](AncientMode) in which event windows will be expressed.
/// 2. The branch log cooldown, the minimum time between two branch log messages about the same
///    creator.
/// 3. The period of the garbage collector's heartbeat.
/// 4. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
///
/// The rate-limited branch messages are always logged, regardless of this flag.
#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.ancient_mode(...)`
    - `.log_events(...)`

    Optional:
    - `.branch_log_cooldown(...)`
    - `.gc_heartbeat_period(...)`
"
))]
pub struct Configuration {
    #[builder(setter(doc = "Set the ancient mode in which event windows are expressed. Required."))]
    pub ancient_mode: AncientMode,
    #[builder(default = crate::branch_detection::reporter::DEFAULT_BRANCH_LOG_COOLDOWN,
    setter(doc = "Set the minimum time between two branch log messages about the same creator. Optional, defaults to 60 seconds."))]
    pub branch_log_cooldown: Duration,
    #[builder(default = crate::garbage_collector::DEFAULT_HEARTBEAT_PERIOD,
    setter(doc = "Set the time between two heartbeats of the garbage collector. Optional, defaults to 200 milliseconds."))]
    pub gc_heartbeat_period: Duration,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl Into<(BranchReporterConfiguration, GarbageCollectorConfiguration)> for Configuration {
    fn into(self) -> (BranchReporterConfiguration, GarbageCollectorConfiguration) {
        let branch_reporter_config = BranchReporterConfiguration {
            log_cooldown: self.branch_log_cooldown,
        };
        let garbage_collector_config = GarbageCollectorConfiguration {
            heartbeat_period: self.gc_heartbeat_period,
        };
        (branch_reporter_config, garbage_collector_config)
    }
}

/// Stores all necessary parameters required to run the [IntegrityLayer].
#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building an [IntegrityLayerSpec]. On the builder call the following methods to construct a valid [IntegrityLayerSpec].

    Required:
    - `.roster(...)`
    - `.configuration(...)`

    Optional:
    - `.on_branch_detected(...)`
    - `.on_update_event_window(...)`
    - `.on_register_state(...)`
    - `.on_destroy_state(...)`
"
))]
pub struct IntegrityLayerSpec<S: StateSnapshot> {
    // Required parameters
    #[builder(setter(doc = "Set the roster of nodes whose events will be checked for branches. Required."))]
    roster: Roster,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run the integrity layer. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&BranchDetectedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BranchDetectedEvent>),
    doc = "Register a handler closure to be invoked after a branch is detected. Optional."))]
    on_branch_detected: Option<HandlerPtr<BranchDetectedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateEventWindowEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateEventWindowEvent>),
    doc = "Register a handler closure to be invoked after a new event window is applied. Optional."))]
    on_update_event_window: Option<HandlerPtr<UpdateEventWindowEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RegisterStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RegisterStateEvent>),
    doc = "Register a handler closure to be invoked after a signed state is registered with the garbage collector. Optional."))]
    on_register_state: Option<HandlerPtr<RegisterStateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DestroyStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DestroyStateEvent>),
    doc = "Register a handler closure to be invoked after the resources of a signed state are torn down. Optional."))]
    on_destroy_state: Option<HandlerPtr<DestroyStateEvent>>,
    #[builder(default, setter(skip))]
    _snapshot: PhantomData<fn() -> S>,
}

impl<S: StateSnapshot> IntegrityLayerSpec<S> {
    /// Starts all threads and channels associated with running the integrity layer, and returns the
    /// handles to them in an [IntegrityLayer] struct.
    ///
    /// The branch detector starts from the [genesis](EventWindow::genesis) event window of the
    /// configured ancient mode.
    pub fn start(self) -> IntegrityLayer<S> {
        let ancient_mode = self.configuration.ancient_mode;
        let log_events = self.configuration.log_events;
        let (branch_reporter_config, garbage_collector_config) = self.configuration.into();

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_branch_detected,
            self.on_update_event_window,
            self.on_register_state,
            self.on_destroy_state,
        );

        let (event_publisher, event_bus) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(
                event_handlers,
                event_subscriber,
                event_bus_shutdown_receiver,
            );
            (Some(event_publisher), Some((event_bus, event_bus_shutdown)))
        } else {
            (None, None)
        };

        let detector =
            DefaultBranchDetector::with_event_window(self.roster, EventWindow::genesis(ancient_mode));
        let branch_reporter =
            BranchReporter::from_parts(detector, SystemClock, branch_reporter_config)
                .with_event_publisher(event_publisher.clone());

        let garbage_collector =
            Arc::new(StateGarbageCollector::new().with_event_publisher(event_publisher));
        let (heartbeat_shutdown, heartbeat_shutdown_receiver) = mpsc::channel();
        let heartbeat = start_heartbeat(
            Arc::clone(&garbage_collector),
            garbage_collector_config.heartbeat_period,
            heartbeat_shutdown_receiver,
        );

        let (event_bus, event_bus_shutdown) = event_bus.unzip();

        IntegrityLayer {
            ancient_mode,
            branch_reporter,
            garbage_collector,
            heartbeat: Some(heartbeat),
            heartbeat_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the branch reporter, the garbage collector and the background threads of the
/// integrity layer. When this value is dropped, all background threads are gracefully shut down.
pub struct IntegrityLayer<S: StateSnapshot> {
    ancient_mode: AncientMode,
    branch_reporter: BranchReporter<DefaultBranchDetector, SystemClock>,
    garbage_collector: Arc<StateGarbageCollector<S>>,
    heartbeat: Option<JoinHandle<()>>,
    heartbeat_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<S: StateSnapshot> IntegrityLayer<S> {
    /// Check `event` for a branch. See [`BranchReporter::report_branch`].
    pub fn report_branch(
        &mut self,
        event: &PlatformEvent,
    ) -> Result<Option<EventDescriptor>, BranchDetectorError> {
        self.branch_reporter.report_branch(event)
    }

    /// Apply a new event window to the branch detector. See [`BranchReporter::update_event_window`].
    pub fn update_event_window(
        &mut self,
        event_window: EventWindow,
    ) -> Result<(), BranchDetectorError> {
        self.branch_reporter.update_event_window(event_window)
    }

    /// Forget all branch detection history, and restart from the genesis event window of the
    /// configured ancient mode, e.g., after the node reconnects from a saved state.
    pub fn clear_branches(&mut self) {
        self.branch_reporter.clear();
        // A cleared detector has no window, so this cannot fail.
        let _ = self
            .branch_reporter
            .update_event_window(EventWindow::genesis(self.ancient_mode));
    }

    /// Hand a new signed state to the garbage collector. See
    /// [`StateGarbageCollector::register_state`].
    pub fn register_state(&self, state_and_round: StateAndRound<S>) -> Result<(), GarbageCollectorError> {
        self.garbage_collector.register_state(state_and_round)
    }

    pub fn branch_reporter(&self) -> &BranchReporter<DefaultBranchDetector, SystemClock> {
        &self.branch_reporter
    }

    pub fn branch_metrics(&self) -> Arc<BranchMetrics> {
        self.branch_reporter.metrics()
    }

    pub fn garbage_collector(&self) -> Arc<StateGarbageCollector<S>> {
        Arc::clone(&self.garbage_collector)
    }
}

impl<S: StateSnapshot> Drop for IntegrityLayer<S> {
    fn drop(&mut self) {
        // The heartbeat publishes into the event bus while it shuts down, so it must stop first.
        let _ = self.heartbeat_shutdown.send(());
        if let Some(heartbeat) = self.heartbeat.take() {
            if heartbeat.join().is_err() {
                log::error!("Garbage collector heartbeat thread panicked");
            }
        }

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| {
                let _ = shutdown.send(());
            });
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::error!("Event bus thread panicked");
            }
        }
    }
}
