/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Integrity layer for nodes of a hashgraph-style gossip consensus network.
//!
//! Nodes gossip *events*, each of which names the creator's previous event (its self-parent) and
//! zero or more events of other creators. Consensus assigns events to rounds, and at the end of a
//! round every node produces a *signed state*, a snapshot of the ledger that many subsystems read
//! concurrently. This crate provides the two node-local mechanisms that keep that machinery sound:
//! 1. [Branch detection](branch_detection): flagging creators that publish two different children of
//!    the same self-parent, within a moving window of non-ancient events.
//! 2. [Signed state lifecycle](signed_state) and [garbage collection](garbage_collector):
//!    reference-counted reservations on signed states, and a background collector that tears down a
//!    state once its last reservation is given back.
//!
//! Both are assembled behind an [`IntegrityLayer`](integrity_layer::IntegrityLayer), started with
//! the builder pattern of [`IntegrityLayerSpec`](integrity_layer::IntegrityLayerSpec). Components
//! can also be used on their own.

pub mod branch_detection;

pub mod clock;

pub(crate) mod event_bus;

pub mod events;

pub mod garbage_collector;

pub mod integrity_layer;

pub mod logging;

pub mod signed_state;

pub mod types;
