//! Helpers to build rosters, event windows, and hashed events.

use std::sync::atomic::{AtomicU64, Ordering};

use hashgraph_integrity::types::{
    data_types::{NodeId, Round, Weight},
    event::{EventDescriptor, PlatformEvent},
    event_window::{AncientMode, EventWindow},
    roster::Roster,
};

// Every event built by these helpers carries a unique transaction, so that two events with the same
// parents never have the same hash.
static NONCE: AtomicU64 = AtomicU64::new(0);

fn unique_transactions() -> Vec<Vec<u8>> {
    vec![NONCE.fetch_add(1, Ordering::Relaxed).to_le_bytes().to_vec()]
}

/// A roster of `nodes` nodes with ids `0..nodes` and weight 1 each.
pub(crate) fn equal_weight_roster(nodes: u64) -> Roster {
    (0..nodes).map(|id| (NodeId::new(id), Weight::new(1))).collect()
}

/// A roster with one node per entry of `weights`, with ids `0..weights.len()`.
pub(crate) fn weighted_roster(weights: &[u64]) -> Roster {
    weights
        .iter()
        .enumerate()
        .map(|(id, weight)| (NodeId::new(id as u64), Weight::new(*weight)))
        .collect()
}

pub(crate) fn birth_round_window(latest_round: u64, ancient_threshold: u64) -> EventWindow {
    EventWindow::new(
        Round::new(latest_round),
        ancient_threshold,
        ancient_threshold,
        AncientMode::BirthRoundThreshold,
    )
    .unwrap()
}

pub(crate) fn generation_window(ancient_threshold: u64) -> EventWindow {
    EventWindow::new(
        Round::new(0),
        ancient_threshold,
        ancient_threshold,
        AncientMode::GenerationThreshold,
    )
    .unwrap()
}

/// A hashed event without a self-parent.
pub(crate) fn first_event(creator: u64, birth_round: u64) -> PlatformEvent {
    hashed(PlatformEvent::new(
        NodeId::new(creator),
        Round::new(birth_round),
        None,
        Vec::new(),
        unique_transactions(),
    ))
}

/// A hashed event by the creator of `self_parent`, built on top of it.
pub(crate) fn child_event(
    self_parent: &PlatformEvent,
    birth_round: u64,
    other_parents: Vec<EventDescriptor>,
) -> PlatformEvent {
    hashed(PlatformEvent::new(
        self_parent.creator(),
        Round::new(birth_round),
        Some(self_parent.descriptor().unwrap()),
        other_parents,
        unique_transactions(),
    ))
}

fn hashed(mut event: PlatformEvent) -> PlatformEvent {
    event.compute_hash().unwrap();
    event
}
