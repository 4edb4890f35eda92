/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'event' type, the node of the hashgraph, and its lightweight descriptor.

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
pub use sha2::Sha256 as CryptoHasher;
use sha2::Digest;

use super::{
    data_types::{CryptoHash, Generation, NodeId, Round, FIRST_GENERATION},
    event_window::AncientMode,
};

/// Identifies an event without carrying its payload.
///
/// Components that keep per-event history store descriptors instead of full events to bound their
/// memory usage. Two descriptors are equal if and only if all of their fields are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct EventDescriptor {
    pub hash: CryptoHash,
    pub creator: NodeId,
    pub birth_round: Round,
    pub generation: Generation,
}

impl EventDescriptor {
    /// Create a new `EventDescriptor`.
    pub fn new(
        hash: CryptoHash,
        creator: NodeId,
        birth_round: Round,
        generation: Generation,
    ) -> EventDescriptor {
        Self {
            hash,
            creator,
            birth_round,
            generation,
        }
    }

    /// Get the value that is compared against ancient thresholds expressed in `ancient_mode`.
    pub fn ancient_indicator(&self, ancient_mode: AncientMode) -> u64 {
        match ancient_mode {
            AncientMode::GenerationThreshold => self.generation.int(),
            AncientMode::BirthRoundThreshold => self.birth_round.int(),
        }
    }
}

/// A node of the hashgraph.
///
/// An event's [descriptor](PlatformEvent::descriptor) can only be obtained once its hash is known,
/// either because it was [computed](PlatformEvent::compute_hash) locally or because it was
/// [set](PlatformEvent::set_hash) by the component that received the event.
#[derive(Clone, Debug)]
pub struct PlatformEvent {
    creator: NodeId,
    birth_round: Round,
    generation: Generation,
    self_parent: Option<EventDescriptor>,
    other_parents: Vec<EventDescriptor>,
    transactions: Vec<Vec<u8>>,
    hash: Option<CryptoHash>,
}

impl PlatformEvent {
    /// Create a new, not yet hashed, event. The event's generation is derived from its parents.
    pub fn new(
        creator: NodeId,
        birth_round: Round,
        self_parent: Option<EventDescriptor>,
        other_parents: Vec<EventDescriptor>,
        transactions: Vec<Vec<u8>>,
    ) -> PlatformEvent {
        let generation = self_parent
            .iter()
            .chain(other_parents.iter())
            .map(|parent| parent.generation.int() + 1)
            .max()
            .map(Generation::new)
            .unwrap_or(FIRST_GENERATION);

        Self {
            creator,
            birth_round,
            generation,
            self_parent,
            other_parents,
            transactions,
            hash: None,
        }
    }

    /// Compute the SHA256 hash of the event, store it in the event, and return it.
    ///
    /// If the event already has a hash, that hash is returned and nothing is recomputed.
    pub fn compute_hash(&mut self) -> Result<CryptoHash, EventError> {
        if let Some(hash) = self.hash {
            return Ok(hash);
        }

        let mut hasher = CryptoHasher::new();
        self.creator.serialize(&mut hasher)?;
        self.birth_round.serialize(&mut hasher)?;
        self.generation.serialize(&mut hasher)?;
        self.self_parent.serialize(&mut hasher)?;
        self.other_parents.serialize(&mut hasher)?;
        self.transactions.serialize(&mut hasher)?;
        let hash = CryptoHash::new(hasher.finalize().into());

        self.hash = Some(hash);
        Ok(hash)
    }

    /// Set the hash of an event that was hashed elsewhere.
    pub fn set_hash(&mut self, hash: CryptoHash) {
        self.hash = Some(hash)
    }

    /// Get the hash of the event, if it is known.
    pub fn hash(&self) -> Option<CryptoHash> {
        self.hash
    }

    /// Get the descriptor of this event.
    ///
    /// Fails with [`EventError::HashNotComputed`] if the event's hash is not known yet.
    pub fn descriptor(&self) -> Result<EventDescriptor, EventError> {
        let hash = self.hash.ok_or(EventError::HashNotComputed {
            creator: self.creator,
            birth_round: self.birth_round,
        })?;

        Ok(EventDescriptor::new(
            hash,
            self.creator,
            self.birth_round,
            self.generation,
        ))
    }

    pub fn creator(&self) -> NodeId {
        self.creator
    }

    pub fn birth_round(&self) -> Round {
        self.birth_round
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn self_parent(&self) -> Option<&EventDescriptor> {
        self.self_parent.as_ref()
    }

    pub fn other_parents(&self) -> &[EventDescriptor] {
        &self.other_parents
    }

    pub fn transactions(&self) -> &[Vec<u8>] {
        &self.transactions
    }

    /// Get the value that is compared against ancient thresholds expressed in `ancient_mode`.
    pub fn ancient_indicator(&self, ancient_mode: AncientMode) -> u64 {
        match ancient_mode {
            AncientMode::GenerationThreshold => self.generation.int(),
            AncientMode::BirthRoundThreshold => self.birth_round.int(),
        }
    }
}

/// Enumerates the ways operations on a [`PlatformEvent`] can fail.
#[derive(Debug)]
pub enum EventError {
    /// The descriptor of an event was requested before the event was hashed.
    HashNotComputed { creator: NodeId, birth_round: Round },

    /// The hashed fields of the event could not be serialized.
    SerializationError(io::Error),
}

impl From<io::Error> for EventError {
    fn from(value: io::Error) -> Self {
        EventError::SerializationError(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_requires_hash() {
        let mut event = PlatformEvent::new(NodeId::new(1), Round::new(1), None, vec![], vec![]);
        assert!(matches!(
            event.descriptor(),
            Err(EventError::HashNotComputed { .. })
        ));

        let hash = event.compute_hash().unwrap();
        assert_eq!(event.descriptor().unwrap().hash, hash);
        assert_eq!(event.generation(), FIRST_GENERATION);
    }

    #[test]
    fn generation_follows_highest_parent() {
        let mut parent_a = PlatformEvent::new(NodeId::new(1), Round::new(1), None, vec![], vec![]);
        parent_a.compute_hash().unwrap();
        let mut parent_b = PlatformEvent::new(
            NodeId::new(2),
            Round::new(1),
            None,
            vec![parent_a.descriptor().unwrap()],
            vec![],
        );
        parent_b.compute_hash().unwrap();

        let child = PlatformEvent::new(
            NodeId::new(1),
            Round::new(2),
            Some(parent_a.descriptor().unwrap()),
            vec![parent_b.descriptor().unwrap()],
            vec![b"tx".to_vec()],
        );
        assert_eq!(child.generation(), Generation::new(2));
    }

    #[test]
    fn different_payloads_hash_differently() {
        let mut a = PlatformEvent::new(NodeId::new(1), Round::new(1), None, vec![], vec![vec![1]]);
        let mut b = PlatformEvent::new(NodeId::new(1), Round::new(1), None, vec![], vec![vec![2]]);
        assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }
}
