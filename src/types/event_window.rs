/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The boundary between ancient and non-ancient history.
//!
//! An [`EventWindow`] is produced by the consensus round-advancement component every time a round
//! reaches consensus, and is pushed into every component that keeps per-event history. Those
//! components use the window to decide which history they must keep and which history they must
//! forget.
//!
//! ## Ancient indicators
//!
//! Depending on the configured [`AncientMode`], the "ancient indicator" of an event is either its
//! generation or its birth round. An event is *ancient* if its ancient indicator is strictly below the
//! window's [ancient threshold](EventWindow::ancient_threshold).

use std::fmt::{self, Display, Formatter};

use super::{
    data_types::{Round, FIRST_GENERATION},
    event::EventDescriptor,
};

/// The first round of consensus. Birth rounds below this value never occur.
pub const ROUND_FIRST: Round = Round::new(1);

/// Selects which property of an event is compared against the ancient threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AncientMode {
    /// Ancient thresholds are expressed in event generations.
    GenerationThreshold,

    /// Ancient thresholds are expressed in event birth rounds.
    BirthRoundThreshold,
}

impl Display for AncientMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AncientMode::GenerationThreshold => write!(f, "Generation"),
            AncientMode::BirthRoundThreshold => write!(f, "BirthRound"),
        }
    }
}

/// Immutable description of the current non-ancient boundary.
///
/// Windows delivered to a single component must have non-decreasing ancient thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventWindow {
    latest_consensus_round: Round,
    ancient_threshold: u64,
    expired_threshold: u64,
    ancient_mode: AncientMode,
}

impl EventWindow {
    /// Create a new `EventWindow`.
    ///
    /// `expired_threshold` is the boundary below which history may be dropped entirely. It can never be
    /// above `ancient_threshold`.
    pub fn new(
        latest_consensus_round: Round,
        ancient_threshold: u64,
        expired_threshold: u64,
        ancient_mode: AncientMode,
    ) -> Result<EventWindow, EventWindowError> {
        if expired_threshold > ancient_threshold {
            return Err(EventWindowError::ExpiredAboveAncient {
                ancient_threshold,
                expired_threshold,
            });
        }

        Ok(Self {
            latest_consensus_round,
            ancient_threshold,
            expired_threshold,
            ancient_mode,
        })
    }

    /// The window in effect before any round has reached consensus. Nothing is ancient in it.
    pub fn genesis(ancient_mode: AncientMode) -> EventWindow {
        let threshold = match ancient_mode {
            AncientMode::GenerationThreshold => FIRST_GENERATION.int(),
            AncientMode::BirthRoundThreshold => ROUND_FIRST.int(),
        };

        Self {
            latest_consensus_round: Round::new(ROUND_FIRST.int() - 1),
            ancient_threshold: threshold,
            expired_threshold: threshold,
            ancient_mode,
        }
    }

    /// Compute the birth-round window that follows from `latest_consensus_round` reaching consensus,
    /// keeping the last `rounds_non_ancient` rounds non-ancient.
    pub fn from_latest_round(latest_consensus_round: Round, rounds_non_ancient: u64) -> EventWindow {
        let threshold = (latest_consensus_round.int() + 1)
            .saturating_sub(rounds_non_ancient)
            .max(ROUND_FIRST.int());

        Self {
            latest_consensus_round,
            ancient_threshold: threshold,
            expired_threshold: threshold,
            ancient_mode: AncientMode::BirthRoundThreshold,
        }
    }

    /// Get the latest round that has reached consensus when this window was created.
    pub fn latest_consensus_round(&self) -> Round {
        self.latest_consensus_round
    }

    /// Get the minimum ancient indicator an event must have to be non-ancient.
    pub fn ancient_threshold(&self) -> u64 {
        self.ancient_threshold
    }

    /// Get the minimum ancient indicator an event must have to not be expired.
    pub fn expired_threshold(&self) -> u64 {
        self.expired_threshold
    }

    /// Get the ancient mode this window is expressed in.
    pub fn ancient_mode(&self) -> AncientMode {
        self.ancient_mode
    }

    /// Check whether the event described by `descriptor` is ancient with respect to this window.
    pub fn is_ancient(&self, descriptor: &EventDescriptor) -> bool {
        self.is_ancient_indicator(descriptor.ancient_indicator(self.ancient_mode))
    }

    /// Check whether an event with `ancient_indicator` is ancient with respect to this window.
    pub fn is_ancient_indicator(&self, ancient_indicator: u64) -> bool {
        ancient_indicator < self.ancient_threshold
    }

    /// Check whether an event with `ancient_indicator` is expired with respect to this window.
    pub fn is_expired_indicator(&self, ancient_indicator: u64) -> bool {
        ancient_indicator < self.expired_threshold
    }
}

impl Display for EventWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventWindow(latest round: {}, ancient: {}, expired: {}, mode: {})",
            self.latest_consensus_round,
            self.ancient_threshold,
            self.expired_threshold,
            self.ancient_mode
        )
    }
}

/// Enumerates the ways the construction of an [`EventWindow`] can fail.
#[derive(Debug)]
pub enum EventWindowError {
    /// The expired threshold was above the ancient threshold.
    ExpiredAboveAncient {
        ancient_threshold: u64,
        expired_threshold: u64,
    },
}
