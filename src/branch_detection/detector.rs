/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The default [`BranchDetector`] implementation.

use std::collections::BTreeMap;

use super::{BranchDetector, BranchDetectorError};
use crate::types::{
    data_types::{NodeId, TotalWeight},
    event::{EventDescriptor, PlatformEvent},
    event_window::EventWindow,
    roster::Roster,
};

/// What the detector remembers about a single creator.
///
/// A record is dropped as soon as both of its fields are `None`, so the detector's memory usage is
/// proportional to the number of creators with non-ancient history.
#[derive(Clone, Debug, Default)]
struct CreatorRecord {
    most_recent_event: Option<EventDescriptor>,
    most_recent_branching_event: Option<EventDescriptor>,
}

/// Tracks the most recent event and the most recent branching event of every creator, and the
/// aggregate number and weight of creators that are currently branching.
///
/// The aggregates are maintained incrementally: they change only when a creator gains its first
/// non-ancient branching event, or when its branching event becomes ancient.
pub struct DefaultBranchDetector {
    roster: Roster,
    total_weight: TotalWeight,
    event_window: Option<EventWindow>,
    creators: BTreeMap<NodeId, CreatorRecord>,
    branching_node_count: usize,
    branching_weight: TotalWeight,
}

impl DefaultBranchDetector {
    /// Create a detector for events created by the nodes in `roster`. No event window is set.
    pub fn new(roster: Roster) -> DefaultBranchDetector {
        let total_weight = roster.total_weight();
        Self {
            roster,
            total_weight,
            event_window: None,
            creators: BTreeMap::new(),
            branching_node_count: 0,
            branching_weight: TotalWeight::new(0),
        }
    }

    /// Create a detector for events created by the nodes in `roster`, starting from `event_window`.
    pub fn with_event_window(roster: Roster, event_window: EventWindow) -> DefaultBranchDetector {
        let mut detector = Self::new(roster);
        detector.event_window = Some(event_window);
        detector
    }

    /// Get the event window currently in effect, if one has been set.
    pub fn event_window(&self) -> Option<&EventWindow> {
        self.event_window.as_ref()
    }

    /// Get the most recent non-ancient event added for `creator`.
    pub fn most_recent_event(&self, creator: &NodeId) -> Option<&EventDescriptor> {
        self.creators
            .get(creator)
            .and_then(|record| record.most_recent_event.as_ref())
    }

    /// Get the most recent non-ancient branching event added for `creator`.
    pub fn most_recent_branching_event(&self, creator: &NodeId) -> Option<&EventDescriptor> {
        self.creators
            .get(creator)
            .and_then(|record| record.most_recent_branching_event.as_ref())
    }

    /// Get the number of creators the detector currently keeps any history for.
    pub fn tracked_creator_count(&self) -> usize {
        self.creators.len()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}

impl BranchDetector for DefaultBranchDetector {
    fn add_event(
        &mut self,
        event: &PlatformEvent,
    ) -> Result<Option<EventDescriptor>, BranchDetectorError> {
        let event_window = self
            .event_window
            .ok_or(BranchDetectorError::EventWindowNotSet)?;

        if event_window.is_ancient_indicator(event.ancient_indicator(event_window.ancient_mode())) {
            return Ok(None);
        }

        let descriptor = event.descriptor()?;
        let creator = event.creator();
        let record = self.creators.entry(creator).or_default();

        // If there is no previous event, either this is the creator's first event or its previous
        // events are all ancient. A branch cannot be told apart from an evicted self-parent then.
        let is_branch = match (&record.most_recent_event, event.self_parent()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(previous), Some(self_parent)) => previous != self_parent,
        };

        record.most_recent_event = Some(descriptor);

        if !is_branch {
            return Ok(None);
        }

        if record.most_recent_branching_event.replace(descriptor).is_none() {
            self.branching_node_count += 1;
            self.branching_weight += self.roster.weight(&creator);
        }

        Ok(Some(descriptor))
    }

    fn update_event_window(
        &mut self,
        event_window: EventWindow,
    ) -> Result<(), BranchDetectorError> {
        if let Some(current) = &self.event_window {
            if current.ancient_mode() != event_window.ancient_mode() {
                return Err(BranchDetectorError::AncientModeMismatch {
                    current_mode: current.ancient_mode(),
                    new_mode: event_window.ancient_mode(),
                });
            }

            if event_window.ancient_threshold() < current.ancient_threshold() {
                return Err(BranchDetectorError::EventWindowRegression {
                    current_threshold: current.ancient_threshold(),
                    new_threshold: event_window.ancient_threshold(),
                });
            }
        }

        self.event_window = Some(event_window);

        let Self {
            roster,
            creators,
            branching_node_count,
            branching_weight,
            ..
        } = self;

        creators.retain(|creator, record| {
            if matches!(&record.most_recent_event, Some(event) if event_window.is_ancient(event)) {
                record.most_recent_event = None;
            }

            if matches!(&record.most_recent_branching_event, Some(event) if event_window.is_ancient(event))
            {
                record.most_recent_branching_event = None;
                *branching_node_count -= 1;
                *branching_weight -= roster.weight(creator);
            }

            record.most_recent_event.is_some() || record.most_recent_branching_event.is_some()
        });

        Ok(())
    }

    fn clear(&mut self) {
        self.event_window = None;
        self.creators.clear();
        self.branching_node_count = 0;
        self.branching_weight = TotalWeight::new(0);
    }

    fn branching_node_count(&self) -> usize {
        self.branching_node_count
    }

    fn branching_weight(&self) -> TotalWeight {
        self.branching_weight
    }

    fn total_weight(&self) -> TotalWeight {
        self.total_weight
    }
}
