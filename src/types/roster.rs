/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The set of consensus participants and their weights.

use std::{collections::HashMap, slice};

use super::data_types::{NodeId, TotalWeight, Weight};

/// Stores the identities of consensus participants and their consensus weights.
///
/// ## Ordering of nodes
///
/// `Roster` internally maintains the list of nodes in ascending order of their `NodeId`s, and avails
/// the methods [`nodes`](Roster::nodes) and [`nodes_and_weights`](Roster::nodes_and_weights) that
/// users can use to get them in this order.
///
/// ## Lifetime
///
/// Components that are constructed with a `Roster` assume that it stays unchanged for as long as they
/// live. A roster change requires constructing new components.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Roster {
    // Node ids are included here in ascending order.
    nodes: Vec<NodeId>,
    weights: HashMap<NodeId, Weight>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Roster {
        Self {
            nodes: Vec::new(),
            weights: HashMap::new(),
        }
    }

    /// Put a `node` with the specified `weight` into the roster, placing it in a position that
    /// preserves the [ordering of nodes](Self#ordering-of-nodes).
    ///
    /// If `node` already exists in the roster, this function updates its weight instead.
    pub fn put(&mut self, node: NodeId, weight: Weight) {
        if let Err(insert_pos) = self.nodes.binary_search(&node) {
            self.nodes.insert(insert_pos, node);
        }

        self.weights.insert(node, weight);
    }

    /// Get the weight of `node`. Nodes that are not in the roster have no weight.
    pub fn weight(&self, node: &NodeId) -> Weight {
        self.weights.get(node).copied().unwrap_or(Weight::new(0))
    }

    /// Get the sum of the weights of all of the nodes inside the roster.
    pub fn total_weight(&self) -> TotalWeight {
        let mut total_weight = TotalWeight::new(0);
        for weight in self.weights.values() {
            total_weight += *weight
        }
        total_weight
    }

    /// Check whether the roster contains `node`.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.weights.contains_key(node)
    }

    /// Get an iterator through the roster's node ids which walks through them in ascending order.
    pub fn nodes(&self) -> slice::Iter<NodeId> {
        self.nodes.iter()
    }

    /// Get a vector containing each node and its weight, in ascending order of node ids.
    pub fn nodes_and_weights(&self) -> Vec<(NodeId, Weight)> {
        self.nodes().map(|node| (*node, self.weight(node))).collect()
    }

    /// Get the number of nodes in the roster.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the roster is empty (i.e., `self.len() == 0`).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(NodeId, Weight)> for Roster {
    fn from_iter<I: IntoIterator<Item = (NodeId, Weight)>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for (node, weight) in iter {
            roster.put(node, weight);
        }
        roster
    }
}
