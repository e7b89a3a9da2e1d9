// src/dag/queue.rs

//! Consideration queues: ordered groups of nodes with no ordering
//! dependency among themselves.

use std::collections::{BTreeMap, BTreeSet};

use crate::dag::registry::NodeId;
use crate::errors::{Result, SchedError};

/// Where an additive condition places its owner relative to a base queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InsertionPoint {
    /// A new set ahead of the first one.
    BeforeFirst,
    /// Merged into the existing set at this index.
    At(usize),
    /// A new set after the last one.
    AfterLast,
}

/// Ordered sequence of consideration sets.
///
/// Sets are `BTreeSet`s so that iteration inside a set follows [`NodeId`]
/// order, which is the tie-break used by the fixed-point loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsiderationQueue {
    sets: Vec<BTreeSet<NodeId>>,
}

impl ConsiderationQueue {
    pub(crate) fn from_sets(sets: Vec<BTreeSet<NodeId>>) -> Self {
        Self { sets }
    }

    /// Layered topological sort of an acyclic dependency map.
    ///
    /// Each layer holds every node whose parents all sit in earlier layers.
    /// Parents that are not keys of `parents` are ignored.
    pub fn from_dependencies(parents: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Result<Self> {
        let mut remaining: BTreeMap<NodeId, BTreeSet<NodeId>> = parents
            .iter()
            .map(|(node, deps)| {
                let known = deps
                    .iter()
                    .filter(|d| parents.contains_key(*d) && *d != node)
                    .copied()
                    .collect();
                (*node, known)
            })
            .collect();

        let mut sets = Vec::new();
        while !remaining.is_empty() {
            let ready: BTreeSet<NodeId> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(node, _)| *node)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<String> = remaining.keys().map(|n| n.to_string()).collect();
                return Err(SchedError::GraphError(format!(
                    "cycle detected among nodes {}",
                    stuck.join(", ")
                )));
            }

            remaining.retain(|node, _| !ready.contains(node));
            for deps in remaining.values_mut() {
                deps.retain(|d| !ready.contains(d));
            }
            sets.push(ready);
        }

        Ok(Self { sets })
    }

    pub fn sets(&self) -> &[BTreeSet<NodeId>] {
        &self.sets
    }

    pub fn get(&self, index: usize) -> Option<&BTreeSet<NodeId>> {
        self.sets.get(index)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Index of the first set containing `node`.
    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        self.sets.iter().position(|set| set.contains(&node))
    }

    /// Number of sets containing `node`.
    pub fn occurrences(&self, node: NodeId) -> usize {
        self.sets.iter().filter(|set| set.contains(&node)).count()
    }

    /// Every node in queue order (duplicates kept for runtime queues).
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sets.iter().flat_map(|set| set.iter().copied())
    }

    /// Check that this queue is a true partition of `expected`: no empty
    /// sets, no node twice, nothing missing, nothing extra.
    pub fn validate_partition(&self, expected: &BTreeSet<NodeId>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (idx, set) in self.sets.iter().enumerate() {
            if set.is_empty() {
                return Err(SchedError::SchedulerError(format!(
                    "consideration set {idx} is empty"
                )));
            }
            for node in set {
                if !seen.insert(*node) {
                    return Err(SchedError::SchedulerError(format!(
                        "node {node} appears in more than one consideration set"
                    )));
                }
                if !expected.contains(node) {
                    return Err(SchedError::SchedulerError(format!(
                        "node {node} in consideration set {idx} is not a structural node"
                    )));
                }
            }
        }
        if let Some(missing) = expected.difference(&seen).next() {
            return Err(SchedError::SchedulerError(format!(
                "structural node {missing} is missing from the consideration queue"
            )));
        }
        Ok(())
    }

    /// Copy of this queue with extra nodes placed at the given points.
    ///
    /// All nodes targeting `BeforeFirst` share one new leading set; all
    /// nodes targeting `AfterLast` share one new trailing set. Points past
    /// the end of the queue are treated as `AfterLast`.
    pub fn with_insertions(&self, insertions: &BTreeMap<InsertionPoint, BTreeSet<NodeId>>) -> Self {
        let mut sets = self.sets.clone();
        let mut leading = BTreeSet::new();
        let mut trailing = BTreeSet::new();

        for (point, nodes) in insertions {
            match point {
                InsertionPoint::BeforeFirst => leading.extend(nodes.iter().copied()),
                InsertionPoint::At(idx) if *idx < sets.len() => {
                    sets[*idx].extend(nodes.iter().copied())
                }
                InsertionPoint::At(_) | InsertionPoint::AfterLast => {
                    trailing.extend(nodes.iter().copied())
                }
            }
        }

        if !leading.is_empty() {
            sets.insert(0, leading);
        }
        if !trailing.is_empty() {
            sets.push(trailing);
        }
        Self { sets }
    }
}
