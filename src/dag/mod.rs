// src/dag/mod.rs

//! Dependency graph handling and the scheduler built on it.
//!
//! - [`graph`] holds the caller's dependency graph and prunes feedback edges.
//! - [`registry`] maps caller nodes to dense [`NodeId`]s.
//! - [`queue`] builds and edits consideration queues.
//! - [`scheduler`] owns conditions, termination and execution contexts.
//! - [`summary`] is the serializable view of a scheduler.

pub mod graph;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod summary;

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};

pub use graph::{DependencyGraph, GraphSource, PrunedGraph};
pub use queue::{ConsiderationQueue, InsertionPoint};
pub use registry::{Node, NodeId, NodeRegistry};
pub use scheduler::Scheduler;
pub use summary::{ConditionsSummary, ScheduleSummary};

use crate::errors::Result;

/// Structural view of a graph: what orders execution, what was pruned as
/// feedback, and the resulting base consideration queue.
#[derive(Debug, Clone)]
pub struct BuiltGraph<N> {
    pub structural_dependencies: IndexMap<N, IndexSet<N>>,
    pub removed_dependencies: IndexMap<N, IndexSet<N>>,
    pub consideration_queue: Vec<IndexSet<N>>,
}

/// Prune feedback edges from `source` and sort the rest into consideration
/// sets. Fails with `GraphError` if a cycle survives pruning.
pub fn build<N: Node>(source: &impl GraphSource<N>) -> Result<BuiltGraph<N>> {
    let pruned = source.prune_feedback_edges()?;

    let mut registry = NodeRegistry::new();
    for node in &pruned.nodes {
        registry.register(node.clone());
    }
    let parents: BTreeMap<NodeId, _> = pruned
        .structural_dependencies
        .iter()
        .map(|(child, deps)| {
            let deps = deps.iter().map(|d| registry.register(d.clone())).collect();
            (registry.register(child.clone()), deps)
        })
        .collect();
    let queue = ConsiderationQueue::from_dependencies(&parents)?;

    Ok(BuiltGraph {
        structural_dependencies: pruned.structural_dependencies,
        removed_dependencies: pruned.removed_dependencies,
        consideration_queue: queue
            .sets()
            .iter()
            .map(|set| registry.resolve_all(set))
            .collect(),
    })
}
