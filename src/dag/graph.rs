// src/dag/graph.rs

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{depth_first_search, DfsEvent};
use tracing::debug;

use crate::config::model::ScheduleFile;
use crate::dag::registry::{Node, NodeId, NodeRegistry};
use crate::errors::{Result, SchedError};

/// Mapping from each node to the set of nodes that must execute before it.
///
/// Cycles are allowed here; they are broken by
/// [`GraphSource::prune_feedback_edges`].
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    parents: IndexMap<N, IndexSet<N>>,
}

impl<N: Node> DependencyGraph<N> {
    pub fn new() -> Self {
        Self {
            parents: IndexMap::new(),
        }
    }

    /// Add a node with no parents (no-op if already present).
    pub fn add_node(&mut self, node: N) -> &mut Self {
        self.parents.entry(node).or_default();
        self
    }

    /// Record that `parent` must execute before `child`.
    pub fn add_dependency(&mut self, child: N, parent: N) -> &mut Self {
        self.parents.entry(parent.clone()).or_default();
        self.parents.entry(child).or_default().insert(parent);
        self
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.parents.keys()
    }

    /// Direct parents of `node` (empty if unknown).
    pub fn parents_of(&self, node: &N) -> impl Iterator<Item = &N> {
        self.parents.get(node).into_iter().flat_map(|p| p.iter())
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl<N: Node> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Node, P: IntoIterator<Item = N>> FromIterator<(N, P)> for DependencyGraph<N> {
    /// Build from `(child, parents)` pairs. Parents that never appear as a
    /// key are still added as nodes.
    fn from_iter<I: IntoIterator<Item = (N, P)>>(iter: I) -> Self {
        let mut graph = DependencyGraph::new();
        for (child, parents) in iter {
            graph.add_node(child.clone());
            for parent in parents {
                graph.add_dependency(child.clone(), parent);
            }
        }
        graph
    }
}

/// Result of splitting a dependency graph into ordering and feedback edges.
#[derive(Debug, Clone)]
pub struct PrunedGraph<N> {
    /// Every node, in a stable order.
    pub nodes: Vec<N>,
    /// Acyclic subset of the dependencies, used for ordering.
    pub structural_dependencies: IndexMap<N, IndexSet<N>>,
    /// Feedback edges excluded from ordering, keyed by child.
    pub removed_dependencies: IndexMap<N, IndexSet<N>>,
}

/// Anything the scheduler can be built from.
///
/// [`DependencyGraph`] is the usual implementation; higher-level model
/// types can implement this to hand over their own pruning.
pub trait GraphSource<N> {
    fn prune_feedback_edges(&self) -> Result<PrunedGraph<N>>;
}

impl<N: Node> GraphSource<N> for DependencyGraph<N> {
    /// Remove every DFS back edge, then confirm the remainder sorts.
    ///
    /// Traversal follows node insertion order, so the set of removed edges
    /// is deterministic for a given graph.
    fn prune_feedback_edges(&self) -> Result<PrunedGraph<N>> {
        let mut registry = NodeRegistry::new();
        for node in self.parents.keys() {
            registry.register(node.clone());
        }

        // Edge direction: parent -> child.
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for (id, _) in registry.iter() {
            graph.add_node(id);
        }
        for (child, parents) in self.parents.iter() {
            let child_id = registry.register(child.clone());
            for parent in parents {
                // Every parent is also a key (see `add_dependency`).
                let parent_id = registry.register(parent.clone());
                graph.add_edge(parent_id, child_id, ());
            }
        }

        let mut feedback: Vec<(NodeId, NodeId)> = Vec::new();
        let starts: Vec<NodeId> = graph.nodes().collect();
        depth_first_search(&graph, starts, |event| {
            if let DfsEvent::BackEdge(parent, child) = event {
                feedback.push((parent, child));
            }
        });

        for (parent, child) in feedback.iter() {
            debug!(parent = %parent, child = %child, "removing feedback edge");
            graph.remove_edge(*parent, *child);
        }

        if let Err(cycle) = toposort(&graph, None) {
            let node = registry.node(cycle.node_id());
            return Err(SchedError::GraphError(format!(
                "cycle remains after feedback pruning, involving node {:?}",
                node
            )));
        }

        let mut structural_dependencies: IndexMap<N, IndexSet<N>> = IndexMap::new();
        for (id, node) in registry.iter() {
            let parents = graph
                .neighbors_directed(id, petgraph::Direction::Incoming)
                .filter_map(|p| registry.node(p).cloned())
                .collect();
            structural_dependencies.insert(node.clone(), parents);
        }

        let mut removed_dependencies: IndexMap<N, IndexSet<N>> = IndexMap::new();
        for (parent, child) in feedback {
            if let (Some(p), Some(c)) = (registry.node(parent), registry.node(child)) {
                removed_dependencies
                    .entry(c.clone())
                    .or_default()
                    .insert(p.clone());
            }
        }

        Ok(PrunedGraph {
            nodes: registry.iter().map(|(_, n)| n.clone()).collect(),
            structural_dependencies,
            removed_dependencies,
        })
    }
}

impl DependencyGraph<String> {
    /// Graph of the `[node.<name>]` sections, with edges from `after`.
    pub fn from_schedule(cfg: &ScheduleFile) -> Self {
        let mut graph = DependencyGraph::new();
        for (name, node) in cfg.node.iter() {
            graph.add_node(name.clone());
            for dep in node.after.iter() {
                graph.add_dependency(name.clone(), dep.clone());
            }
        }
        graph
    }
}
