// src/dag/registry.rs

//! Stable integer identities for caller-supplied nodes.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;

/// Anything usable as a schedulable node: an opaque, identity-comparable
/// handle. The scheduler never looks inside it.
pub trait Node: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> Node for T {}

/// Dense index assigned to a node the first time the scheduler sees it.
///
/// Ordering follows registration order, which is also the order nodes are
/// visited within a consideration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Insertion-ordered set of nodes with O(1) lookup in both directions.
#[derive(Debug, Clone)]
pub struct NodeRegistry<N> {
    nodes: IndexSet<N>,
}

impl<N: Node> NodeRegistry<N> {
    pub fn new() -> Self {
        Self {
            nodes: IndexSet::new(),
        }
    }

    /// Register `node` (idempotent) and return its id.
    pub fn register(&mut self, node: N) -> NodeId {
        let (idx, _) = self.nodes.insert_full(node);
        NodeId(idx)
    }

    pub fn id_of(&self, node: &N) -> Option<NodeId> {
        self.nodes.get_index_of(node).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> Option<&N> {
        self.nodes.get_index(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &N)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Map a collection of ids back to caller nodes, keeping id order.
    pub fn resolve_all<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> IndexSet<N> {
        ids.into_iter()
            .filter_map(|id| self.node(*id).cloned())
            .collect()
    }
}

impl<N: Node> Default for NodeRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
