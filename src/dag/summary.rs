// src/dag/summary.rs

use std::collections::BTreeMap;
use std::hash::Hash;

use indexmap::IndexMap;
use serde::Serialize;

use crate::condition::Condition;

/// Serializable snapshot of a scheduler's effective conditions.
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "N: Serialize + Eq + Hash"))]
pub struct ScheduleSummary<N> {
    pub conditions: ConditionsSummary<N>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "N: Serialize + Eq + Hash"))]
pub struct ConditionsSummary<N> {
    /// Keyed by time scale name (`TRIAL`, `RUN`).
    pub termination: BTreeMap<String, Condition<N>>,
    /// Per node, in registration order.
    pub node: IndexMap<N, Condition<N>>,
}
