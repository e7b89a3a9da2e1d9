// src/engine/context.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::dag::NodeId;
use crate::engine::counts::ExecutionCounts;
use crate::engine::RunPhase;

/// Everything one execution context owns: counters, clock, trace, and its
/// position inside the current trial.
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    pub(crate) counts: ExecutionCounts,
    pub(crate) clock: Clock,
    pub(crate) trace: Vec<BTreeSet<NodeId>>,
    pub(crate) phase: RunPhase,
    pub(crate) last_run_end: Option<DateTime<Utc>>,
}

impl ContextState {
    pub fn new(node_count: usize) -> Self {
        Self {
            counts: ExecutionCounts::new(node_count),
            ..Self::default()
        }
    }

    /// Derive a new context from `self`. Counters, clock, trace and trial
    /// position carry over; the completion timestamp does not.
    pub fn fork(&self) -> Self {
        Self {
            last_run_end: None,
            ..self.clone()
        }
    }

    pub fn counts(&self) -> &ExecutionCounts {
        &self.counts
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn trace(&self) -> &[BTreeSet<NodeId>] {
        &self.trace
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn last_run_end(&self) -> Option<DateTime<Utc>> {
        self.last_run_end
    }

    pub(crate) fn ensure_nodes(&mut self, node_count: usize) {
        self.counts.ensure_len(node_count);
    }
}
