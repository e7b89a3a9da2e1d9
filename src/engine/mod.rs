// src/engine/mod.rs

//! Execution engine.
//!
//! This module ties together:
//! - per-context execution counters ([`counts`]) and state ([`context`])
//! - derivation of the effective termination conditions ([`termination`])
//! - the pure, resumable run state machine ([`core`])
//! - the caller-facing iterator over time steps ([`run`])
//!
//! The engine never owns the graph or the condition set; it reads a
//! [`RunPlan`](core::RunPlan) prepared by the scheduler for one run call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::types::TimeScale;

/// Identifier keying one independent execution context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContextId(String);

impl ExecutionContextId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExecutionContextId {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl From<&str> for ExecutionContextId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ExecutionContextId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExecutionContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a context stands inside its current trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    /// No trial open; the next run call starts a fresh one.
    #[default]
    NotStarted,
    /// Between passes of an open trial.
    InTrial,
    /// Inside a pass, about to visit `set_index` of the runtime queue.
    InPass { set_index: usize, progressed: bool },
    /// The last trial ended with the RUN termination condition satisfied.
    RunTerminated,
}

/// Per-call knobs for [`Scheduler::run`](crate::dag::Scheduler::run).
#[derive(Debug, Clone)]
pub struct RunOptions<N> {
    /// Termination overrides merged over the scheduler's own for this call.
    pub termination: Option<BTreeMap<TimeScale, Condition<N>>>,
    /// Context to fork counters from when the target context is new.
    pub base_context: Option<ExecutionContextId>,
    /// Leave the TRIAL clock untouched when the trial ends.
    pub skip_trial_time_increment: bool,
}

impl<N> Default for RunOptions<N> {
    fn default() -> Self {
        Self {
            termination: None,
            base_context: None,
            skip_trial_time_increment: false,
        }
    }
}

impl<N> RunOptions<N> {
    pub fn with_termination(mut self, scale: TimeScale, condition: Condition<N>) -> Self {
        self.termination
            .get_or_insert_with(BTreeMap::new)
            .insert(scale, condition);
        self
    }

    pub fn with_base_context(mut self, base: impl Into<ExecutionContextId>) -> Self {
        self.base_context = Some(base.into());
        self
    }

    pub fn skip_trial_time_increment(mut self) -> Self {
        self.skip_trial_time_increment = true;
        self
    }
}

pub mod context;
pub mod core;
pub mod counts;
pub mod run;
pub mod termination;

pub use self::context::ContextState;
pub use self::core::RunPlan;
pub use self::counts::ExecutionCounts;
pub use self::run::Run;
pub use self::termination::TerminationConditions;
