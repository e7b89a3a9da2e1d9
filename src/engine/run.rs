// src/engine/run.rs

use std::iter::FusedIterator;

use indexmap::IndexSet;

use crate::clock::Clock;
use crate::dag::registry::{Node, NodeRegistry};
use crate::engine::context::ContextState;
use crate::engine::core::RunPlan;
use crate::engine::{ExecutionContextId, RunPhase};
use crate::types::TimeScale;

/// One run call over one execution context.
///
/// Yields the nodes executed in each time step until the trial ends.
/// Dropping a `Run` early is cancellation: the context keeps its counters,
/// clock and position, and the next run call resumes from there.
#[derive(Debug)]
pub struct Run<'s, N> {
    plan: RunPlan,
    state: &'s mut ContextState,
    registry: &'s NodeRegistry<N>,
    context: ExecutionContextId,
    finished: bool,
}

impl<'s, N: Node> Run<'s, N> {
    pub(crate) fn new(
        plan: RunPlan,
        state: &'s mut ContextState,
        registry: &'s NodeRegistry<N>,
        context: ExecutionContextId,
    ) -> Self {
        Self {
            plan,
            state,
            registry,
            context,
            finished: false,
        }
    }

    /// Advance to the next time step. `None` once the trial has ended.
    pub fn next_time_step(&mut self) -> Option<IndexSet<N>> {
        if self.finished {
            return None;
        }
        match self.plan.next_time_step(self.state) {
            Some(ids) => Some(self.registry.resolve_all(&ids)),
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Whether the current instance of `scope` has ended.
    ///
    /// TIME_STEP is always finished between calls; PASS when no pass is in
    /// progress; TRIAL and RUN when their termination condition holds (or
    /// this run has already returned its last time step).
    pub fn is_finished(&self, scope: TimeScale) -> bool {
        match scope {
            TimeScale::TimeStep => true,
            TimeScale::Pass => !matches!(self.state.phase, RunPhase::InPass { .. }),
            TimeScale::Trial => self.finished || self.plan.trial_terminated(self.state),
            TimeScale::Run => {
                self.state.phase == RunPhase::RunTerminated || self.plan.run_terminated(self.state)
            }
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.state.clock
    }

    pub fn context(&self) -> &ExecutionContextId {
        &self.context
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }
}

impl<N: Node> Iterator for Run<'_, N> {
    type Item = IndexSet<N>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_time_step()
    }
}

impl<N: Node> FusedIterator for Run<'_, N> {}
