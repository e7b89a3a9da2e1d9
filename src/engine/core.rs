// src/engine/core.rs

//! Pure run state machine.
//!
//! [`RunPlan`] holds everything fixed for the duration of one run call:
//! the runtime consideration queue, the effective per-node conditions, and
//! the effective termination conditions. [`RunPlan::next_time_step`]
//! advances a [`ContextState`] to its next emitted time step.
//!
//! No IO happens here and nothing is shared between contexts, so the core
//! can be unit tested directly against hand-built plans.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info, trace};

use crate::condition::{Condition, EvalState};
use crate::dag::queue::ConsiderationQueue;
use crate::dag::NodeId;
use crate::engine::context::ContextState;
use crate::engine::termination::TerminationConditions;
use crate::engine::RunPhase;
use crate::types::TimeScale;

/// Fixed inputs for one run call.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub(crate) queue: ConsiderationQueue,
    /// Effective condition per node, indexed by [`NodeId`].
    pub(crate) conditions: Vec<Option<Condition<NodeId>>>,
    pub(crate) termination: TerminationConditions<NodeId>,
    pub(crate) structural_nodes: Vec<NodeId>,
    pub(crate) num_trials: Option<u64>,
    pub(crate) skip_trial_time_increment: bool,
}

impl RunPlan {
    pub fn queue(&self) -> &ConsiderationQueue {
        &self.queue
    }

    pub fn termination(&self) -> &TerminationConditions<NodeId> {
        &self.termination
    }

    pub fn condition_of(&self, node: NodeId) -> Option<&Condition<NodeId>> {
        self.conditions.get(node.index()).and_then(|c| c.as_ref())
    }

    fn eval_state<'a>(&'a self, state: &'a ContextState) -> EvalState<'a> {
        EvalState {
            counts: &state.counts,
            clock: &state.clock,
            last_time_step: state.trace.last(),
            structural_nodes: &self.structural_nodes,
            num_trials: self.num_trials,
        }
    }

    pub fn trial_terminated(&self, state: &ContextState) -> bool {
        self.termination.trial.is_satisfied(&self.eval_state(state), None)
    }

    pub fn run_terminated(&self, state: &ContextState) -> bool {
        self.termination.run.is_satisfied(&self.eval_state(state), None)
    }

    fn should_stop(&self, state: &ContextState) -> bool {
        self.trial_terminated(state) || self.run_terminated(state)
    }

    /// Advance `state` to its next time step.
    ///
    /// Returns the nodes executed in that time step (empty for a stalled
    /// pass), or `None` once the trial has ended. The clock is advanced
    /// before returning, so `state` is always left at a resumable boundary.
    pub fn next_time_step(&self, state: &mut ContextState) -> Option<BTreeSet<NodeId>> {
        loop {
            match state.phase {
                RunPhase::NotStarted | RunPhase::RunTerminated => {
                    state.counts.reset_useable();
                    state.counts.reset_total(TimeScale::Trial);
                    debug!(trial = state.clock.time().trial, "starting trial");
                    state.phase = RunPhase::InTrial;
                }
                RunPhase::InTrial => {
                    if self.should_stop(state) {
                        self.finish_trial(state);
                        return None;
                    }
                    state.counts.reset_total(TimeScale::Pass);
                    state.phase = RunPhase::InPass {
                        set_index: 0,
                        progressed: false,
                    };
                }
                RunPhase::InPass {
                    set_index,
                    progressed,
                } => {
                    if set_index >= self.queue.len() || self.should_stop(state) {
                        state.phase = RunPhase::InTrial;
                        let stalled = !progressed;
                        if stalled {
                            debug!(
                                pass = state.clock.time().pass,
                                "no node was eligible during pass; emitting empty time step"
                            );
                            state.trace.push(BTreeSet::new());
                            state.clock.increment(TimeScale::TimeStep);
                        }
                        state.clock.increment(TimeScale::Pass);
                        if stalled {
                            return Some(BTreeSet::new());
                        }
                        continue;
                    }

                    state.counts.reset_total(TimeScale::TimeStep);
                    let executed = self.execute_consideration_set(state, set_index);
                    state.phase = RunPhase::InPass {
                        set_index: set_index + 1,
                        progressed: progressed || !executed.is_empty(),
                    };
                    if !executed.is_empty() {
                        state.trace.push(executed.clone());
                        state.clock.increment(TimeScale::TimeStep);
                        return Some(executed);
                    }
                }
            }
        }
    }

    /// Evaluate the set at `set_index` to a fixed point: keep sweeping until
    /// a sweep adds nothing. Each node executes at most once per time step.
    fn execute_consideration_set(
        &self,
        state: &mut ContextState,
        set_index: usize,
    ) -> BTreeSet<NodeId> {
        let mut executed = BTreeSet::new();
        let Some(set) = self.queue.get(set_index) else {
            return executed;
        };

        loop {
            let mut changed = false;
            for &node in set {
                if executed.contains(&node) {
                    continue;
                }
                let satisfied = self
                    .condition_of(node)
                    .is_some_and(|c| c.is_satisfied(&self.eval_state(state), Some(node)));
                if satisfied {
                    trace!(%node, set_index, "node eligible");
                    executed.insert(node);
                    state.counts.record_execution(node);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        executed
    }

    fn finish_trial(&self, state: &mut ContextState) {
        if !self.skip_trial_time_increment {
            state.clock.increment(TimeScale::Trial);
        }
        if self.run_terminated(state) {
            let now = Utc::now();
            info!(at = %now, "run termination condition satisfied");
            state.last_run_end = Some(now);
            state.phase = RunPhase::RunTerminated;
        } else {
            state.phase = RunPhase::NotStarted;
        }
    }
}
