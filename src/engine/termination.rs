// src/engine/termination.rs

//! Termination conditions for TRIAL and RUN, and how additive conditions
//! reshape them.

use std::collections::BTreeMap;

use crate::condition::Condition;
use crate::dag::queue::ConsiderationQueue;
use crate::dag::NodeId;
use crate::errors::{Result, SchedError};
use crate::types::{ConditionType, TimeScale};

/// End conditions for the TRIAL and RUN scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationConditions<N> {
    pub trial: Condition<N>,
    pub run: Condition<N>,
}

impl<N> Default for TerminationConditions<N> {
    /// A trial ends once every structural node has executed; a run never
    /// ends by itself.
    fn default() -> Self {
        Self {
            trial: Condition::all_structural_have_run(),
            run: Condition::Never,
        }
    }
}

impl<N: Clone> TerminationConditions<N> {
    /// Copy of `self` with `overrides` applied on top.
    ///
    /// Only TRIAL and RUN may be overridden.
    pub fn merged(&self, overrides: &BTreeMap<TimeScale, Condition<N>>) -> Result<Self> {
        let mut merged = self.clone();
        for (scale, condition) in overrides {
            match scale {
                TimeScale::Trial => merged.trial = condition.clone(),
                TimeScale::Run => merged.run = condition.clone(),
                other => {
                    return Err(SchedError::SchedulerError(format!(
                        "termination conditions can only be set for TRIAL or RUN, not {other}"
                    )));
                }
            }
        }
        Ok(merged)
    }

    pub fn get(&self, scale: TimeScale) -> Option<&Condition<N>> {
        match scale {
            TimeScale::Trial => Some(&self.trial),
            TimeScale::Run => Some(&self.run),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeScale, &Condition<N>)> {
        [(TimeScale::Trial, &self.trial), (TimeScale::Run, &self.run)].into_iter()
    }

    pub fn try_map_nodes<M, E>(
        &self,
        f: &mut impl FnMut(&N) -> std::result::Result<M, E>,
    ) -> std::result::Result<TerminationConditions<M>, E> {
        Ok(TerminationConditions {
            trial: self.trial.try_map_nodes(f)?,
            run: self.run.try_map_nodes(f)?,
        })
    }
}

impl<N> TerminationConditions<N> {
    /// Reject conditions that cannot gate a time scope: additive ones and
    /// ones that need an owning node.
    pub fn validate(&self) -> Result<()> {
        for (scale, condition) in [(TimeScale::Trial, &self.trial), (TimeScale::Run, &self.run)] {
            if !matches!(condition.condition_type(), Ok(ConditionType::Subtractive)) {
                return Err(SchedError::SchedulerError(format!(
                    "{scale} termination condition {} must be subtractive",
                    condition.name()
                )));
            }
            if condition.requires_owner() {
                return Err(SchedError::SchedulerError(format!(
                    "{scale} termination condition {} needs an owning node",
                    condition.name()
                )));
            }
        }
        Ok(())
    }
}

/// Condition under which the trial will end once the pass in progress
/// completes.
///
/// Time-based thresholds in the TRIAL condition move down by one, and
/// every node placed by a time-step additive condition must have reached
/// all of its slots in the runtime queue.
pub(crate) fn trial_bound(
    termination: &TerminationConditions<NodeId>,
    additive: &BTreeMap<NodeId, Condition<NodeId>>,
    runtime_queue: &ConsiderationQueue,
) -> Condition<NodeId> {
    let adjusted = termination.trial.with_time_offset(-1);
    let mut bounds = time_step_call_bounds(additive, runtime_queue);
    if bounds.is_empty() {
        return adjusted;
    }
    bounds.insert(0, adjusted);
    Condition::All { conditions: bounds }
}

/// Effective termination conditions once additive conditions are taken
/// into account.
///
/// - per-time-step nodes hold the trial open until they ran at each slot
/// - after-pass and after-trial nodes hold it open until they just ran
/// - after-run nodes do so only on the last trial of the run
pub(crate) fn adjusted_for_additive(
    termination: &TerminationConditions<NodeId>,
    additive: &BTreeMap<NodeId, Condition<NodeId>>,
    runtime_queue: &ConsiderationQueue,
) -> TerminationConditions<NodeId> {
    let mut general = vec![termination.trial.clone()];
    general.extend(time_step_call_bounds(additive, runtime_queue));
    let mut last_trial = Vec::new();

    for (&owner, condition) in additive {
        for primitive in condition.additive_primitives() {
            match primitive {
                Condition::AfterEveryPass | Condition::AfterEveryTrial => {
                    general.push(Condition::just_ran(owner));
                }
                Condition::AfterEveryRun => last_trial.push(Condition::just_ran(owner)),
                _ => {}
            }
        }
    }

    let trial = match (general.len(), last_trial.is_empty()) {
        (1, true) => termination.trial.clone(),
        (_, true) => Condition::All { conditions: general },
        (_, false) => {
            let mut on_last = vec![Condition::AtLastTrialOfRun, termination.trial.clone()];
            on_last.extend(last_trial);
            general.push(!Condition::AtLastTrialOfRun);
            Condition::any([
                Condition::All { conditions: general },
                Condition::All { conditions: on_last },
            ])
        }
    };

    TerminationConditions {
        trial,
        run: termination.run.clone(),
    }
}

fn time_step_call_bounds(
    additive: &BTreeMap<NodeId, Condition<NodeId>>,
    runtime_queue: &ConsiderationQueue,
) -> Vec<Condition<NodeId>> {
    additive
        .iter()
        .filter(|(_, condition)| {
            condition.additive_primitives().iter().any(|p| {
                matches!(p, Condition::BeforeEveryTimeStep | Condition::AfterEveryTimeStep)
            })
        })
        .map(|(&owner, _)| {
            let slots = runtime_queue.occurrences(owner) as u64;
            Condition::after_n_calls(owner, slots, TimeScale::Pass)
        })
        .collect()
}
