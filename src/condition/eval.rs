// src/condition/eval.rs

use std::collections::BTreeSet;

use crate::clock::Clock;
use crate::condition::Condition;
use crate::dag::NodeId;
use crate::engine::counts::ExecutionCounts;
use crate::types::TimeScale;

/// Read-only view of one execution context, as seen by condition
/// evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalState<'a> {
    pub counts: &'a ExecutionCounts,
    pub clock: &'a Clock,
    /// Nodes executed in the most recent time step, if any.
    pub last_time_step: Option<&'a BTreeSet<NodeId>>,
    /// Target of `AllHaveRun` with an empty dependency list.
    pub structural_nodes: &'a [NodeId],
    pub num_trials: Option<u64>,
}

#[derive(Clone, Copy)]
enum Cmp {
    Before,
    At,
    After,
    AtLeast,
    Every,
}

impl Cmp {
    fn holds(self, count: i128, threshold: i128) -> bool {
        match self {
            Cmp::Before => count < threshold,
            Cmp::At => count == threshold,
            Cmp::After => count > threshold,
            Cmp::AtLeast => count >= threshold,
            Cmp::Every => threshold > 0 && count % threshold == 0,
        }
    }
}

// Widened so that no `u64` threshold plus offset can wrap.
fn threshold(n: u64, offset: i64) -> i128 {
    i128::from(n) + i128::from(offset)
}

impl Condition<NodeId> {
    /// Evaluate against `state`. `owner` is the node this condition gates,
    /// or `None` for termination conditions.
    ///
    /// Evaluation never mutates counters.
    pub fn is_satisfied(&self, state: &EvalState<'_>, owner: Option<NodeId>) -> bool {
        let counts = state.counts;
        let clock = state.clock;

        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::All { conditions } => conditions.iter().all(|c| c.is_satisfied(state, owner)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.is_satisfied(state, owner)),
            Condition::Not { condition } => !condition.is_satisfied(state, owner),

            Condition::EveryNCalls { dependency, n } => match owner {
                Some(owner) => counts.useable(*dependency, owner) >= *n,
                None => false,
            },
            Condition::BeforeNCalls { dependency, n, time_scale } => {
                counts.total(*time_scale, *dependency) < *n
            }
            Condition::AtNCalls { dependency, n, time_scale } => {
                counts.total(*time_scale, *dependency) == *n
            }
            Condition::AfterNCalls { dependency, n, time_scale } => {
                counts.total(*time_scale, *dependency) >= *n
            }
            Condition::AfterNCallsCombined { dependencies, n, time_scale } => {
                let combined: u64 = dependencies
                    .iter()
                    .map(|d| counts.total(*time_scale, *d))
                    .sum();
                combined >= *n
            }
            Condition::AllHaveRun { dependencies, time_scale } => {
                let targets = if dependencies.is_empty() {
                    state.structural_nodes
                } else {
                    dependencies.as_slice()
                };
                targets.iter().all(|d| counts.total(*time_scale, *d) >= 1)
            }
            Condition::JustRan { dependency } => state
                .last_time_step
                .is_some_and(|set| set.contains(dependency)),

            Condition::BeforeTimeStep { n, time_scale, offset } => {
                time_step_cmp(clock, *time_scale, Cmp::Before, *n, *offset)
            }
            Condition::AtTimeStep { n, time_scale, offset } => {
                time_step_cmp(clock, *time_scale, Cmp::At, *n, *offset)
            }
            Condition::AfterTimeStep { n, time_scale, offset } => {
                time_step_cmp(clock, *time_scale, Cmp::After, *n, *offset)
            }
            Condition::AfterNTimeSteps { n, time_scale, offset } => {
                time_step_cmp(clock, *time_scale, Cmp::AtLeast, *n, *offset)
            }
            Condition::BeforePass { n, time_scale, offset } => {
                pass_cmp(clock, *time_scale, Cmp::Before, *n, *offset)
            }
            Condition::AtPass { n, time_scale, offset } => {
                pass_cmp(clock, *time_scale, Cmp::At, *n, *offset)
            }
            Condition::AfterPass { n, time_scale, offset } => {
                pass_cmp(clock, *time_scale, Cmp::After, *n, *offset)
            }
            Condition::AfterNPasses { n, time_scale, offset } => {
                pass_cmp(clock, *time_scale, Cmp::AtLeast, *n, *offset)
            }
            Condition::EveryNPasses { n, time_scale, offset } => {
                pass_cmp(clock, *time_scale, Cmp::Every, *n, *offset)
            }

            Condition::BeforeTrial { n } => trial_cmp(clock, Cmp::Before, *n),
            Condition::AtTrial { n } => trial_cmp(clock, Cmp::At, *n),
            Condition::AfterTrial { n } => trial_cmp(clock, Cmp::After, *n),
            Condition::AfterNTrials { n } => trial_cmp(clock, Cmp::AtLeast, *n),
            Condition::AtTrialStart => {
                clock.total_relative(TimeScale::TimeStep, TimeScale::Trial) == 0
            }
            Condition::AtLastTrialOfRun => state.num_trials.is_some_and(|total| {
                clock.total_relative(TimeScale::Trial, TimeScale::Run) + 1 == total
            }),

            // Additive conditions only act through queue insertion.
            Condition::BeforeEveryTimeStep
            | Condition::AfterEveryTimeStep
            | Condition::BeforeEveryPass
            | Condition::AfterEveryPass
            | Condition::BeforeEveryTrial
            | Condition::AfterEveryTrial
            | Condition::BeforeEveryRun
            | Condition::AfterEveryRun => false,
        }
    }
}

fn time_step_cmp(clock: &Clock, scope: TimeScale, cmp: Cmp, n: u64, offset: i64) -> bool {
    let count = i128::from(clock.total_relative(TimeScale::TimeStep, scope));
    cmp.holds(count, threshold(n, offset))
}

fn pass_cmp(clock: &Clock, scope: TimeScale, cmp: Cmp, n: u64, offset: i64) -> bool {
    let count = i128::from(clock.total_relative(TimeScale::Pass, scope));
    cmp.holds(count, threshold(n, offset))
}

fn trial_cmp(clock: &Clock, cmp: Cmp, n: u64) -> bool {
    let count = i128::from(clock.total_relative(TimeScale::Trial, TimeScale::Run));
    cmp.holds(count, threshold(n, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    fn view<'a>(counts: &'a ExecutionCounts, clock: &'a Clock, nodes: &'a [NodeId]) -> EvalState<'a> {
        EvalState {
            counts,
            clock,
            last_time_step: None,
            structural_nodes: nodes,
            num_trials: None,
        }
    }

    #[test]
    fn every_n_calls_reads_useable_counts_for_owner() {
        let nodes = ids(2);
        let (a, b) = (nodes[0], nodes[1]);
        let mut counts = ExecutionCounts::new(2);
        let clock = Clock::default();
        let cond = Condition::every_n_calls(a, 2);

        counts.record_execution(a);
        assert!(!cond.is_satisfied(&view(&counts, &clock, &nodes), Some(b)));
        assert!(!cond.is_satisfied(&view(&counts, &clock, &nodes), None));

        counts.record_execution(a);
        assert!(cond.is_satisfied(&view(&counts, &clock, &nodes), Some(b)));

        // The owner executing consumes its incoming counts.
        counts.record_execution(b);
        assert!(!cond.is_satisfied(&view(&counts, &clock, &nodes), Some(b)));
    }

    #[test]
    fn pass_conditions_respect_offset() {
        let nodes = ids(1);
        let counts = ExecutionCounts::new(1);
        let mut clock = Clock::default();
        clock.increment(TimeScale::Pass);
        clock.increment(TimeScale::Pass);
        let state = view(&counts, &clock, &nodes);

        assert!(Condition::<NodeId>::at_pass(2).is_satisfied(&state, None));
        assert!(!Condition::<NodeId>::at_pass(3).is_satisfied(&state, None));
        assert!(Condition::<NodeId>::at_pass(3).with_time_offset(-1).is_satisfied(&state, None));
        assert!(Condition::<NodeId>::every_n_passes(2).is_satisfied(&state, None));
        assert!(!Condition::<NodeId>::every_n_passes(0).is_satisfied(&state, None));
    }

    #[test]
    fn unreachable_thresholds_stay_unreached() {
        let nodes = ids(1);
        let counts = ExecutionCounts::new(1);
        let mut clock = Clock::default();
        clock.increment(TimeScale::Trial);
        clock.increment(TimeScale::Pass);
        clock.increment(TimeScale::TimeStep);
        let state = view(&counts, &clock, &nodes);

        let max = u64::MAX;
        let after: [Condition<NodeId>; 4] = [
            Condition::after_n_passes(max),
            Condition::after_pass(max),
            Condition::after_n_time_steps(max).within(TimeScale::Run),
            Condition::after_n_trials(max),
        ];
        for cond in &after {
            assert!(!cond.is_satisfied(&state, None), "{cond}");
        }

        let at: [Condition<NodeId>; 3] = [
            Condition::at_pass(max),
            Condition::at_time_step(max),
            Condition::at_trial(max),
        ];
        for cond in &at {
            assert!(!cond.is_satisfied(&state, None), "{cond}");
        }

        let before: [Condition<NodeId>; 3] = [
            Condition::before_pass(max),
            Condition::before_time_step(max).within(TimeScale::Run),
            Condition::BeforeTrial { n: max },
        ];
        for cond in &before {
            assert!(cond.is_satisfied(&state, None), "{cond}");
        }

        // A negative offset still lands on the right side of a huge n.
        assert!(!Condition::<NodeId>::after_n_passes(max).with_time_offset(-1).is_satisfied(&state, None));
        assert!(!Condition::<NodeId>::every_n_passes(max).is_satisfied(&state, None));
    }

    #[test]
    fn last_trial_requires_declared_bound() {
        let nodes = ids(1);
        let counts = ExecutionCounts::new(1);
        let mut clock = Clock::default();
        clock.increment(TimeScale::Trial);

        let mut state = view(&counts, &clock, &nodes);
        let cond = Condition::<NodeId>::AtLastTrialOfRun;
        assert!(!cond.is_satisfied(&state, None));

        state.num_trials = Some(2);
        assert!(cond.is_satisfied(&state, None));

        state.num_trials = Some(3);
        assert!(!cond.is_satisfied(&state, None));
    }

    #[test]
    fn all_have_run_defaults_to_structural_nodes() {
        let nodes = ids(2);
        let mut counts = ExecutionCounts::new(2);
        let clock = Clock::default();
        counts.record_execution(nodes[0]);

        let cond = Condition::<NodeId>::all_structural_have_run();
        assert!(!cond.is_satisfied(&view(&counts, &clock, &nodes), None));

        counts.record_execution(nodes[1]);
        assert!(cond.is_satisfied(&view(&counts, &clock, &nodes), None));
    }

    #[test]
    fn just_ran_looks_only_at_last_time_step() {
        let nodes = ids(2);
        let counts = ExecutionCounts::new(2);
        let clock = Clock::default();
        let last: BTreeSet<NodeId> = [nodes[1]].into_iter().collect();

        let mut state = view(&counts, &clock, &nodes);
        assert!(!Condition::just_ran(nodes[1]).is_satisfied(&state, None));

        state.last_time_step = Some(&last);
        assert!(Condition::just_ran(nodes[1]).is_satisfied(&state, None));
        assert!(!Condition::just_ran(nodes[0]).is_satisfied(&state, None));
    }
}
