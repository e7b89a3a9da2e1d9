// src/condition/additive.rs

//! Additive conditions place their owner into extra positions of the base
//! queue. Each resolves to a set of [`InsertionPoint`]s and a subtractive
//! condition that limits how often the owner actually runs there.

use std::collections::BTreeSet;

use crate::condition::Condition;
use crate::dag::queue::{ConsiderationQueue, InsertionPoint};
use crate::dag::NodeId;
use crate::errors::{Result, SchedError};
use crate::types::TimeScale;

/// Result of resolving one additive condition against a base queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditiveModification {
    pub insertion_points: BTreeSet<InsertionPoint>,
    /// Subtractive condition the owner runs under at those points.
    pub condition: Condition<NodeId>,
}

/// Insertion points for `condition` against `base`.
pub fn insertion_points(
    base: &ConsiderationQueue,
    condition: &Condition<NodeId>,
) -> Result<BTreeSet<InsertionPoint>> {
    let len = base.len();
    let points = match condition {
        Condition::BeforeEveryTimeStep => (0..len)
            .map(|i| match i {
                0 => InsertionPoint::BeforeFirst,
                i => InsertionPoint::At(i - 1),
            })
            .collect(),
        Condition::AfterEveryTimeStep => (0..len)
            .map(|i| {
                if i + 1 < len {
                    InsertionPoint::At(i + 1)
                } else {
                    InsertionPoint::AfterLast
                }
            })
            .collect(),
        Condition::BeforeEveryPass | Condition::BeforeEveryTrial | Condition::BeforeEveryRun => {
            BTreeSet::from([InsertionPoint::BeforeFirst])
        }
        Condition::AfterEveryPass | Condition::AfterEveryTrial | Condition::AfterEveryRun => {
            BTreeSet::from([InsertionPoint::AfterLast])
        }
        Condition::All { conditions } | Condition::Any { conditions } => {
            let mut union = BTreeSet::new();
            for c in conditions {
                union.extend(insertion_points(base, c)?);
            }
            union
        }
        other => return Err(not_additive(other)),
    };
    Ok(points)
}

/// Subtractive stand-in for `condition` owned by `owner`.
///
/// `trial_bound` is the condition under which the current trial will end
/// after the pass in progress. It gates the trial- and run-end variants.
pub fn synthesized_condition(
    owner: NodeId,
    condition: &Condition<NodeId>,
    trial_bound: &Condition<NodeId>,
) -> Result<Condition<NodeId>> {
    let once_per = |scope: TimeScale| Condition::before_n_calls(owner, 1, scope);

    let synthesized = match condition {
        Condition::BeforeEveryTimeStep | Condition::AfterEveryTimeStep => Condition::Always,
        Condition::BeforeEveryPass | Condition::AfterEveryPass => once_per(TimeScale::Pass),
        Condition::BeforeEveryTrial => once_per(TimeScale::Trial),
        Condition::AfterEveryTrial => {
            Condition::all([once_per(TimeScale::Trial), trial_bound.clone()])
        }
        Condition::BeforeEveryRun => once_per(TimeScale::Run),
        Condition::AfterEveryRun => Condition::all([
            Condition::AtLastTrialOfRun,
            once_per(TimeScale::Trial),
            trial_bound.clone(),
        ]),
        Condition::All { conditions } => Condition::All {
            conditions: conditions
                .iter()
                .map(|c| synthesized_condition(owner, c, trial_bound))
                .collect::<Result<_>>()?,
        },
        Condition::Any { conditions } => Condition::Any {
            conditions: conditions
                .iter()
                .map(|c| synthesized_condition(owner, c, trial_bound))
                .collect::<Result<_>>()?,
        },
        other => return Err(not_additive(other)),
    };
    Ok(synthesized)
}

/// Resolve an additive condition into insertion points plus its
/// synthesized subtractive condition.
pub fn get_additive_modifications(
    base: &ConsiderationQueue,
    owner: NodeId,
    condition: &Condition<NodeId>,
    trial_bound: &Condition<NodeId>,
) -> Result<AdditiveModification> {
    Ok(AdditiveModification {
        insertion_points: insertion_points(base, condition)?,
        condition: synthesized_condition(owner, condition, trial_bound)?,
    })
}

fn not_additive(condition: &Condition<NodeId>) -> SchedError {
    SchedError::ConditionSetError(format!("{} is not an additive condition", condition.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(len: usize) -> ConsiderationQueue {
        ConsiderationQueue::from_sets((0..len).map(|i| BTreeSet::from([NodeId(i)])).collect())
    }

    #[test]
    fn before_every_time_step_covers_every_slot_ahead_of_a_set() {
        let points = insertion_points(&queue(3), &Condition::BeforeEveryTimeStep).unwrap();
        assert_eq!(
            points,
            BTreeSet::from([
                InsertionPoint::BeforeFirst,
                InsertionPoint::At(0),
                InsertionPoint::At(1)
            ])
        );
    }

    #[test]
    fn after_every_time_step_covers_every_slot_behind_a_set() {
        let points = insertion_points(&queue(3), &Condition::AfterEveryTimeStep).unwrap();
        assert_eq!(
            points,
            BTreeSet::from([
                InsertionPoint::At(1),
                InsertionPoint::At(2),
                InsertionPoint::AfterLast
            ])
        );
    }

    #[test]
    fn composite_unions_points_and_keeps_combinator() {
        let owner = NodeId(9);
        let cond = Condition::any([Condition::BeforeEveryPass, Condition::AfterEveryPass]);
        let m = get_additive_modifications(&queue(2), owner, &cond, &Condition::Never).unwrap();

        assert_eq!(
            m.insertion_points,
            BTreeSet::from([InsertionPoint::BeforeFirst, InsertionPoint::AfterLast])
        );
        assert_eq!(
            m.condition,
            Condition::any([
                Condition::before_n_calls(owner, 1, TimeScale::Pass),
                Condition::before_n_calls(owner, 1, TimeScale::Pass),
            ])
        );
    }

    #[test]
    fn after_every_trial_is_gated_by_trial_bound() {
        let owner = NodeId(0);
        let bound = Condition::after_n_passes(1);
        let cond = synthesized_condition(owner, &Condition::AfterEveryTrial, &bound).unwrap();
        assert_eq!(
            cond,
            Condition::all([Condition::before_n_calls(owner, 1, TimeScale::Trial), bound])
        );
    }

    #[test]
    fn subtractive_conditions_are_rejected() {
        let err = insertion_points(&queue(1), &Condition::Always).unwrap_err();
        assert!(matches!(err, SchedError::ConditionSetError(_)));
    }
}
