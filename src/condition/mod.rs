// src/condition/mod.rs

//! Execution predicates attached to nodes and to time scopes.
//!
//! - [`Condition`] is the predicate tree itself, generic over the node
//!   handle so callers build it with their own nodes and the scheduler
//!   evaluates it over [`NodeId`](crate::dag::NodeId)s.
//! - [`eval`] evaluates a condition against one execution context.
//! - [`additive`] resolves additive conditions into queue insertions plus
//!   an equivalent subtractive condition.
//! - [`set`] stores the per-node assignment.

pub mod additive;
pub mod eval;
pub mod set;

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedError};
use crate::types::{ConditionType, TimeScale};

pub use additive::{get_additive_modifications, AdditiveModification};
pub use eval::EvalState;
pub use set::ConditionSet;

fn default_scope() -> TimeScale {
    TimeScale::Trial
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// A predicate governing when a node may execute, or when a time scope ends.
///
/// Counting conditions take a `time_scale` naming the scope whose counters
/// they read (TRIAL unless stated). Time-step and pass conditions carry an
/// `offset` added to `n`; it is normally 0 and is shifted by
/// [`Condition::shift_time_thresholds`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition<N> {
    Always,
    Never,
    All {
        conditions: Vec<Condition<N>>,
    },
    Any {
        conditions: Vec<Condition<N>>,
    },
    Not {
        condition: Box<Condition<N>>,
    },

    /// `dependency` has executed at least `n` times since the owner last
    /// executed.
    EveryNCalls {
        dependency: N,
        n: u64,
    },
    BeforeNCalls {
        dependency: N,
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
    },
    AtNCalls {
        dependency: N,
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
    },
    AfterNCalls {
        dependency: N,
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
    },
    /// Combined executions of all `dependencies` reach `n`.
    AfterNCallsCombined {
        dependencies: Vec<N>,
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
    },
    /// Every dependency executed at least once in the scope. An empty list
    /// means every structural node.
    AllHaveRun {
        #[serde(default)]
        dependencies: Vec<N>,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
    },
    /// `dependency` executed in the most recent time step.
    JustRan {
        dependency: N,
    },

    BeforeTimeStep {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AtTimeStep {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AfterTimeStep {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AfterNTimeSteps {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    BeforePass {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AtPass {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AfterPass {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    AfterNPasses {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },
    EveryNPasses {
        n: u64,
        #[serde(default = "default_scope")]
        time_scale: TimeScale,
        #[serde(default, skip_serializing_if = "is_zero")]
        offset: i64,
    },

    // Trial counts are always relative to the current RUN.
    BeforeTrial {
        n: u64,
    },
    AtTrial {
        n: u64,
    },
    AfterTrial {
        n: u64,
    },
    AfterNTrials {
        n: u64,
    },
    AtTrialStart,
    /// Current trial is the last one of the declared trial bound.
    AtLastTrialOfRun,

    BeforeEveryTimeStep,
    AfterEveryTimeStep,
    BeforeEveryPass,
    AfterEveryPass,
    BeforeEveryTrial,
    AfterEveryTrial,
    BeforeEveryRun,
    AfterEveryRun,
}

impl<N> Condition<N> {
    pub fn all(conditions: impl IntoIterator<Item = Condition<N>>) -> Self {
        Condition::All {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition<N>>) -> Self {
        Condition::Any {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn every_n_calls(dependency: N, n: u64) -> Self {
        Condition::EveryNCalls { dependency, n }
    }

    pub fn before_n_calls(dependency: N, n: u64, time_scale: TimeScale) -> Self {
        Condition::BeforeNCalls {
            dependency,
            n,
            time_scale,
        }
    }

    pub fn at_n_calls(dependency: N, n: u64, time_scale: TimeScale) -> Self {
        Condition::AtNCalls {
            dependency,
            n,
            time_scale,
        }
    }

    pub fn after_n_calls(dependency: N, n: u64, time_scale: TimeScale) -> Self {
        Condition::AfterNCalls {
            dependency,
            n,
            time_scale,
        }
    }

    pub fn after_n_calls_combined(
        dependencies: impl IntoIterator<Item = N>,
        n: u64,
        time_scale: TimeScale,
    ) -> Self {
        Condition::AfterNCallsCombined {
            dependencies: dependencies.into_iter().collect(),
            n,
            time_scale,
        }
    }

    pub fn all_have_run(dependencies: impl IntoIterator<Item = N>, time_scale: TimeScale) -> Self {
        Condition::AllHaveRun {
            dependencies: dependencies.into_iter().collect(),
            time_scale,
        }
    }

    /// Every structural node executed at least once in the current trial.
    pub fn all_structural_have_run() -> Self {
        Condition::AllHaveRun {
            dependencies: Vec::new(),
            time_scale: TimeScale::Trial,
        }
    }

    pub fn just_ran(dependency: N) -> Self {
        Condition::JustRan { dependency }
    }

    pub fn before_time_step(n: u64) -> Self {
        Condition::BeforeTimeStep { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn at_time_step(n: u64) -> Self {
        Condition::AtTimeStep { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn after_time_step(n: u64) -> Self {
        Condition::AfterTimeStep { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn after_n_time_steps(n: u64) -> Self {
        Condition::AfterNTimeSteps { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn before_pass(n: u64) -> Self {
        Condition::BeforePass { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn at_pass(n: u64) -> Self {
        Condition::AtPass { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn after_pass(n: u64) -> Self {
        Condition::AfterPass { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn after_n_passes(n: u64) -> Self {
        Condition::AfterNPasses { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn every_n_passes(n: u64) -> Self {
        Condition::EveryNPasses { n, time_scale: TimeScale::Trial, offset: 0 }
    }

    pub fn at_trial(n: u64) -> Self {
        Condition::AtTrial { n }
    }

    pub fn after_n_trials(n: u64) -> Self {
        Condition::AfterNTrials { n }
    }

    /// Re-scope a counting or time-step/pass condition. Other conditions
    /// are returned unchanged.
    pub fn within(mut self, scope: TimeScale) -> Self {
        match &mut self {
            Condition::BeforeNCalls { time_scale, .. }
            | Condition::AtNCalls { time_scale, .. }
            | Condition::AfterNCalls { time_scale, .. }
            | Condition::AfterNCallsCombined { time_scale, .. }
            | Condition::AllHaveRun { time_scale, .. }
            | Condition::BeforeTimeStep { time_scale, .. }
            | Condition::AtTimeStep { time_scale, .. }
            | Condition::AfterTimeStep { time_scale, .. }
            | Condition::AfterNTimeSteps { time_scale, .. }
            | Condition::BeforePass { time_scale, .. }
            | Condition::AtPass { time_scale, .. }
            | Condition::AfterPass { time_scale, .. }
            | Condition::AfterNPasses { time_scale, .. }
            | Condition::EveryNPasses { time_scale, .. } => *time_scale = scope,
            _ => {}
        }
        self
    }

    /// Variant name, as used in logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Always => "Always",
            Condition::Never => "Never",
            Condition::All { .. } => "All",
            Condition::Any { .. } => "Any",
            Condition::Not { .. } => "Not",
            Condition::EveryNCalls { .. } => "EveryNCalls",
            Condition::BeforeNCalls { .. } => "BeforeNCalls",
            Condition::AtNCalls { .. } => "AtNCalls",
            Condition::AfterNCalls { .. } => "AfterNCalls",
            Condition::AfterNCallsCombined { .. } => "AfterNCallsCombined",
            Condition::AllHaveRun { .. } => "AllHaveRun",
            Condition::JustRan { .. } => "JustRan",
            Condition::BeforeTimeStep { .. } => "BeforeTimeStep",
            Condition::AtTimeStep { .. } => "AtTimeStep",
            Condition::AfterTimeStep { .. } => "AfterTimeStep",
            Condition::AfterNTimeSteps { .. } => "AfterNTimeSteps",
            Condition::BeforePass { .. } => "BeforePass",
            Condition::AtPass { .. } => "AtPass",
            Condition::AfterPass { .. } => "AfterPass",
            Condition::AfterNPasses { .. } => "AfterNPasses",
            Condition::EveryNPasses { .. } => "EveryNPasses",
            Condition::BeforeTrial { .. } => "BeforeTrial",
            Condition::AtTrial { .. } => "AtTrial",
            Condition::AfterTrial { .. } => "AfterTrial",
            Condition::AfterNTrials { .. } => "AfterNTrials",
            Condition::AtTrialStart => "AtTrialStart",
            Condition::AtLastTrialOfRun => "AtLastTrialOfRun",
            Condition::BeforeEveryTimeStep => "BeforeEveryTimeStep",
            Condition::AfterEveryTimeStep => "AfterEveryTimeStep",
            Condition::BeforeEveryPass => "BeforeEveryPass",
            Condition::AfterEveryPass => "AfterEveryPass",
            Condition::BeforeEveryTrial => "BeforeEveryTrial",
            Condition::AfterEveryTrial => "AfterEveryTrial",
            Condition::BeforeEveryRun => "BeforeEveryRun",
            Condition::AfterEveryRun => "AfterEveryRun",
        }
    }

    fn is_additive_primitive(&self) -> bool {
        matches!(
            self,
            Condition::BeforeEveryTimeStep
                | Condition::AfterEveryTimeStep
                | Condition::BeforeEveryPass
                | Condition::AfterEveryPass
                | Condition::BeforeEveryTrial
                | Condition::AfterEveryTrial
                | Condition::BeforeEveryRun
                | Condition::AfterEveryRun
        )
    }

    /// Resolve whether this condition is additive or subtractive.
    ///
    /// Composites take the type their operands agree on (an empty composite
    /// is subtractive). Mixing operand types, or negating an additive
    /// condition, is a `ConditionSetError`.
    pub fn condition_type(&self) -> Result<ConditionType> {
        match self {
            Condition::All { conditions } | Condition::Any { conditions } => {
                let mut resolved: Option<ConditionType> = None;
                for c in conditions {
                    let ty = c.condition_type()?;
                    match resolved {
                        Some(prev) if prev != ty => {
                            return Err(SchedError::ConditionSetError(format!(
                                "{} mixes additive and subtractive operands",
                                self.name()
                            )));
                        }
                        _ => resolved = Some(ty),
                    }
                }
                Ok(resolved.unwrap_or_default())
            }
            Condition::Not { condition } => match condition.condition_type()? {
                ConditionType::Subtractive => Ok(ConditionType::Subtractive),
                ConditionType::Additive => Err(SchedError::ConditionSetError(
                    "Not cannot negate an additive condition".to_string(),
                )),
            },
            c if c.is_additive_primitive() => Ok(ConditionType::Additive),
            _ => Ok(ConditionType::Subtractive),
        }
    }

    /// Additive primitives reachable through `All`/`Any`.
    pub fn additive_primitives(&self) -> Vec<&Condition<N>> {
        match self {
            Condition::All { conditions } | Condition::Any { conditions } => conditions
                .iter()
                .flat_map(|c| c.additive_primitives())
                .collect(),
            c if c.is_additive_primitive() => vec![c],
            _ => Vec::new(),
        }
    }

    /// Whether evaluation needs an owning node (anything containing
    /// `EveryNCalls`).
    pub fn requires_owner(&self) -> bool {
        match self {
            Condition::EveryNCalls { .. } => true,
            Condition::All { conditions } | Condition::Any { conditions } => {
                conditions.iter().any(|c| c.requires_owner())
            }
            Condition::Not { condition } => condition.requires_owner(),
            _ => false,
        }
    }

    /// Shift the threshold of every time-step and pass condition in this
    /// tree by `delta`, in place.
    pub fn shift_time_thresholds(&mut self, delta: i64) {
        match self {
            Condition::BeforeTimeStep { offset, .. }
            | Condition::AtTimeStep { offset, .. }
            | Condition::AfterTimeStep { offset, .. }
            | Condition::AfterNTimeSteps { offset, .. }
            | Condition::BeforePass { offset, .. }
            | Condition::AtPass { offset, .. }
            | Condition::AfterPass { offset, .. }
            | Condition::AfterNPasses { offset, .. }
            | Condition::EveryNPasses { offset, .. } => *offset += delta,
            Condition::All { conditions } | Condition::Any { conditions } => {
                for c in conditions.iter_mut() {
                    c.shift_time_thresholds(delta);
                }
            }
            Condition::Not { condition } => condition.shift_time_thresholds(delta),
            _ => {}
        }
    }

    /// Copy of this tree with time thresholds shifted by `delta`.
    pub fn with_time_offset(&self, delta: i64) -> Self
    where
        N: Clone,
    {
        let mut shifted = self.clone();
        shifted.shift_time_thresholds(delta);
        shifted
    }

    /// Rebuild this tree over a different node type.
    pub fn try_map_nodes<M, E>(
        &self,
        f: &mut impl FnMut(&N) -> std::result::Result<M, E>,
    ) -> std::result::Result<Condition<M>, E> {
        let mapped = match self {
            Condition::Always => Condition::Always,
            Condition::Never => Condition::Never,
            Condition::All { conditions } => Condition::All {
                conditions: conditions
                    .iter()
                    .map(|c| c.try_map_nodes(f))
                    .collect::<std::result::Result<_, _>>()?,
            },
            Condition::Any { conditions } => Condition::Any {
                conditions: conditions
                    .iter()
                    .map(|c| c.try_map_nodes(f))
                    .collect::<std::result::Result<_, _>>()?,
            },
            Condition::Not { condition } => Condition::Not {
                condition: Box::new(condition.try_map_nodes(f)?),
            },
            Condition::EveryNCalls { dependency, n } => Condition::EveryNCalls {
                dependency: f(dependency)?,
                n: *n,
            },
            Condition::BeforeNCalls { dependency, n, time_scale } => Condition::BeforeNCalls {
                dependency: f(dependency)?,
                n: *n,
                time_scale: *time_scale,
            },
            Condition::AtNCalls { dependency, n, time_scale } => Condition::AtNCalls {
                dependency: f(dependency)?,
                n: *n,
                time_scale: *time_scale,
            },
            Condition::AfterNCalls { dependency, n, time_scale } => Condition::AfterNCalls {
                dependency: f(dependency)?,
                n: *n,
                time_scale: *time_scale,
            },
            Condition::AfterNCallsCombined { dependencies, n, time_scale } => {
                Condition::AfterNCallsCombined {
                    dependencies: dependencies
                        .iter()
                        .map(&mut *f)
                        .collect::<std::result::Result<_, _>>()?,
                    n: *n,
                    time_scale: *time_scale,
                }
            }
            Condition::AllHaveRun { dependencies, time_scale } => Condition::AllHaveRun {
                dependencies: dependencies
                    .iter()
                    .map(&mut *f)
                    .collect::<std::result::Result<_, _>>()?,
                time_scale: *time_scale,
            },
            Condition::JustRan { dependency } => Condition::JustRan {
                dependency: f(dependency)?,
            },
            Condition::BeforeTimeStep { n, time_scale, offset } => Condition::BeforeTimeStep {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AtTimeStep { n, time_scale, offset } => Condition::AtTimeStep {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AfterTimeStep { n, time_scale, offset } => Condition::AfterTimeStep {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AfterNTimeSteps { n, time_scale, offset } => Condition::AfterNTimeSteps {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::BeforePass { n, time_scale, offset } => Condition::BeforePass {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AtPass { n, time_scale, offset } => Condition::AtPass {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AfterPass { n, time_scale, offset } => Condition::AfterPass {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::AfterNPasses { n, time_scale, offset } => Condition::AfterNPasses {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::EveryNPasses { n, time_scale, offset } => Condition::EveryNPasses {
                n: *n,
                time_scale: *time_scale,
                offset: *offset,
            },
            Condition::BeforeTrial { n } => Condition::BeforeTrial { n: *n },
            Condition::AtTrial { n } => Condition::AtTrial { n: *n },
            Condition::AfterTrial { n } => Condition::AfterTrial { n: *n },
            Condition::AfterNTrials { n } => Condition::AfterNTrials { n: *n },
            Condition::AtTrialStart => Condition::AtTrialStart,
            Condition::AtLastTrialOfRun => Condition::AtLastTrialOfRun,
            Condition::BeforeEveryTimeStep => Condition::BeforeEveryTimeStep,
            Condition::AfterEveryTimeStep => Condition::AfterEveryTimeStep,
            Condition::BeforeEveryPass => Condition::BeforeEveryPass,
            Condition::AfterEveryPass => Condition::AfterEveryPass,
            Condition::BeforeEveryTrial => Condition::BeforeEveryTrial,
            Condition::AfterEveryTrial => Condition::AfterEveryTrial,
            Condition::BeforeEveryRun => Condition::BeforeEveryRun,
            Condition::AfterEveryRun => Condition::AfterEveryRun,
        };
        Ok(mapped)
    }
}

impl<N> ops::Not for Condition<N> {
    type Output = Condition<N>;

    fn not(self) -> Self::Output {
        Condition::Not {
            condition: Box::new(self),
        }
    }
}

impl<N: fmt::Debug> fmt::Display for Condition<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<N: fmt::Debug>(f: &mut fmt::Formatter<'_>, items: &[Condition<N>]) -> fmt::Result {
            for (i, c) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{c}")?;
            }
            Ok(())
        }

        let name = self.name();
        match self {
            Condition::All { conditions } | Condition::Any { conditions } => {
                write!(f, "{name}(")?;
                list(f, conditions)?;
                f.write_str(")")
            }
            Condition::Not { condition } => write!(f, "Not({condition})"),
            Condition::EveryNCalls { dependency, n } => write!(f, "{name}({dependency:?}, {n})"),
            Condition::BeforeNCalls { dependency, n, time_scale }
            | Condition::AtNCalls { dependency, n, time_scale }
            | Condition::AfterNCalls { dependency, n, time_scale } => {
                write!(f, "{name}({dependency:?}, {n}, {time_scale})")
            }
            Condition::AfterNCallsCombined { dependencies, n, time_scale } => {
                write!(f, "{name}({dependencies:?}, {n}, {time_scale})")
            }
            Condition::AllHaveRun { dependencies, time_scale } => {
                write!(f, "{name}({dependencies:?}, {time_scale})")
            }
            Condition::JustRan { dependency } => write!(f, "{name}({dependency:?})"),
            Condition::BeforeTimeStep { n, time_scale, offset }
            | Condition::AtTimeStep { n, time_scale, offset }
            | Condition::AfterTimeStep { n, time_scale, offset }
            | Condition::AfterNTimeSteps { n, time_scale, offset }
            | Condition::BeforePass { n, time_scale, offset }
            | Condition::AtPass { n, time_scale, offset }
            | Condition::AfterPass { n, time_scale, offset }
            | Condition::AfterNPasses { n, time_scale, offset }
            | Condition::EveryNPasses { n, time_scale, offset } => {
                if *offset == 0 {
                    write!(f, "{name}({n}, {time_scale})")
                } else {
                    write!(f, "{name}({n}{offset:+}, {time_scale})")
                }
            }
            Condition::BeforeTrial { n }
            | Condition::AtTrial { n }
            | Condition::AfterTrial { n }
            | Condition::AfterNTrials { n } => write!(f, "{name}({n})"),
            _ => write!(f, "{name}()"),
        }
    }
}
