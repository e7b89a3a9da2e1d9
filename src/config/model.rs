// src/config/model.rs

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Schedule file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// trials = 2
///
/// [termination]
/// TRIAL = { type = "after_n_calls", dependency = "C", n = 1 }
///
/// [node.A]
///
/// [node.B]
/// after = ["A"]
/// condition = { type = "every_n_calls", dependency = "A", n = 2 }
///
/// [rule.monitor]
/// condition = { type = "after_every_pass" }
/// ```
///
/// All sections are optional at this stage; validation decides what is
/// actually required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawScheduleFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Termination overrides keyed by time scale name (`TRIAL`, `RUN`).
    #[serde(default)]
    pub termination: BTreeMap<String, Condition<String>>,

    /// Graph nodes from `[node.<name>]`, in file order.
    #[serde(default)]
    pub node: IndexMap<String, NodeConfig>,

    /// Rule-based nodes from `[rule.<name>]`, in file order.
    #[serde(default)]
    pub rule: IndexMap<String, RuleConfig>,
}

/// Validated schedule file. Only obtainable through
/// `ScheduleFile::try_from(RawScheduleFile)` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ScheduleFile {
    pub config: ConfigSection,
    pub termination: BTreeMap<String, Condition<String>>,
    pub node: IndexMap<String, NodeConfig>,
    pub rule: IndexMap<String, RuleConfig>,
}

impl ScheduleFile {
    pub(crate) fn new_unchecked(raw: RawScheduleFile) -> Self {
        Self {
            config: raw.config,
            termination: raw.termination,
            node: raw.node,
            rule: raw.rule,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigSection {
    /// How many trials the CLI runs, and the trial bound consulted by
    /// `at_last_trial_of_run`.
    #[serde(default = "default_trials")]
    pub trials: u64,

    /// Execution context the CLI runs in.
    #[serde(default = "default_context")]
    pub context: String,
}

fn default_trials() -> u64 {
    1
}

fn default_context() -> String {
    crate::engine::ExecutionContextId::DEFAULT.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            context: default_context(),
        }
    }
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Nodes that must execute before this one. Cycles are allowed; the
    /// edges closing them are pruned as feedback.
    #[serde(default)]
    pub after: Vec<String>,

    /// Explicit condition; when absent the node gets the default derived
    /// from its structural parents.
    #[serde(default)]
    pub condition: Option<Condition<String>>,
}

/// `[rule.<name>]` section: a node outside the graph, placed by an
/// additive condition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    pub condition: Condition<String>,
}
