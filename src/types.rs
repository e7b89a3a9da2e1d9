// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Nested units of scheduling time, finest first.
///
/// The derived ordering follows the nesting: `TimeStep < Pass < Trial < Run`.
/// Entering a new instance of a unit restarts every counter scoped to that
/// unit and to everything finer than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeScale {
    TimeStep,
    Pass,
    Trial,
    Run,
}

impl TimeScale {
    /// All scales, finest to coarsest.
    pub const ALL: [TimeScale; 4] = [
        TimeScale::TimeStep,
        TimeScale::Pass,
        TimeScale::Trial,
        TimeScale::Run,
    ];

    /// Dense index usable for fixed-size per-scale storage.
    pub fn index(self) -> usize {
        match self {
            TimeScale::TimeStep => 0,
            TimeScale::Pass => 1,
            TimeScale::Trial => 2,
            TimeScale::Run => 3,
        }
    }

    /// This scale and every finer one.
    pub fn and_finer(self) -> impl Iterator<Item = TimeScale> {
        TimeScale::ALL.into_iter().filter(move |ts| *ts <= self)
    }

    /// Every scale strictly coarser than this one.
    pub fn coarser(self) -> impl Iterator<Item = TimeScale> {
        TimeScale::ALL.into_iter().filter(move |ts| *ts > self)
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeScale::TimeStep => "TIME_STEP",
            TimeScale::Pass => "PASS",
            TimeScale::Trial => "TRIAL",
            TimeScale::Run => "RUN",
        };
        f.write_str(s)
    }
}

impl FromStr for TimeScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "time_step" | "timestep" => Ok(TimeScale::TimeStep),
            "pass" => Ok(TimeScale::Pass),
            "trial" => Ok(TimeScale::Trial),
            "run" => Ok(TimeScale::Run),
            other => Err(format!(
                "invalid time scale: {other} (expected TIME_STEP, PASS, TRIAL or RUN)"
            )),
        }
    }
}

/// Whether a condition gates a node in place or grants it extra positions.
///
/// - `Subtractive`: the node may run in its consideration set only while the
///   condition holds.
/// - `Additive`: the node gains eligibility outside its structural position,
///   e.g. "after every pass".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Additive,
    Subtractive,
}

impl Default for ConditionType {
    fn default() -> Self {
        ConditionType::Subtractive
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::Additive => f.write_str("additive"),
            ConditionType::Subtractive => f.write_str("subtractive"),
        }
    }
}
