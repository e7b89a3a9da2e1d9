// src/clock.rs

//! Per-context clock tracking how many units of each [`TimeScale`] have
//! elapsed inside the currently open instance of every coarser scale.

use serde::Serialize;

use crate::types::TimeScale;

/// Snapshot of a clock's current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Time {
    pub run: u64,
    pub trial: u64,
    pub pass: u64,
    pub time_step: u64,
}

/// Nested time counters for one execution context.
///
/// `relative[base][unit]` holds the number of `unit`s completed within the
/// current `base` instance. Only entries with `unit < base` are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clock {
    relative: [[u64; 4]; 4],
    runs: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the completion of one `time_scale` unit.
    ///
    /// Every coarser scope counts one more `time_scale`; the scope of
    /// `time_scale` itself and all finer scopes start over.
    pub fn increment(&mut self, time_scale: TimeScale) {
        for base in time_scale.coarser() {
            self.relative[base.index()][time_scale.index()] += 1;
        }
        for base in time_scale.and_finer() {
            self.relative[base.index()] = [0; 4];
        }
        if time_scale == TimeScale::Run {
            self.runs += 1;
        }
    }

    /// Number of `unit`s elapsed within the current `base` instance.
    ///
    /// Returns 0 when `unit` is not finer than `base`.
    pub fn total_relative(&self, unit: TimeScale, base: TimeScale) -> u64 {
        if unit >= base {
            return 0;
        }
        self.relative[base.index()][unit.index()]
    }

    /// Runs completed over the life of this clock.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Current position: trial within run, pass within trial, time step
    /// within pass.
    pub fn time(&self) -> Time {
        Time {
            run: self.runs,
            trial: self.total_relative(TimeScale::Trial, TimeScale::Run),
            pass: self.total_relative(TimeScale::Pass, TimeScale::Trial),
            time_step: self.total_relative(TimeScale::TimeStep, TimeScale::Pass),
        }
    }
}
