// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawScheduleFile, ScheduleFile};
use crate::errors::Result;

/// Load a schedule file from a given path and return the raw
/// `RawScheduleFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawScheduleFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let schedule: RawScheduleFile = toml::from_str(&contents)?;

    Ok(schedule)
}

/// Load a schedule file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown `after` references,
///   - termination keys other than TRIAL / RUN,
///   - rule nodes without an additive condition,
///   - basic global config sanity.
///
/// Cycles are not rejected here; the scheduler prunes feedback edges.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ScheduleFile> {
    let raw = load_from_path(&path)?;
    let schedule = ScheduleFile::try_from(raw)?;
    Ok(schedule)
}

/// `Schedule.toml` in the current working directory.
pub fn default_schedule_path() -> PathBuf {
    PathBuf::from("Schedule.toml")
}
