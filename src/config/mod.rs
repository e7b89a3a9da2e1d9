// src/config/mod.rs

//! Schedule file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a schedule file from disk (`loader.rs`).
//! - Validate it before a scheduler is built from it (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_schedule_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, NodeConfig, RawScheduleFile, RuleConfig, ScheduleFile};
