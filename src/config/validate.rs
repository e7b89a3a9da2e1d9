// src/config/validate.rs

use std::str::FromStr;

use crate::config::model::{RawScheduleFile, ScheduleFile};
use crate::errors::{Result, SchedError};
use crate::types::{ConditionType, TimeScale};

impl TryFrom<RawScheduleFile> for ScheduleFile {
    type Error = crate::errors::SchedError;

    fn try_from(raw: RawScheduleFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_schedule(&raw)?;
        Ok(ScheduleFile::new_unchecked(raw))
    }
}

fn validate_raw_schedule(cfg: &RawScheduleFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_global_config(cfg)?;
    validate_node_dependencies(cfg)?;
    validate_termination(cfg)?;
    validate_rules(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawScheduleFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(SchedError::ConfigError(
            "schedule must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawScheduleFile) -> Result<()> {
    if cfg.config.trials == 0 {
        return Err(SchedError::ConfigError(
            "[config].trials must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.context.trim().is_empty() {
        return Err(SchedError::ConfigError(
            "[config].context must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_dependencies(cfg: &RawScheduleFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        for dep in node.after.iter() {
            if !cfg.node.contains_key(dep) {
                return Err(SchedError::ConfigError(format!(
                    "node '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_termination(cfg: &RawScheduleFile) -> Result<()> {
    for key in cfg.termination.keys() {
        let scale = TimeScale::from_str(key)
            .map_err(|e| SchedError::ConfigError(format!("[termination] key '{key}': {e}")))?;
        if !matches!(scale, TimeScale::Trial | TimeScale::Run) {
            return Err(SchedError::ConfigError(format!(
                "[termination] only TRIAL and RUN can be set (got '{key}')"
            )));
        }
    }
    Ok(())
}

fn validate_rules(cfg: &RawScheduleFile) -> Result<()> {
    for (name, rule) in cfg.rule.iter() {
        if cfg.node.contains_key(name) {
            return Err(SchedError::ConfigError(format!(
                "rule '{}' has the same name as a graph node",
                name
            )));
        }
        match rule.condition.condition_type() {
            Ok(ConditionType::Additive) => {}
            Ok(ConditionType::Subtractive) => {
                return Err(SchedError::ConfigError(format!(
                    "rule '{}' needs an additive condition (got {})",
                    name,
                    rule.condition.name()
                )));
            }
            Err(e) => {
                return Err(SchedError::ConfigError(format!("rule '{}': {}", name, e)));
            }
        }
    }
    Ok(())
}
