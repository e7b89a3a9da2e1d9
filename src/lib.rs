// src/lib.rs

pub mod cli;
pub mod clock;
pub mod condition;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod types;

use anyhow::Result;
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_schedule_path, load_and_validate};
use crate::config::model::ScheduleFile;
use crate::dag::Scheduler;
use crate::engine::{ExecutionContextId, RunOptions};

pub use crate::clock::{Clock, Time};
pub use crate::condition::Condition;
pub use crate::dag::{DependencyGraph, Node, NodeId};
pub use crate::engine::Run;
pub use crate::errors::SchedError;
pub use crate::types::{ConditionType, TimeScale};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - schedule loading and validation
/// - scheduler construction
/// - the trial loop, printing one line per time step to stdout
pub fn run(args: CliArgs) -> Result<()> {
    let schedule_path = args.schedule.clone().unwrap_or_else(default_schedule_path);
    let mut cfg = load_and_validate(&schedule_path)?;
    if let Some(trials) = args.trials {
        cfg.config.trials = trials.max(1);
    }
    if let Some(context) = &args.context {
        cfg.config.context = context.clone();
    }

    let mut scheduler = Scheduler::from_schedule(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &scheduler)?;
        return Ok(());
    }

    if args.summary {
        let summary = scheduler.summary()?;
        print!("{}", toml::to_string_pretty(&summary)?);
        return Ok(());
    }

    let context = ExecutionContextId::from(cfg.config.context.clone());
    for trial in 0..cfg.config.trials {
        let mut run = scheduler.run(context.clone(), RunOptions::default())?;
        let mut step = 0usize;
        while let Some(nodes) = run.next_time_step() {
            println!("trial {trial} step {step}: {}", format_set(&nodes));
            step += 1;
        }
        if run.is_finished(TimeScale::Run) {
            info!(trial, "run termination condition met; stopping early");
            break;
        }
    }
    scheduler.end_run(&context)?;

    let clock = scheduler.get_clock(&context)?;
    debug!(time = ?clock.time(), runs = clock.runs(), "schedule complete");
    Ok(())
}

fn format_set(nodes: &IndexSet<String>) -> String {
    if nodes.is_empty() {
        return "(none)".to_string();
    }
    nodes.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Simple dry-run output: queues and conditions, nothing executed.
fn print_dry_run(cfg: &ScheduleFile, scheduler: &Scheduler<String>) -> Result<()> {
    println!("condsched dry-run");
    println!("  config.trials = {}", cfg.config.trials);
    println!("  config.context = {}", cfg.config.context);
    println!();

    let termination = scheduler.termination_conditions()?;
    println!("termination:");
    for (scale, condition) in termination.iter() {
        println!("  {scale}: {condition}");
    }
    println!();

    println!("base consideration queue:");
    for (idx, set) in scheduler.base_consideration_queue().iter().enumerate() {
        println!("  [{idx}] {}", format_set(set));
    }
    println!("runtime consideration queue:");
    for (idx, set) in scheduler.consideration_queue().iter().enumerate() {
        println!("  [{idx}] {}", format_set(set));
    }

    let removed = scheduler.removed_dependencies();
    if !removed.is_empty() {
        println!("pruned feedback edges:");
        for (child, parents) in removed.iter() {
            println!("  {child} <- {}", format_set(parents));
        }
    }
    println!();

    let summary = scheduler.summary()?;
    println!("nodes ({}):", summary.conditions.node.len());
    for (name, condition) in summary.conditions.node.iter() {
        println!("  - {name}: {condition}");
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
