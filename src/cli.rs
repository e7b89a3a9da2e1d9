// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `condsched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "condsched",
    version,
    about = "Run a condition-driven schedule over a dependency graph and print its time steps.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the schedule file (TOML).
    ///
    /// Default: `Schedule.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub schedule: Option<PathBuf>,

    /// Override `[config].trials`.
    #[arg(long, value_name = "N")]
    pub trials: Option<u64>,

    /// Override `[config].context`.
    #[arg(long, value_name = "ID")]
    pub context: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CONDSCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the consideration queues and conditions, but
    /// don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the effective conditions as TOML and exit.
    #[arg(long)]
    pub summary: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
