// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskloop",
    version,
    about = "Resolve and run a dependency-ordered set of developer workflow tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task set file (JSON).
    #[arg(long, value_name = "PATH", default_value = "tasks.json")]
    pub tasks: String,

    /// Path to the optional workspace variables file (JSON).
    #[arg(long, value_name = "PATH", default_value = "variables.json")]
    pub variables: String,

    /// Workspace root directory, used to resolve `${wsdir}` and relative
    /// config paths.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: String,

    /// Name of the task to use as the plan root.
    #[arg(value_name = "TASK")]
    pub task: String,

    /// Parse, validate and reduce the plan, but don't execute any tasks.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKLOOP_LOG` or a default level is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
