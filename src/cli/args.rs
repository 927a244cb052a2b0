//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::query::ErrorPolicy;

/// Evaluate environment preconditions before running work that needs them.
#[derive(Debug, Parser)]
#[command(name = "preconditions")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides .preconditions/config.yml discovery)
    #[arg(short, long, global = true, env = "PRECONDITIONS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show probe details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List known preconditions and what they depend on
    List(ListArgs),

    /// Decide whether work gated on the given preconditions may run
    Check(CheckArgs),

    /// Evaluate every precondition (default if no command specified)
    Report(ReportArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// What `check` does when a precondition cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnError {
    /// Count the error as an unmet precondition
    #[default]
    Skip,
    /// Abort with exit code 2
    Fail,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Skip => ErrorPolicy::Skip,
            OnError::Fail => ErrorPolicy::Fail,
        }
    }
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CheckArgs {
    /// Precondition names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// How to treat evaluation errors
    #[arg(long, value_enum, default_value_t = OnError::Skip)]
    pub on_error: OnError,
}

/// Arguments for the `report` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReportArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show preconditions that are not satisfied
    #[arg(long)]
    pub unsatisfied: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
