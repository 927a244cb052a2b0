//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::{Cli, Commands, ReportArgs};
use crate::config::{load_config, ConfigContributor};
use crate::contrib::builtin_contributors;
use crate::error::Result;
use crate::query::Preconditions;
use crate::registry::Contributor;
use crate::ui::UserInterface;

/// Trait for command implementations.
pub trait Command {
    /// Execute the command, reporting through `ui`.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Pretty-printed JSON for `--json` output.
pub(super) fn render_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| anyhow::Error::from(e).into())
}

/// Discover the built-in and configured preconditions for a project.
pub fn load_preconditions(project_root: &Path, config_path: Option<&Path>) -> Result<Preconditions> {
    let config = load_config(config_path, project_root)?;
    let builtins = builtin_contributors(&config.settings);
    let configured = ConfigContributor::new(config, project_root);

    let mut contributors: Vec<&dyn Contributor> = builtins.iter().map(|c| c.as_ref()).collect();
    contributors.push(&configured);

    Preconditions::discover(&contributors)
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config_path: Option<PathBuf>,
}

impl CommandDispatcher {
    pub fn new(project_root: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            project_root,
            config_path,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn load(&self) -> Result<Preconditions> {
        load_preconditions(&self.project_root, self.config_path.as_deref())
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to its implementation; with no subcommand
    /// a full report is printed.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Some(Commands::List(args)) => {
                super::list::ListCommand::new(&self.load()?, args.clone()).execute(ui)
            }
            Some(Commands::Check(args)) => {
                super::check::CheckCommand::new(&self.load()?, args.clone()).execute(ui)
            }
            Some(Commands::Report(args)) => {
                super::report::ReportCommand::new(&self.load()?, args.clone()).execute(ui)
            }
            Some(Commands::Completions(args)) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
            None => super::report::ReportCommand::new(&self.load()?, ReportArgs::default())
                .execute(ui),
        }
    }
}
