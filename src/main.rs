//! Preconditions CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use preconditions::cli::{Cli, CommandDispatcher};
use preconditions::config::find_project_root;
use preconditions::ui::{create_ui, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for errors (unknown precondition, bad config, evaluation
/// failure under `--on-error fail`).
const EXIT_ERROR: u8 = 2;

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("preconditions=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("preconditions=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("preconditions starting with args: {:?}", cli);

    let output_mode = OutputMode::from_flags(cli.verbose, cli.quiet);
    let mut ui = create_ui(output_mode, cli.no_color);

    let project_root = match &cli.project {
        Some(path) => path.clone(),
        None => match std::env::current_dir() {
            Ok(dir) => find_project_root(&dir).unwrap_or(dir),
            Err(e) => {
                ui.error(&format!("Error: cannot determine current directory: {}", e));
                return ExitCode::from(EXIT_ERROR);
            }
        },
    };

    let dispatcher = CommandDispatcher::new(project_root, cli.config.clone());

    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
