//! Check command implementation.
//!
//! `preconditions check NAME...` answers the question a test host asks
//! before running gated work. Exit codes:
//!
//! - `0` every precondition holds
//! - `1` at least one does not (or could not be evaluated under `--on-error skip`)
//! - `2` unknown name, or evaluation error under `--on-error fail`

use serde::Serialize;

use crate::cli::args::CheckArgs;
use crate::error::Result;
use crate::query::{Preconditions, RunDecision, SkipReason};
use crate::ui::UserInterface;

use super::dispatcher::{render_json, Command, CommandResult};

/// Exit code when gated work should be skipped.
pub const EXIT_SKIP: i32 = 1;

/// The check command implementation.
pub struct CheckCommand<'a> {
    preconditions: &'a Preconditions,
    args: CheckArgs,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    run: bool,
    preconditions: &'a [String],
    reasons: &'a [SkipReason],
}

impl<'a> CheckCommand<'a> {
    pub fn new(preconditions: &'a Preconditions, args: CheckArgs) -> Self {
        Self {
            preconditions,
            args,
        }
    }
}

impl Command for CheckCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let decision = self
            .preconditions
            .decide(&self.args.names, self.args.on_error.into())?;

        if self.args.json {
            let output = CheckOutput {
                run: decision.should_run(),
                preconditions: &self.args.names,
                reasons: decision.reasons(),
            };
            ui.data(&render_json(&output)?);
        } else {
            for name in &self.args.names {
                match decision.reasons().iter().find(|r| &r.precondition == name) {
                    Some(reason) => ui.warning(&reason.to_string()),
                    None => ui.success(name),
                }
            }
        }

        match decision {
            RunDecision::Run => Ok(CommandResult::success()),
            RunDecision::Skip { .. } => Ok(CommandResult::failure(EXIT_SKIP)),
        }
    }
}
