//! Report command implementation.
//!
//! `preconditions report` evaluates every registered precondition in one
//! fresh session and prints the outcome together with the facts observed.

use crate::cli::args::ReportArgs;
use crate::error::Result;
use crate::query::{PreconditionStatus, Preconditions, SessionReport};
use crate::ui::{Table, UserInterface};

use super::dispatcher::{render_json, Command, CommandResult};

/// The report command implementation.
pub struct ReportCommand<'a> {
    preconditions: &'a Preconditions,
    args: ReportArgs,
}

impl<'a> ReportCommand<'a> {
    pub fn new(preconditions: &'a Preconditions, args: ReportArgs) -> Self {
        Self {
            preconditions,
            args,
        }
    }

    fn show_facts(&self, report: &SessionReport, ui: &mut dyn UserInterface) {
        let mut table = Table::new(["Fact", "Value", "Probe"]);
        for fact in &report.facts {
            let value = match (&fact.value, &fact.error) {
                (Some(value), _) => value.to_string(),
                (None, Some(error)) => format!("error: {}", error),
                (None, None) => String::new(),
            };
            table.add_row([fact.key.clone(), value, fact.probe.clone()]);
        }
        ui.message(&table.render());
    }
}

impl Command for ReportCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut report = self.preconditions.report();
        let total = report.preconditions.len();
        let satisfied = report.satisfied();

        if self.args.unsatisfied {
            report.preconditions.retain(|p| !p.status.is_satisfied());
        }

        if self.args.json {
            ui.data(&render_json(&report)?);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("Preconditions ({})", report.session));
        for precondition in &report.preconditions {
            let line = match &precondition.description {
                Some(description) => format!("{} - {}", precondition.name, description),
                None => precondition.name.clone(),
            };
            match &precondition.status {
                PreconditionStatus::Satisfied => ui.success(&line),
                PreconditionStatus::Unsatisfied => ui.warning(&line),
                PreconditionStatus::Error(message) => {
                    ui.error(&format!("{}: {}", precondition.name, message))
                }
            }
        }

        if ui.output_mode().shows_details() {
            self.show_facts(&report, ui);
        }

        ui.message(&format!("{} of {} preconditions satisfied", satisfied, total));
        Ok(CommandResult::success())
    }
}
