//! List command implementation.
//!
//! `preconditions list` shows every registered precondition in
//! registration order with the facts and preconditions it depends on.

use crate::cli::args::ListArgs;
use crate::error::Result;
use crate::query::{PreconditionDescription, Preconditions};
use crate::ui::{Table, UserInterface};

use super::dispatcher::{render_json, Command, CommandResult};

/// The list command implementation.
pub struct ListCommand<'a> {
    preconditions: &'a Preconditions,
    args: ListArgs,
}

impl<'a> ListCommand<'a> {
    pub fn new(preconditions: &'a Preconditions, args: ListArgs) -> Self {
        Self {
            preconditions,
            args,
        }
    }
}

fn dependencies(description: &PreconditionDescription) -> String {
    let facts = description.facts.iter().map(|f| format!("fact:{}", f));
    let requires = description.requires.iter().cloned();
    facts.chain(requires).collect::<Vec<_>>().join(", ")
}

impl Command for ListCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let described = self.preconditions.describe_all();

        if self.args.json {
            ui.data(&render_json(&described)?);
            return Ok(CommandResult::success());
        }

        let mut table = Table::new(["Name", "Description", "Depends on"]);
        for description in &described {
            table.add_row([
                description.name.clone(),
                description.description.clone().unwrap_or_default(),
                dependencies(description),
            ]);
        }

        ui.show_header("Preconditions");
        ui.message(&table.render());
        ui.message(&format!("{} preconditions", table.len()));
        Ok(CommandResult::success())
    }
}
