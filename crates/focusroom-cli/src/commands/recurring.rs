use chrono::NaiveDate;
use clap::Subcommand;
use focusroom_core::Collaborators;

use super::{open_controller, print_json, today, CliResult};

#[derive(Subcommand)]
pub enum RecurringAction {
    /// Create the missing instances of every recurring template
    Expand {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// List recurring templates
    Templates,
}

pub async fn run(action: RecurringAction) -> CliResult {
    let mut controller = open_controller(Collaborators::default())?;
    match action {
        RecurringAction::Expand { today: date } => {
            let created = controller.expand_recurring(date.unwrap_or_else(today))?;
            eprintln!("{} instance(s) created", created.len());
            print_json(&created)?;
        }
        RecurringAction::Templates => {
            let templates: Vec<_> = controller.tasks().iter().filter(|t| t.is_template()).collect();
            print_json(&templates)?;
        }
    }
    Ok(())
}
