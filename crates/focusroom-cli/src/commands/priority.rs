use clap::Subcommand;
use focusroom_core::Collaborators;

use super::{open_controller, print_json, CliResult};

#[derive(Subcommand)]
pub enum PriorityAction {
    /// Suggest a pending task that outranks the given one
    Suggest {
        /// Task ID
        id: String,
    },
}

pub async fn run(action: PriorityAction) -> CliResult {
    let controller = open_controller(Collaborators::default())?;
    match action {
        PriorityAction::Suggest { id } => match controller.suggest_preemption(&id)? {
            Some(task) => print_json(task)?,
            None => println!("null"),
        },
    }
    Ok(())
}
