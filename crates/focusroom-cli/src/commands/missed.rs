use chrono::NaiveDateTime;
use clap::Subcommand;
use focusroom_core::{Collaborators, EventLog};

use super::{open_controller, CliResult};

#[derive(Subcommand)]
pub enum MissedAction {
    /// Mark untouched tasks whose scheduled start has passed as missed
    Check {
        /// Check as of this local time (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },
}

pub async fn run(action: MissedAction) -> CliResult {
    match action {
        MissedAction::Check { at } => {
            let log = EventLog::new();
            let mut controller = open_controller(Collaborators::shared(log.clone()))?;
            let now = at.unwrap_or_else(|| chrono::Local::now().naive_local());
            let missed = controller.check_missed(now)?;
            for event in log.drain().into_iter().filter(|e| e.is_notification()) {
                println!("{}", serde_json::to_string(&event)?);
            }
            eprintln!("{} task(s) missed", missed.len());
        }
    }
    Ok(())
}
