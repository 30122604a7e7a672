pub mod config;
pub mod missed;
pub mod priority;
pub mod recurring;
pub mod task;
pub mod timer;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use focusroom_core::{Collaborators, Database, SyncController, SystemClock};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Controller over the on-disk database. Must run inside the tokio runtime.
pub fn open_controller(out: Collaborators) -> CliResult<SyncController> {
    let db = Database::open()?;
    let controller = SyncController::new(db, out, Arc::new(SystemClock))?;
    tracing::debug!(tasks = controller.tasks().len(), "controller ready");
    for task in controller.recovered() {
        eprintln!(
            "note: task {} ({}) was left running and is now partial",
            task.id, task.name
        );
    }
    Ok(controller)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("invalid time '{s}': {e}"))
}

/// Comma-separated weekdays, as numbers (0 = Sunday) or names (`mon`, `tue`, ...).
pub fn parse_weekdays(s: &str) -> Result<BTreeSet<u8>, String> {
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            if let Ok(n) = lower.parse::<u8>() {
                return if n <= 6 {
                    Ok(n)
                } else {
                    Err(format!("weekday {n} is outside 0..=6"))
                };
            }
            NAMES
                .iter()
                .position(|name| lower.starts_with(name))
                .map(|i| i as u8)
                .ok_or_else(|| format!("unknown weekday '{part}'"))
        })
        .collect()
}

pub fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
