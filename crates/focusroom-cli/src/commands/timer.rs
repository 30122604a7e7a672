//! Timer commands for CLI.
//!
//! `timer run` is the only long-lived command: it starts (or resumes) a task
//! and stays in the foreground, printing controller events as JSON lines
//! until the task completes or the user presses Ctrl-C, which pauses it.

use clap::Subcommand;
use focusroom_core::{Collaborators, CoreError, Event, EventLog, Pumped, SyncController};

use super::{open_controller, print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume a task and follow it in the foreground
    Run {
        /// Task ID
        id: String,
        /// Print every display update instead of one per minute
        #[arg(long)]
        verbose: bool,
    },
    /// Show where a task would resume
    Status {
        /// Task ID
        id: String,
    },
}

pub async fn run(action: TimerAction) -> CliResult {
    match action {
        TimerAction::Run { id, verbose } => run_foreground(&id, verbose).await,
        TimerAction::Status { id } => status(&id),
    }
}

async fn run_foreground(id: &str, verbose: bool) -> CliResult {
    let log = EventLog::new();
    let mut controller = open_controller(Collaborators::shared(log.clone()))?;

    report(controller.start_task(id).await, "start", false)?;
    flush(&log, verbose)?;

    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            message = controller.next_message() => Some(message),
        };
        let Some(message) = next else {
            eprintln!("Interrupted, pausing {id}");
            report(controller.pause_active().await, "pause", false)?;
            flush(&log, verbose)?;
            break;
        };
        let Some(message) = message? else {
            break;
        };
        let pumped = report(controller.handle_message(message).await, "handle", Pumped::Discarded)?;
        flush(&log, verbose)?;
        if finished(&controller, id, pumped) {
            break;
        }
    }

    if let Some(task) = controller.task(id) {
        eprintln!(
            "{}: {} ({}/{} focus sessions)",
            task.name, task.status, task.progress.completed_sessions, task.progress.total_sessions
        );
    }
    Ok(())
}

/// Save failures are reported and the timer keeps going; the in-memory
/// state is still correct and the next save may succeed.
fn report<T>(result: focusroom_core::Result<T>, op: &str, fallback: T) -> CliResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(CoreError::Database(e)) => {
            eprintln!("warning: {op}: could not save tasks: {e}");
            Ok(fallback)
        }
        Err(e) => Err(e.into()),
    }
}

fn finished(controller: &SyncController, id: &str, pumped: Pumped) -> bool {
    let completed = matches!(&pumped, Pumped::IntervalCompleted(c) if c.task_completed);
    completed || controller.active().map_or(true, |a| a.task_id != id)
}

fn flush(log: &EventLog, verbose: bool) -> CliResult {
    for event in log.drain() {
        let show = match &event {
            Event::TaskListRefreshed { .. } | Event::CalendarRefreshed { .. } => false,
            Event::DisplayUpdated { remaining_secs, .. } => verbose || remaining_secs % 60 == 0,
            _ => true,
        };
        if show {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

fn status(id: &str) -> CliResult {
    let controller = open_controller(Collaborators::default())?;
    let task = controller
        .task(id)
        .ok_or_else(|| format!("task not found: {id}"))?;
    // Paused snapshots live only as long as the process that took them, so a
    // fresh process resumes at the full interval length.
    let current = task.current_interval();
    print_json(&serde_json::json!({
        "id": task.id,
        "status": task.status.to_string(),
        "interval_index": task.progress.current_session,
        "interval_type": current.map(|i| i.interval_type),
        "resume_secs": current.map(|i| i.duration_secs()),
        "completed_sessions": task.progress.completed_sessions,
        "total_sessions": task.progress.total_sessions,
    }))
}
