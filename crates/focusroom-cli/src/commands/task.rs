//! Task management commands for CLI.

use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use focusroom_core::{Collaborators, Priority, TaskDraft, TaskEdit, TimerPreference};
use serde::Serialize;

use super::{open_controller, parse_time, parse_weekdays, print_json, split_tags, today, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task name
        name: String,
        /// Estimated minutes of focus work
        #[arg(long, short = 'e')]
        estimate: u32,
        /// high, medium or low
        #[arg(long, short = 'p', default_value = "medium")]
        priority: Priority,
        /// Focus length in minutes (default: from config)
        #[arg(long = "focus")]
        focus_minutes: Option<u32>,
        /// Break length in minutes (default: from config)
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Begin with a break instead of a focus interval
        #[arg(long)]
        start_with_break: bool,
        /// Scheduled start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Scheduled start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start_time: Option<NaiveTime>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due_date: Option<NaiveDate>,
        /// Due time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        due_time: Option<NaiveTime>,
        /// Reminder, minutes before the scheduled start
        #[arg(long)]
        reminder: Option<u32>,
        /// Repeat on weekdays, e.g. "mon,wed,fri" or "1,3,5" (0 = Sunday)
        #[arg(long, value_parser = parse_weekdays)]
        repeat: Option<std::collections::BTreeSet<u8>>,
        /// Enter focus mode while focus intervals run
        #[arg(long)]
        focus_mode: bool,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List tasks
    List {
        /// Filter by status (pending, ongoing, partial, completed, missed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one task
    Show {
        /// Task ID
        id: String,
    },
    /// Edit a task; timing changes regenerate its intervals
    Edit {
        /// Task ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short = 'e')]
        estimate: Option<u32>,
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        #[arg(long = "focus")]
        focus_minutes: Option<u32>,
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Go back to the configured focus/break lengths
        #[arg(long, conflicts_with_all = ["focus_minutes", "break_minutes"])]
        use_settings: bool,
        #[arg(long)]
        start_with_break: Option<bool>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_time)]
        start_time: Option<NaiveTime>,
        /// Remove the scheduled start date and time
        #[arg(long, conflicts_with_all = ["start_date", "start_time"])]
        unschedule: bool,
        #[arg(long)]
        due_date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_time)]
        due_time: Option<NaiveTime>,
        #[arg(long)]
        reminder: Option<u32>,
        #[arg(long, value_parser = parse_weekdays)]
        repeat: Option<std::collections::BTreeSet<u8>>,
        #[arg(long)]
        focus_mode: Option<bool>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a task (a recurring template also loses its future instances)
    Delete {
        /// Task ID
        id: String,
    },
    /// Complete every remaining interval now
    EndEarly {
        /// Task ID
        id: String,
    },
    /// Undo a completion
    Unmark {
        /// Task ID
        id: String,
    },
}

#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a focusroom_core::Task,
    completion_pct: f64,
}

fn view(task: &focusroom_core::Task) -> TaskView<'_> {
    TaskView {
        task,
        completion_pct: (task.completion_percentage() * 1000.0).round() / 10.0,
    }
}

pub async fn run(action: TaskAction) -> CliResult {
    let mut controller = open_controller(Collaborators::default())?;

    match action {
        TaskAction::Add {
            name,
            estimate,
            priority,
            focus_minutes,
            break_minutes,
            start_with_break,
            start_date,
            start_time,
            due_date,
            due_time,
            reminder,
            repeat,
            focus_mode,
            tags,
        } => {
            let defaults = controller.settings().lengths;
            let timer = match (focus_minutes, break_minutes) {
                (None, None) => TimerPreference::Settings,
                (focus, brk) => TimerPreference::Custom {
                    focus_min: focus.unwrap_or(defaults.focus_min),
                    break_min: brk.unwrap_or(defaults.break_min),
                },
            };
            let draft = TaskDraft {
                name,
                priority,
                estimated_minutes: estimate,
                start_date,
                start_time,
                due_date,
                due_time,
                reminder_minutes: reminder,
                timer,
                start_with_break,
                recurrence: repeat.unwrap_or_default(),
                focus_mode,
                tags: tags.as_deref().map(split_tags).unwrap_or_default(),
            };
            let id = controller.create_task(draft)?;
            eprintln!("Task created: {id}");
            if let Some(task) = controller.task(&id) {
                print_json(&view(task))?;
            }
        }
        TaskAction::List { status } => {
            let views: Vec<_> = controller
                .tasks()
                .iter()
                .filter(|t| status.as_deref().map_or(true, |s| t.status.to_string() == s))
                .map(view)
                .collect();
            print_json(&views)?;
        }
        TaskAction::Show { id } => match controller.task(&id) {
            Some(task) => print_json(&view(task))?,
            None => return Err(format!("task not found: {id}").into()),
        },
        TaskAction::Edit {
            id,
            name,
            estimate,
            priority,
            focus_minutes,
            break_minutes,
            use_settings,
            start_with_break,
            start_date,
            start_time,
            unschedule,
            due_date,
            due_time,
            reminder,
            repeat,
            focus_mode,
            tags,
        } => {
            let current = controller
                .task(&id)
                .ok_or_else(|| format!("task not found: {id}"))?
                .lengths;
            let timer = if use_settings {
                Some(TimerPreference::Settings)
            } else if focus_minutes.is_some() || break_minutes.is_some() {
                Some(TimerPreference::Custom {
                    focus_min: focus_minutes.unwrap_or(current.focus_min),
                    break_min: break_minutes.unwrap_or(current.break_min),
                })
            } else {
                None
            };
            let edit = TaskEdit {
                name,
                priority,
                estimated_minutes: estimate,
                timer,
                start_with_break,
                start_date: if unschedule { Some(None) } else { start_date.map(Some) },
                start_time: if unschedule { Some(None) } else { start_time.map(Some) },
                due_date: due_date.map(Some),
                due_time: due_time.map(Some),
                reminder_minutes: reminder.map(Some),
                recurrence: repeat,
                focus_mode,
                tags: tags.as_deref().map(split_tags),
            };
            controller.edit_task(&id, edit, today()).await?;
            if let Some(task) = controller.task(&id) {
                print_json(&view(task))?;
            }
        }
        TaskAction::Delete { id } => {
            let removed = controller.delete_task(&id, today()).await?;
            eprintln!("Task deleted: {}", removed.id);
        }
        TaskAction::EndEarly { id } => {
            if !controller.end_early(&id).await? {
                return Err(format!("task {id} is already completed").into());
            }
            if let Some(task) = controller.task(&id) {
                print_json(&view(task))?;
            }
        }
        TaskAction::Unmark { id } => {
            if !controller.unmark_completed(&id)? {
                return Err(format!("task {id} is not completed").into());
            }
            if let Some(task) = controller.task(&id) {
                print_json(&view(task))?;
            }
        }
    }
    Ok(())
}
