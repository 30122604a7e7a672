use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::{ControlsState, NotificationSink, TimerDisplay, ViewHooks};
use crate::task::{Priority, Task};

/// Every outward notification the controller makes, as a record.
/// The CLI prints them as JSON lines; tests assert on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    FocusStarted {
        task_id: String,
        task_name: String,
        session: u32,
        at: DateTime<Utc>,
    },
    FocusEnded {
        task_id: String,
        task_name: String,
        session: u32,
        at: DateTime<Utc>,
    },
    BreakStarted {
        task_id: String,
        task_name: String,
        at: DateTime<Utc>,
    },
    BreakEnded {
        task_id: String,
        task_name: String,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        task_name: String,
        at: DateTime<Utc>,
    },
    TaskMissed {
        task_id: String,
        task_name: String,
        at: DateTime<Utc>,
    },
    /// A pending task outranks the one just started.
    PriorityConflict {
        task_id: String,
        task_name: String,
        priority: Priority,
        at: DateTime<Utc>,
    },
    TaskListRefreshed {
        at: DateTime<Utc>,
    },
    CalendarRefreshed {
        at: DateTime<Utc>,
    },
    DisplayUpdated {
        remaining_secs: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
    ControlsUpdated {
        controls: ControlsState,
        at: DateTime<Utc>,
    },
    TaskInfoUpdated {
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The variant name, as it appears in the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FocusStarted { .. } => "FocusStarted",
            Event::FocusEnded { .. } => "FocusEnded",
            Event::BreakStarted { .. } => "BreakStarted",
            Event::BreakEnded { .. } => "BreakEnded",
            Event::TaskCompleted { .. } => "TaskCompleted",
            Event::TaskMissed { .. } => "TaskMissed",
            Event::PriorityConflict { .. } => "PriorityConflict",
            Event::TaskListRefreshed { .. } => "TaskListRefreshed",
            Event::CalendarRefreshed { .. } => "CalendarRefreshed",
            Event::DisplayUpdated { .. } => "DisplayUpdated",
            Event::ControlsUpdated { .. } => "ControlsUpdated",
            Event::TaskInfoUpdated { .. } => "TaskInfoUpdated",
        }
    }

    /// Notifications only; view refreshes and display updates excluded.
    pub fn is_notification(&self) -> bool {
        !matches!(
            self,
            Event::TaskListRefreshed { .. }
                | Event::CalendarRefreshed { .. }
                | Event::DisplayUpdated { .. }
                | Event::ControlsUpdated { .. }
                | Event::TaskInfoUpdated { .. }
        )
    }
}

/// Collects [`Event`]s from every collaborator capability.
///
/// Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    /// Kinds of the recorded notifications, in order.
    pub fn notification_kinds(&self) -> Vec<&'static str> {
        self.lock()
            .iter()
            .filter(|e| e.is_notification())
            .map(Event::kind)
            .collect()
    }

    pub fn push(&self, event: Event) {
        tracing::debug!(kind = event.kind(), "event");
        self.lock().push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ids(task: &Task) -> (String, String) {
    (task.id.clone(), task.name.clone())
}

impl NotificationSink for EventLog {
    fn on_focus_start(&self, task: &Task, session_number: u32) {
        let (task_id, task_name) = ids(task);
        self.push(Event::FocusStarted {
            task_id,
            task_name,
            session: session_number,
            at: Utc::now(),
        });
    }

    fn on_focus_end(&self, task: &Task, session_number: u32) {
        let (task_id, task_name) = ids(task);
        self.push(Event::FocusEnded {
            task_id,
            task_name,
            session: session_number,
            at: Utc::now(),
        });
    }

    fn on_break_start(&self, task: &Task) {
        let (task_id, task_name) = ids(task);
        self.push(Event::BreakStarted {
            task_id,
            task_name,
            at: Utc::now(),
        });
    }

    fn on_break_end(&self, task: &Task) {
        let (task_id, task_name) = ids(task);
        self.push(Event::BreakEnded {
            task_id,
            task_name,
            at: Utc::now(),
        });
    }

    fn on_task_completed(&self, task: &Task) {
        let (task_id, task_name) = ids(task);
        self.push(Event::TaskCompleted {
            task_id,
            task_name,
            at: Utc::now(),
        });
    }

    fn on_task_missed(&self, task: &Task) {
        let (task_id, task_name) = ids(task);
        self.push(Event::TaskMissed {
            task_id,
            task_name,
            at: Utc::now(),
        });
    }

    fn on_priority_conflict(&self, suggested: &Task) {
        let (task_id, task_name) = ids(suggested);
        self.push(Event::PriorityConflict {
            task_id,
            task_name,
            priority: suggested.priority,
            at: Utc::now(),
        });
    }
}

impl ViewHooks for EventLog {
    fn refresh_task_list(&self) {
        self.push(Event::TaskListRefreshed { at: Utc::now() });
    }

    fn refresh_calendar(&self) {
        self.push(Event::CalendarRefreshed { at: Utc::now() });
    }
}

impl TimerDisplay for EventLog {
    fn update_display(&self, remaining_secs: u64, progress_pct: f64) {
        self.push(Event::DisplayUpdated {
            remaining_secs,
            progress_pct,
            at: Utc::now(),
        });
    }

    fn update_controls(&self, controls: ControlsState) {
        self.push(Event::ControlsUpdated {
            controls,
            at: Utc::now(),
        });
    }

    fn update_task_info(&self, task: Option<&Task>) {
        self.push(Event::TaskInfoUpdated {
            task_id: task.map(|t| t.id.clone()),
            at: Utc::now(),
        });
    }
}
