//! Task model: a unit of scheduled work split into focus/break intervals.
//!
//! A task carries its own interval list and a [`Progress`] record derived
//! from it. Status changes go through the lifecycle methods in
//! [`lifecycle`]; timing edits go through [`retime`], which reconciles
//! progress against a regenerated interval list.

pub mod lifecycle;
pub mod recovery;
pub mod retime;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::interval::{self, Interval, IntervalType, TimerLengths};

pub use lifecycle::IntervalCompletion;
pub use recovery::{recover_after_restart, RecoveredTask};
pub use retime::{RetimeOutcome, TaskEdit};

/// Task status.
///
/// ```text
/// PENDING ──start──> ONGOING ──pause──> PARTIAL
///    │                  ^                  │
///    │                  └──────start───────┘
///    │               (last focus done / end early)
///    │                        │
///    │                        v
///    │                    COMPLETED ──unmark──> PARTIAL | PENDING
///    │
///    └──missed──> MISSED ──start──> ONGOING
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ongoing,
    Partial,
    Completed,
    Missed,
}

impl TaskStatus {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => matches!(
                to,
                TaskStatus::Ongoing | TaskStatus::Missed | TaskStatus::Completed
            ),
            TaskStatus::Ongoing => matches!(
                to,
                TaskStatus::Ongoing | TaskStatus::Partial | TaskStatus::Completed
            ),
            TaskStatus::Partial => matches!(to, TaskStatus::Ongoing | TaskStatus::Completed),
            TaskStatus::Missed => matches!(to, TaskStatus::Ongoing | TaskStatus::Completed),
            TaskStatus::Completed => matches!(to, TaskStatus::Partial | TaskStatus::Pending),
        }
    }

    /// Get valid next states for this state.
    pub fn valid_transitions(&self) -> &[TaskStatus] {
        match self {
            TaskStatus::Pending => &[TaskStatus::Ongoing, TaskStatus::Missed, TaskStatus::Completed],
            TaskStatus::Ongoing => &[TaskStatus::Ongoing, TaskStatus::Partial, TaskStatus::Completed],
            TaskStatus::Partial => &[TaskStatus::Ongoing, TaskStatus::Completed],
            TaskStatus::Missed => &[TaskStatus::Ongoing, TaskStatus::Completed],
            TaskStatus::Completed => &[TaskStatus::Partial, TaskStatus::Pending],
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ongoing => "ongoing",
            TaskStatus::Partial => "partial",
            TaskStatus::Completed => "completed",
            TaskStatus::Missed => "missed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank; lower is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("expected high, medium or low, got '{other}'"),
            }),
        }
    }
}

/// Where a task's focus/break lengths come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerPreference {
    /// Use the configured defaults.
    #[default]
    Settings,
    Custom { focus_min: u32, break_min: u32 },
}

impl TimerPreference {
    pub fn resolve(&self, defaults: TimerLengths) -> TimerLengths {
        match *self {
            TimerPreference::Settings => defaults,
            TimerPreference::Custom {
                focus_min,
                break_min,
            } => TimerLengths::new(focus_min, break_min),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed_sessions: u32,
    pub total_sessions: u32,
    /// Index of the first incomplete interval, or `intervals.len()`.
    pub current_session: usize,
    /// Cumulative time spent on running intervals, in seconds.
    pub time_spent_secs: u64,
}

impl Progress {
    pub fn time_spent_minutes(&self) -> u64 {
        self.time_spent_secs / 60
    }
}

/// Marker left by `end_early`; `unmark_completed` reopens the task from here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EarlyEnd {
    /// First interval that was incomplete when the task was ended.
    pub resume_index: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_time: Option<NaiveTime>,
    /// Minutes before the scheduled start to remind.
    #[serde(default)]
    pub reminder_minutes: Option<u32>,
    #[serde(default)]
    pub timer: TimerPreference,
    /// Lengths the current interval list was generated with.
    pub lengths: TimerLengths,
    #[serde(default)]
    pub start_with_break: bool,
    /// Weekdays (0 = Sunday ... 6 = Saturday); empty for one-off tasks.
    #[serde(default)]
    pub recurrence: BTreeSet<u8>,
    /// Template this task was instantiated from.
    #[serde(default)]
    pub template_id: Option<String>,
    pub intervals: Vec<Interval>,
    pub progress: Progress,
    #[serde(default)]
    pub focus_mode: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub early_end: Option<EarlyEnd>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub name: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub reminder_minutes: Option<u32>,
    pub timer: TimerPreference,
    pub start_with_break: bool,
    pub recurrence: BTreeSet<u8>,
    pub focus_mode: bool,
    pub tags: Vec<String>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, estimated_minutes: u32) -> Self {
        Self {
            name: name.into(),
            estimated_minutes,
            ..Self::default()
        }
    }

    /// Reject inputs the interval generator must never see.
    pub fn validate(&self, defaults: TimerLengths) -> Result<TimerLengths, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.estimated_minutes == 0 {
            return Err(ValidationError::non_positive("estimated_minutes"));
        }
        validate_recurrence(&self.recurrence)?;
        let lengths = self.timer.resolve(defaults);
        lengths.validate()?;
        Ok(lengths)
    }
}

pub(crate) fn validate_recurrence(days: &BTreeSet<u8>) -> Result<(), ValidationError> {
    if let Some(bad) = days.iter().find(|d| **d > 6) {
        return Err(ValidationError::InvalidValue {
            field: "recurrence".into(),
            message: format!("weekday index {bad} is outside 0..=6"),
        });
    }
    Ok(())
}

impl Task {
    /// Create a task from a validated draft.
    pub fn from_draft(
        draft: TaskDraft,
        defaults: TimerLengths,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let lengths = draft.validate(defaults)?;
        let intervals = interval::generate(draft.estimated_minutes, lengths, draft.start_with_break);
        let progress = Progress {
            completed_sessions: 0,
            total_sessions: interval::focus_count(&intervals) as u32,
            current_session: 0,
            time_spent_secs: 0,
        };
        Ok(Task {
            id: new_task_id(now),
            name: draft.name.trim().to_string(),
            priority: draft.priority,
            status: TaskStatus::Pending,
            estimated_minutes: draft.estimated_minutes,
            start_date: draft.start_date,
            start_time: draft.start_time,
            due_date: draft.due_date,
            due_time: draft.due_time,
            reminder_minutes: draft.reminder_minutes,
            timer: draft.timer,
            lengths,
            start_with_break: draft.start_with_break,
            recurrence: draft.recurrence,
            template_id: None,
            intervals,
            progress,
            focus_mode: draft.focus_mode,
            tags: draft.tags,
            early_end: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// A recurring template: has weekdays and is not itself an instance.
    pub fn is_template(&self) -> bool {
        !self.recurrence.is_empty() && self.template_id.is_none()
    }

    pub fn is_instance(&self) -> bool {
        self.template_id.is_some()
    }

    pub fn ended_early(&self) -> bool {
        self.early_end.is_some()
    }

    /// Scheduled start as local wall-clock time. A date without a time
    /// counts as starting at midnight.
    pub fn scheduled_start(&self) -> Option<NaiveDateTime> {
        let date = self.start_date?;
        Some(date.and_time(self.start_time.unwrap_or(NaiveTime::MIN)))
    }

    pub fn current_interval(&self) -> Option<&Interval> {
        self.intervals.get(self.progress.current_session)
    }

    pub fn current_interval_type(&self) -> Option<IntervalType> {
        self.current_interval().map(|i| i.interval_type)
    }

    /// 1-based focus number of the interval at `index`, if it is a focus interval.
    pub fn session_number(&self, index: usize) -> Option<u32> {
        let interval = self.intervals.get(index)?;
        if !interval.is_focus() {
            return None;
        }
        Some(interval::focus_count(&self.intervals[..=index]) as u32)
    }

    /// Calculate completion percentage (0.0 to 1.0).
    pub fn completion_percentage(&self) -> f64 {
        if self.progress.total_sessions == 0 {
            0.0
        } else {
            (f64::from(self.progress.completed_sessions) / f64::from(self.progress.total_sessions))
                .min(1.0)
        }
    }

    /// Check the progress invariants against the interval list.
    pub fn progress_is_consistent(&self) -> bool {
        let p = &self.progress;
        let total_ok = p.total_sessions as usize == interval::focus_count(&self.intervals);
        let bound_ok = p.completed_sessions <= p.total_sessions;
        let cursor_ok = p.current_session == interval::first_incomplete(&self.intervals);
        // An early end force-completes intervals without crediting sessions.
        let count_ok = self.early_end.is_some()
            || p.completed_sessions as usize == interval::completed_focus_count(&self.intervals);
        total_ok && bound_ok && cursor_ok && count_ok
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

fn new_task_id(now: DateTime<Utc>) -> String {
    format!("task-{}-{}", now.timestamp(), uuid::Uuid::new_v4())
}
