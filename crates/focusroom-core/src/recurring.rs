//! Recurring task instantiation.
//!
//! A template is a task with a non-empty weekday set. For a rolling window
//! starting today, every date whose weekday is in the set gets exactly one
//! concrete instance, identified by `(template_id, start_date)`. Expansion is
//! idempotent: dates that already have an instance are skipped.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::task::{Progress, Task, TaskEdit, TaskStatus};
use crate::timer::interval::{self, TimerLengths};

pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;

/// Weekday index used by task recurrence sets (0 = Sunday ... 6 = Saturday).
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringExpander {
    lookahead_days: u32,
}

impl RecurringExpander {
    pub fn new(lookahead_days: u32) -> Self {
        Self { lookahead_days }
    }

    pub fn lookahead_days(&self) -> u32 {
        self.lookahead_days
    }

    /// Dates in `[today, today + lookahead)` the template recurs on.
    pub fn occurrences(&self, template: &Task, today: NaiveDate) -> Vec<NaiveDate> {
        if !template.is_template() {
            return Vec::new();
        }
        (0..i64::from(self.lookahead_days))
            .map(|offset| today + Duration::days(offset))
            .filter(|date| template.recurrence.contains(&weekday_index(*date)))
            .collect()
    }

    /// Instances of `template` missing from `existing` within the window.
    pub fn expand(
        &self,
        template: &Task,
        existing: &[Task],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<Task> {
        let materialized: HashSet<NaiveDate> = existing
            .iter()
            .filter(|t| t.template_id.as_deref() == Some(template.id.as_str()))
            .filter_map(|t| t.start_date)
            .collect();

        self.occurrences(template, today)
            .into_iter()
            .filter(|date| !materialized.contains(date))
            .map(|date| instantiate(template, date, now))
            .collect()
    }

    /// Expand every template in `tasks`, appending new instances.
    /// Returns the ids of the instances created.
    pub fn expand_all(&self, tasks: &mut Vec<Task>, today: NaiveDate, now: DateTime<Utc>) -> Vec<String> {
        let templates: Vec<Task> = tasks.iter().filter(|t| t.is_template()).cloned().collect();
        let mut created = Vec::new();
        for template in &templates {
            let fresh = self.expand(template, tasks, today, now);
            if !fresh.is_empty() {
                tracing::info!(template = %template.id, count = fresh.len(), "instantiated recurring task");
            }
            created.extend(fresh.iter().map(|t| t.id.clone()));
            tasks.extend(fresh);
        }
        created
    }
}

impl Default for RecurringExpander {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_DAYS)
    }
}

/// A fresh `Pending` instance of `template` dated `date`, with its own interval ids.
pub fn instantiate(template: &Task, date: NaiveDate, now: DateTime<Utc>) -> Task {
    let intervals = interval::generate(
        template.estimated_minutes,
        template.lengths,
        template.start_with_break,
    );
    let progress = Progress {
        completed_sessions: 0,
        total_sessions: interval::focus_count(&intervals) as u32,
        current_session: 0,
        time_spent_secs: 0,
    };
    let has_due = template.due_date.is_some() || template.due_time.is_some();
    Task {
        id: format!("task-{}-{}", now.timestamp(), uuid::Uuid::new_v4()),
        status: TaskStatus::Pending,
        start_date: Some(date),
        due_date: has_due.then_some(date),
        recurrence: Default::default(),
        template_id: Some(template.id.clone()),
        intervals,
        progress,
        early_end: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
        ..template.clone()
    }
}

/// Push the template's name, priority, reminder, timer preference and
/// estimate to its instances dated today or later. Returns how many changed.
pub fn propagate_template_edit(
    template: &Task,
    tasks: &mut [Task],
    defaults: TimerLengths,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, ValidationError> {
    let mut updated = 0;
    for task in tasks.iter_mut().filter(|t| is_future_instance_of(t, &template.id, today)) {
        task.apply_edit(TaskEdit::template_fields(template), defaults, now)?;
        updated += 1;
    }
    Ok(updated)
}

/// Remove the template's instances dated today or later, returning them.
pub fn remove_future_instances(template_id: &str, tasks: &mut Vec<Task>, today: NaiveDate) -> Vec<Task> {
    let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(tasks)
        .into_iter()
        .partition(|t| is_future_instance_of(t, template_id, today));
    *tasks = kept;
    removed
}

fn is_future_instance_of(task: &Task, template_id: &str, today: NaiveDate) -> bool {
    task.template_id.as_deref() == Some(template_id)
        && task.start_date.map(|d| d >= today).unwrap_or(false)
}
