//! Editing a task, including timing edits that regenerate its intervals.
//!
//! Regeneration keeps the absolute number of completed focus intervals
//! (capped at the new total) rather than the old interval list: the first
//! `k` focus intervals of the new list, and everything before them, are
//! marked complete. Breaks already taken right after the `k`-th focus carry
//! over too, and the cursor is re-derived as the first incomplete interval.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use super::{validate_recurrence, Priority, Task, TaskStatus, TimerPreference};
use crate::error::ValidationError;
use crate::timer::interval::{self, Interval, TimerLengths};

/// Partial update of a task. `None` leaves a field unchanged; the nested
/// options on schedule fields allow clearing them.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub estimated_minutes: Option<u32>,
    pub timer: Option<TimerPreference>,
    pub start_with_break: Option<bool>,
    pub start_date: Option<Option<NaiveDate>>,
    pub start_time: Option<Option<NaiveTime>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub due_time: Option<Option<NaiveTime>>,
    pub reminder_minutes: Option<Option<u32>>,
    pub recurrence: Option<BTreeSet<u8>>,
    pub focus_mode: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl TaskEdit {
    pub fn touches_timing(&self) -> bool {
        self.estimated_minutes.is_some() || self.timer.is_some() || self.start_with_break.is_some()
    }

    /// The subset a recurring template pushes down to its future instances.
    pub fn template_fields(template: &Task) -> Self {
        Self {
            name: Some(template.name.clone()),
            priority: Some(template.priority),
            estimated_minutes: Some(template.estimated_minutes),
            timer: Some(template.timer),
            reminder_minutes: Some(template.reminder_minutes),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetimeOutcome {
    /// The interval list was regenerated.
    pub regenerated: bool,
    /// The current interval index differs from before the edit.
    pub cursor_moved: bool,
}

impl Task {
    /// Apply an edit, validating it first. Nothing changes on error.
    pub fn apply_edit(
        &mut self,
        edit: TaskEdit,
        defaults: TimerLengths,
        now: DateTime<Utc>,
    ) -> Result<RetimeOutcome, ValidationError> {
        let estimated = edit.estimated_minutes.unwrap_or(self.estimated_minutes);
        let timer = edit.timer.unwrap_or(self.timer);
        let start_with_break = edit.start_with_break.unwrap_or(self.start_with_break);
        if estimated == 0 {
            return Err(ValidationError::non_positive("estimated_minutes"));
        }
        let lengths = timer.resolve(defaults);
        lengths.validate()?;
        if let Some(name) = &edit.name {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "name".into(),
                    message: "must not be empty".into(),
                });
            }
        }
        if let Some(days) = &edit.recurrence {
            validate_recurrence(days)?;
        }

        let timing_changed = estimated != self.estimated_minutes
            || lengths != self.lengths
            || start_with_break != self.start_with_break;

        if let Some(name) = edit.name {
            self.name = name.trim().to_string();
        }
        if let Some(priority) = edit.priority {
            self.priority = priority;
        }
        if let Some(v) = edit.start_date {
            self.start_date = v;
        }
        if let Some(v) = edit.start_time {
            self.start_time = v;
        }
        if let Some(v) = edit.due_date {
            self.due_date = v;
        }
        if let Some(v) = edit.due_time {
            self.due_time = v;
        }
        if let Some(v) = edit.reminder_minutes {
            self.reminder_minutes = v;
        }
        if let Some(v) = edit.recurrence {
            self.recurrence = v;
        }
        if let Some(v) = edit.focus_mode {
            self.focus_mode = v;
        }
        if let Some(v) = edit.tags {
            self.tags = v;
        }
        self.timer = timer;

        let outcome = if timing_changed {
            self.retime(estimated, lengths, start_with_break, now)
        } else {
            RetimeOutcome::default()
        };
        self.touch(now);
        Ok(outcome)
    }

    /// Regenerate intervals for new timing, carrying completed focus count over.
    pub fn retime(
        &mut self,
        estimated_minutes: u32,
        lengths: TimerLengths,
        start_with_break: bool,
        now: DateTime<Utc>,
    ) -> RetimeOutcome {
        let previous_cursor = self.progress.current_session;
        self.flush_running(now);

        let mut intervals = interval::generate(estimated_minutes, lengths, start_with_break);
        let total = interval::focus_count(&intervals) as u32;
        let kept = self.progress.completed_sessions.min(total);

        let taken_breaks = completed_breaks_after(&self.intervals, kept);

        let mut next = 0;
        let mut to_mark = kept;
        while to_mark > 0 && next < intervals.len() {
            intervals[next].completed = true;
            if intervals[next].is_focus() {
                to_mark -= 1;
            }
            next += 1;
        }
        for iv in intervals[next..]
            .iter_mut()
            .take_while(|i| !i.is_focus())
            .take(taken_breaks)
        {
            iv.completed = true;
        }

        self.estimated_minutes = estimated_minutes;
        self.lengths = lengths;
        self.start_with_break = start_with_break;
        self.intervals = intervals;
        self.progress.total_sessions = total;
        self.progress.completed_sessions = kept;
        self.progress.current_session = interval::first_incomplete(&self.intervals);
        self.early_end = None;

        if kept == total {
            if self.status != TaskStatus::Completed {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(now);
            }
        } else if self.status == TaskStatus::Completed {
            self.status = if kept > 0 {
                TaskStatus::Partial
            } else {
                TaskStatus::Pending
            };
            self.completed_at = None;
        }

        tracing::info!(
            task = %self.id,
            total,
            kept,
            cursor = self.progress.current_session,
            "intervals regenerated"
        );
        RetimeOutcome {
            regenerated: true,
            cursor_moved: self.progress.current_session != previous_cursor,
        }
    }
}

/// Completed breaks directly following the `focus_done`-th focus interval
/// (or leading the list when `focus_done` is 0).
fn completed_breaks_after(intervals: &[Interval], focus_done: u32) -> usize {
    let start = if focus_done == 0 {
        0
    } else {
        intervals
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_focus())
            .nth(focus_done as usize - 1)
            .map_or(intervals.len(), |(idx, _)| idx + 1)
    };
    intervals[start..]
        .iter()
        .take_while(|i| !i.is_focus() && i.completed)
        .count()
}
