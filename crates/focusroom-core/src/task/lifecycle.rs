//! Task lifecycle transitions.
//!
//! Invalid transitions are no-ops: each method reports whether anything
//! changed and leaves the task untouched otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EarlyEnd, Task, TaskStatus};
use crate::timer::interval::{self, IntervalType};

/// What happened when the current interval was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalCompletion {
    pub index: usize,
    pub interval_type: IntervalType,
    /// Focus number (1-based) when the completed interval was a focus interval.
    pub session_number: Option<u32>,
    /// The task reached `Completed` with this interval.
    pub task_completed: bool,
    /// Type of the interval that is now current, if any remain.
    pub next: Option<IntervalType>,
}

impl Task {
    /// Move to `Ongoing` and stamp the current interval as running.
    ///
    /// Allowed from every status except `Completed`, and only while an
    /// incomplete interval remains.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == TaskStatus::Completed {
            return false;
        }
        let index = self.progress.current_session;
        let Some(current) = self.intervals.get_mut(index) else {
            return false;
        };
        if current.started_at.is_none() {
            current.started_at = Some(now);
        }
        if self.status != TaskStatus::Ongoing {
            tracing::info!(task = %self.id, from = %self.status, "task started");
        }
        self.status = TaskStatus::Ongoing;
        self.touch(now);
        true
    }

    /// `Ongoing` -> `Partial`, banking the running time.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Ongoing {
            return false;
        }
        self.flush_running(now);
        self.status = TaskStatus::Partial;
        self.touch(now);
        tracing::info!(task = %self.id, interval = self.progress.current_session, "task paused");
        true
    }

    /// Mark the current interval complete and advance the cursor.
    ///
    /// Returns `None` when there is nothing to complete. Reaching the last
    /// focus interval moves the task to `Completed`; otherwise the status is
    /// left as is and the caller decides whether to start the next interval.
    pub fn complete_current_interval(&mut self, now: DateTime<Utc>) -> Option<IntervalCompletion> {
        if self.status == TaskStatus::Completed {
            return None;
        }
        let index = self.progress.current_session;
        if index >= self.intervals.len() {
            return None;
        }
        self.flush_running(now);

        let current = &mut self.intervals[index];
        current.completed = true;
        let interval_type = current.interval_type;
        let session_number = self.session_number(index);
        if interval_type == IntervalType::Focus {
            self.progress.completed_sessions =
                (self.progress.completed_sessions + 1).min(self.progress.total_sessions);
        }
        self.progress.current_session = interval::first_incomplete(&self.intervals);

        let task_completed = self.progress.completed_sessions == self.progress.total_sessions;
        if task_completed {
            self.status = TaskStatus::Completed;
            self.completed_at = Some(now);
            self.early_end = None;
            tracing::info!(task = %self.id, "task completed");
        }
        self.touch(now);

        Some(IntervalCompletion {
            index,
            interval_type,
            session_number,
            task_completed,
            next: self.current_interval_type(),
        })
    }

    /// `Pending` -> `Missed`.
    pub fn mark_missed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Missed;
        self.touch(now);
        tracing::info!(task = %self.id, "task missed");
        true
    }

    /// Force-complete every remaining interval and mark the task `Completed`,
    /// remembering where it stopped so the end can be undone.
    pub fn end_early(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == TaskStatus::Completed {
            return false;
        }
        self.flush_running(now);
        let resume_index = self.progress.current_session;
        for interval in &mut self.intervals[resume_index..] {
            interval.completed = true;
        }
        self.progress.current_session = self.intervals.len();
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.early_end = Some(EarlyEnd {
            resume_index,
            at: now,
        });
        self.touch(now);
        tracing::info!(
            task = %self.id,
            completed = self.progress.completed_sessions,
            total = self.progress.total_sessions,
            "task ended early"
        );
        true
    }

    /// Undo a completion.
    ///
    /// An early end reopens as `Partial` with progress intact. A natural
    /// completion resets to `Pending` with every interval un-completed and
    /// progress back at zero.
    pub fn unmark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Completed {
            return false;
        }
        match self.early_end.take() {
            Some(early) => {
                let resume = early.resume_index.min(self.intervals.len());
                for interval in &mut self.intervals[resume..] {
                    interval.completed = false;
                    interval.started_at = None;
                }
                self.progress.current_session = interval::first_incomplete(&self.intervals);
                self.status = TaskStatus::Partial;
            }
            None => {
                for interval in &mut self.intervals {
                    interval.completed = false;
                    interval.started_at = None;
                }
                self.progress.completed_sessions = 0;
                self.progress.current_session = 0;
                self.progress.time_spent_secs = 0;
                self.status = TaskStatus::Pending;
            }
        }
        self.completed_at = None;
        self.touch(now);
        tracing::info!(task = %self.id, status = %self.status, "completion undone");
        true
    }

    /// Add the running interval's elapsed time to `time_spent_secs` and
    /// clear its running stamp.
    pub(crate) fn flush_running(&mut self, now: DateTime<Utc>) {
        let index = self.progress.current_session;
        if let Some(started) = self
            .intervals
            .get_mut(index)
            .and_then(|interval| interval.started_at.take())
        {
            let elapsed = now.signed_duration_since(started).num_seconds().max(0) as u64;
            self.progress.time_spent_secs = self.progress.time_spent_secs.saturating_add(elapsed);
        }
    }
}
