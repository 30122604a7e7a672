use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalType {
    Focus,
    Break,
}

/// One scheduled work or rest period of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: String,
    pub interval_type: IntervalType,
    /// Duration in minutes.
    pub duration_min: u32,
    #[serde(default)]
    pub completed: bool,
    /// Set only while the interval is actively counting down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn new(interval_type: IntervalType, duration_min: u32) -> Self {
        Self {
            id: format!("interval-{}", uuid::Uuid::new_v4()),
            interval_type,
            duration_min,
            completed: false,
            started_at: None,
        }
    }

    pub fn focus(duration_min: u32) -> Self {
        Self::new(IntervalType::Focus, duration_min)
    }

    pub fn rest(duration_min: u32) -> Self {
        Self::new(IntervalType::Break, duration_min)
    }

    pub fn is_focus(&self) -> bool {
        self.interval_type == IntervalType::Focus
    }

    /// Get interval duration in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_min).saturating_mul(60)
    }
}

/// Focus and break lengths in minutes, resolved from a task's timer preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerLengths {
    pub focus_min: u32,
    pub break_min: u32,
}

impl TimerLengths {
    pub fn new(focus_min: u32, break_min: u32) -> Self {
        Self {
            focus_min,
            break_min,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.focus_min == 0 {
            return Err(ValidationError::non_positive("focus_min"));
        }
        if self.break_min == 0 {
            return Err(ValidationError::non_positive("break_min"));
        }
        Ok(())
    }
}

impl Default for TimerLengths {
    fn default() -> Self {
        Self::new(25, 5)
    }
}

/// Number of focus intervals needed to cover `estimated_min`.
///
/// Always rounds up: the last focus interval is full length even when the
/// estimate does not divide evenly, so scheduled focus time may exceed the
/// estimate by up to `focus_min - 1` minutes.
pub fn focus_count_for(estimated_min: u32, focus_min: u32) -> u32 {
    estimated_min.div_ceil(focus_min)
}

/// Build the interval list for a task.
///
/// Emits an optional leading break, then alternating focus/break intervals,
/// always ending on a focus interval. Callers validate inputs first; see
/// [`TimerLengths::validate`].
///
/// # Panics
///
/// Panics if `lengths.focus_min` is zero.
pub fn generate(estimated_min: u32, lengths: TimerLengths, start_with_break: bool) -> Vec<Interval> {
    debug_assert!(estimated_min > 0, "estimated duration must be validated before generating");
    debug_assert!(lengths.break_min > 0, "break length must be validated before generating");

    let focus_count = focus_count_for(estimated_min, lengths.focus_min);
    let mut intervals = Vec::with_capacity(focus_count as usize * 2 + 1);

    if start_with_break {
        intervals.push(Interval::rest(lengths.break_min));
    }
    for i in 0..focus_count {
        intervals.push(Interval::focus(lengths.focus_min));
        if i + 1 < focus_count {
            intervals.push(Interval::rest(lengths.break_min));
        }
    }
    intervals
}

pub fn focus_count(intervals: &[Interval]) -> usize {
    intervals.iter().filter(|i| i.is_focus()).count()
}

pub fn completed_focus_count(intervals: &[Interval]) -> usize {
    intervals.iter().filter(|i| i.is_focus() && i.completed).count()
}

/// Index of the first incomplete interval, or `intervals.len()` if all are done.
pub fn first_incomplete(intervals: &[Interval]) -> usize {
    intervals
        .iter()
        .position(|i| !i.completed)
        .unwrap_or(intervals.len())
}
