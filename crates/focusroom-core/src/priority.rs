//! Preemption suggestions.
//!
//! Given the task being worked on and the pending tasks, suggest the most
//! urgent pending task that outranks it. The answer is advisory only: the
//! caller decides whether to warn, switch, or ignore it.

use std::cmp::Ordering;

use crate::task::{Task, TaskStatus};

/// Most urgent pending task with a strictly better priority rank than `current`.
///
/// Candidates are ordered by rank (High first), then by scheduled start
/// (unscheduled last), then by creation time. `current` itself, recurring
/// templates and tasks that are not `Pending` are ignored.
pub fn higher_priority<'a, I>(current: &Task, pending: I) -> Option<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let threshold = current.priority.rank();
    pending
        .into_iter()
        .filter(|t| t.id != current.id)
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| !t.is_template())
        .filter(|t| t.priority.rank() < threshold)
        .min_by(|a, b| preemption_order(a, b))
}

fn preemption_order(a: &Task, b: &Task) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| match (a.scheduled_start(), b.scheduled_start()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
}
