//! Startup recovery for tasks left `Ongoing` by a previous process.
//!
//! Countdown state and paused snapshots do not survive a restart, so a task
//! that was running can only be trusted up to its last saved progress. Every
//! such task becomes `Partial`; its running stamp is dropped without banking
//! time, since how long it really ran is unknown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Task, TaskStatus};

/// Information about a recovered task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveredTask {
    pub id: String,
    pub name: String,
    /// Interval the task will resume at (full length).
    pub interval_index: usize,
    pub last_updated_at: DateTime<Utc>,
}

/// Demote every `Ongoing` task to `Partial`.
///
/// Pure over the slice; the caller persists the result.
pub fn recover_after_restart(tasks: &mut [Task], now: DateTime<Utc>) -> Vec<RecoveredTask> {
    let mut recovered = Vec::new();
    for task in tasks.iter_mut() {
        for interval in &mut task.intervals {
            interval.started_at = None;
        }
        if task.status != TaskStatus::Ongoing {
            continue;
        }
        recovered.push(RecoveredTask {
            id: task.id.clone(),
            name: task.name.clone(),
            interval_index: task.progress.current_session,
            last_updated_at: task.updated_at,
        });
        task.status = TaskStatus::Partial;
        task.touch(now);
    }
    if !recovered.is_empty() {
        tracing::warn!(count = recovered.len(), "demoted tasks left running by a previous session");
    }
    recovered
}
