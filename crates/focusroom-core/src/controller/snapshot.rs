use std::collections::HashMap;

/// Remaining time captured when a running task was paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedSnapshot {
    pub remaining_secs: u64,
    /// Interval the remaining time belongs to.
    pub interval_index: usize,
}

/// Paused snapshots keyed by task id. Never persisted.
#[derive(Debug, Default)]
pub struct PausedSnapshots {
    by_task: HashMap<String, PausedSnapshot>,
}

impl PausedSnapshots {
    pub fn record(&mut self, task_id: &str, snapshot: PausedSnapshot) {
        tracing::debug!(task = task_id, ?snapshot, "paused snapshot recorded");
        self.by_task.insert(task_id.to_string(), snapshot);
    }

    pub fn get(&self, task_id: &str) -> Option<&PausedSnapshot> {
        self.by_task.get(task_id)
    }

    /// Consume the task's snapshot if it belongs to `current_index`.
    ///
    /// A snapshot for any other interval is stale: it is dropped and `None`
    /// is returned, exactly as if there had been no snapshot.
    pub fn take_matching(&mut self, task_id: &str, current_index: usize) -> Option<PausedSnapshot> {
        let snapshot = self.by_task.remove(task_id)?;
        if snapshot.interval_index == current_index {
            return Some(snapshot);
        }
        tracing::warn!(
            task = task_id,
            snapshot_interval = snapshot.interval_index,
            current_interval = current_index,
            "discarding stale paused snapshot"
        );
        None
    }

    pub fn discard(&mut self, task_id: &str) -> Option<PausedSnapshot> {
        self.by_task.remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.by_task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }
}
