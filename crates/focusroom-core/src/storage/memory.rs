//! In-memory [`TaskStore`].
//!
//! Clones share state, so a test can keep one handle to inspect what was
//! saved (or to make saves fail) while the controller owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Settings, TaskStore};
use crate::error::{DatabaseError, Result};
use crate::task::Task;

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<Task>,
    settings: Settings,
    fail_saves: bool,
    saves: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        store.lock().tasks = tasks;
        store
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        self.lock().settings = settings;
        self
    }

    /// Make every following save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Last successfully saved collection.
    pub fn saved_tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryStore {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.lock().tasks.clone())
    }

    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(DatabaseError::Unavailable("saves are switched off".into()).into());
        }
        inner.tasks = tasks.to_vec();
        inner.saves += 1;
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.lock().settings)
    }
}
