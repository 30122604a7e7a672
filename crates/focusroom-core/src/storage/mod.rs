mod config;
pub mod database;
pub mod memory;

pub use config::{Config, NotificationsConfig, RecurringConfig, Settings, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::task::Task;

/// Durable home of the task collection.
///
/// The controller saves the whole collection after every mutation, so
/// implementations only need document-level load/replace.
pub trait TaskStore: Send {
    fn load_tasks(&self) -> Result<Vec<Task>>;
    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()>;
    fn load_settings(&self) -> Result<Settings>;
}

/// Returns `~/.config/focusroom[-dev]/` based on FOCUSROOM_ENV.
///
/// Set FOCUSROOM_ENV=dev to use development data directory, or
/// FOCUSROOM_DATA_DIR to use an explicit directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::result::Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSROOM_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusroom-dev")
            } else {
                base_dir.join("focusroom")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
