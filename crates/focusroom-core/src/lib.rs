//! # Focusroom Core Library
//!
//! Scheduling and timer logic for Focusroom, a task-based focus timer. The
//! `focusroom` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Intervals**: a task's estimate and focus/break lengths become an
//!   alternating list of focus and break intervals
//! - **Task lifecycle**: status and progress move through start, pause,
//!   interval completion, missed, early end and unmark
//! - **Countdown process**: a tokio task that owns only a duration and a
//!   clock, and talks over ordered channels
//! - **Controller**: drives the countdown from task state, owns paused
//!   snapshots and keeps a single task running at a time
//! - **Recurring / priority**: template expansion and preemption suggestions
//! - **Storage**: SQLite task documents and TOML configuration
//!
//! ## Key Components
//!
//! - [`SyncController`]: the timer synchronization controller
//! - [`Task`]: task model and lifecycle transitions
//! - [`Database`]: task persistence
//! - [`Config`]: application configuration management

pub mod controller;
pub mod error;
pub mod events;
pub mod notify;
pub mod priority;
pub mod recurring;
pub mod storage;
pub mod task;
pub mod timer;

pub use controller::{ActiveRun, PausedSnapshot, Pumped, SyncController};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{Event, EventLog};
pub use notify::{
    Collaborators, ControlsState, HeadlessDisplay, NoopNotifier, NoopViews, NotificationSink,
    TimerDisplay, ViewHooks,
};
pub use priority::higher_priority;
pub use recurring::RecurringExpander;
pub use storage::{Config, Database, MemoryStore, Settings, TaskStore};
pub use task::{Priority, Progress, Task, TaskDraft, TaskEdit, TaskStatus, TimerPreference};
pub use timer::{Interval, IntervalType, MonotonicClock, SystemClock, TimerLengths};
