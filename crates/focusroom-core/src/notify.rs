//! Outbound collaborator interfaces.
//!
//! The controller reports what happened through three capabilities, each
//! with a no-op implementation so nothing has to branch on whether a UI is
//! attached. Every call is fire-and-forget: the controller never reads a
//! result back.

use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::timer::interval::IntervalType;

/// User-facing notifications (sound, toast, desktop notification...).
pub trait NotificationSink: Send {
    fn on_focus_start(&self, _task: &Task, _session_number: u32) {}
    fn on_focus_end(&self, _task: &Task, _session_number: u32) {}
    fn on_break_start(&self, _task: &Task) {}
    fn on_break_end(&self, _task: &Task) {}
    fn on_task_completed(&self, _task: &Task) {}
    fn on_task_missed(&self, _task: &Task) {}
    /// `suggested` outranks the task that was just started.
    fn on_priority_conflict(&self, _suggested: &Task) {}
}

/// Views that render the task collection.
pub trait ViewHooks: Send {
    fn refresh_task_list(&self) {}
    fn refresh_calendar(&self) {}
}

/// State of the timer controls, as a display should render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlsState {
    pub running: bool,
    pub paused: bool,
    pub focus_mode: bool,
    pub interval: Option<IntervalType>,
}

/// The running-timer display.
pub trait TimerDisplay: Send {
    fn update_display(&self, _remaining_secs: u64, _progress_pct: f64) {}
    fn update_controls(&self, _controls: ControlsState) {}
    fn update_task_info(&self, _task: Option<&Task>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopViews;

impl ViewHooks for NoopViews {}

/// Display used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDisplay;

impl TimerDisplay for HeadlessDisplay {}

/// Everything the controller reports to.
pub struct Collaborators {
    pub notifier: Box<dyn NotificationSink>,
    pub views: Box<dyn ViewHooks>,
    pub display: Box<dyn TimerDisplay>,
}

impl Collaborators {
    /// Route all three capabilities to one shared sink.
    pub fn shared<S>(sink: S) -> Self
    where
        S: NotificationSink + ViewHooks + TimerDisplay + Clone + 'static,
    {
        Self {
            notifier: Box::new(sink.clone()),
            views: Box::new(sink.clone()),
            display: Box::new(sink),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            notifier: Box::new(NoopNotifier),
            views: Box::new(NoopViews),
            display: Box::new(HeadlessDisplay),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
