//! Timer synchronization controller.
//!
//! Owns the task collection, the paused snapshots and the countdown process
//! handle, and keeps them consistent:
//!
//! - at most one task is `Ongoing`, and only while its countdown runs;
//! - pausing asks the countdown for the authoritative remaining time
//!   *before* pausing it, and only then records the snapshot and moves the
//!   task to `Partial`;
//! - starting (or resuming) uses the task's snapshot only when it was taken
//!   on the task's current interval, otherwise the interval's full length;
//! - countdown messages are tagged with a [`RunId`]; anything not tagged
//!   with the active run is discarded.
//!
//! Every operation that talks to the countdown takes `&mut self` and awaits
//! the acknowledgement before returning, so commands never overlap. The
//! collection is saved after every mutation; a failed save is returned to
//! the caller but the in-memory state stays as mutated.

mod snapshot;

pub use snapshot::{PausedSnapshot, PausedSnapshots};

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{CoreError, Result};
use crate::notify::{Collaborators, ControlsState, NotificationSink};
use crate::priority::higher_priority;
use crate::recurring::{self, RecurringExpander};
use crate::storage::{Settings, TaskStore};
use crate::task::{
    recover_after_restart, IntervalCompletion, RecoveredTask, Task, TaskDraft, TaskEdit, TaskStatus,
};
use crate::timer::countdown::{
    spawn_countdown, CountdownClock, CountdownCommand, CountdownEvent, CountdownHandle,
    CountdownMessage, RunId,
};
use crate::timer::interval::IntervalType;

/// The countdown run currently driving a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRun {
    pub task_id: String,
    pub interval_index: usize,
    /// Id of the interval being timed; regeneration gives intervals new ids.
    pub interval_id: String,
    pub run: RunId,
}

/// What a single [`SyncController::handle_message`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Pumped {
    Tick { remaining_secs: u64, progress_pct: f64 },
    IntervalCompleted(IntervalCompletion),
    /// Late or foreign message, dropped.
    Discarded,
}

pub struct SyncController {
    tasks: Vec<Task>,
    store: Box<dyn TaskStore>,
    out: Collaborators,
    settings: Settings,
    snapshots: PausedSnapshots,
    countdown: CountdownHandle,
    active: Option<ActiveRun>,
    next_run: RunId,
    deferred: VecDeque<CountdownMessage>,
    recovered: Vec<RecoveredTask>,
}

impl SyncController {
    /// Load the collection, demote tasks left running by a previous process
    /// and spawn the countdown process on the current runtime.
    pub fn new<S>(store: S, out: Collaborators, clock: Arc<dyn CountdownClock>) -> Result<Self>
    where
        S: TaskStore + 'static,
    {
        let mut store: Box<dyn TaskStore> = Box::new(store);
        let settings = store.load_settings()?;
        let mut tasks = store.load_tasks()?;
        let recovered = recover_after_restart(&mut tasks, now());
        if !recovered.is_empty() {
            if let Err(e) = store.save_tasks(&tasks) {
                tracing::warn!(error = %e, "could not persist restart recovery");
            }
        }
        Ok(Self {
            tasks,
            store,
            out,
            settings,
            snapshots: PausedSnapshots::default(),
            countdown: spawn_countdown(clock),
            active: None,
            next_run: 1,
            deferred: VecDeque::new(),
            recovered,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    pub fn snapshot(&self, task_id: &str) -> Option<&PausedSnapshot> {
        self.snapshots.get(task_id)
    }

    /// Tasks demoted from `Ongoing` when this controller was created.
    pub fn recovered(&self) -> &[RecoveredTask] {
        &self.recovered
    }

    pub fn create_task(&mut self, draft: TaskDraft) -> Result<String> {
        let task = Task::from_draft(draft, self.settings.lengths, now())?;
        let id = task.id.clone();
        tracing::info!(task = %id, name = %task.name, "task created");
        self.tasks.push(task);
        self.commit()?;
        Ok(id)
    }

    /// Apply an edit. Template edits are pushed to future instances; an edit
    /// that regenerates the running interval restarts its countdown.
    pub async fn edit_task(&mut self, id: &str, edit: TaskEdit, today: NaiveDate) -> Result<()> {
        let idx = self.index_of(id)?;
        let at = now();
        self.tasks[idx].apply_edit(edit, self.settings.lengths, at)?;
        if self.tasks[idx].is_template() {
            let template = self.tasks[idx].clone();
            let updated = recurring::propagate_template_edit(
                &template,
                &mut self.tasks,
                self.settings.lengths,
                today,
                at,
            )?;
            tracing::debug!(template = %id, updated, "template edit propagated");
        }
        self.resync_active().await?;
        self.commit()
    }

    /// Remove a task. Deleting a template also removes its future instances.
    pub async fn delete_task(&mut self, id: &str, today: NaiveDate) -> Result<Task> {
        let idx = self.index_of(id)?;
        if self.is_active(id) {
            self.stop_countdown().await?;
        }
        self.snapshots.discard(id);
        let removed = self.tasks.remove(idx);
        if removed.is_template() {
            for instance in recurring::remove_future_instances(&removed.id, &mut self.tasks, today) {
                if self.is_active(&instance.id) {
                    self.stop_countdown().await?;
                }
                self.snapshots.discard(&instance.id);
            }
        }
        tracing::info!(task = %removed.id, "task deleted");
        self.commit()?;
        Ok(removed)
    }

    /// Start or resume a task, pausing whichever task is running first.
    ///
    /// Returns `false` (and changes nothing) when the task is already
    /// running, is `Completed`, or has no interval left.
    pub async fn start_task(&mut self, id: &str) -> Result<bool> {
        let idx = self.index_of(id)?;
        if self.is_active(id) {
            return Ok(false);
        }
        let task = &self.tasks[idx];
        if task.status == TaskStatus::Completed || task.current_interval().is_none() {
            return Ok(false);
        }

        if self.active.is_some() {
            self.pause_running().await?;
        }
        let at = now();
        for other in self.tasks.iter_mut().filter(|t| t.status == TaskStatus::Ongoing) {
            other.pause(at);
        }

        let index = self.tasks[idx].progress.current_session;
        let full = self.tasks[idx].intervals[index].duration_secs();
        let duration_secs = match self.snapshots.take_matching(id, index) {
            Some(snapshot) => snapshot.remaining_secs.min(full),
            None => full,
        };
        self.launch(idx, duration_secs, false).await?;

        if let Some(suggested) = higher_priority(&self.tasks[idx], &self.tasks) {
            tracing::info!(task = %id, suggested = %suggested.id, "higher priority task is pending");
            if let Some(notifier) = self.notifier() {
                notifier.on_priority_conflict(suggested);
            }
        }
        self.commit()?;
        Ok(true)
    }

    /// Pause the running task.
    ///
    /// Asks the countdown for the remaining time, records the snapshot, then
    /// pauses the countdown and the task, in that order. Returns `false`
    /// when nothing is running.
    pub async fn pause_active(&mut self) -> Result<bool> {
        if !self.pause_running().await? {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    /// Pause protocol without saving.
    async fn pause_running(&mut self) -> Result<bool> {
        let Some(active) = self.active.clone() else {
            return Ok(false);
        };

        self.countdown.send(CountdownCommand::QueryRemaining)?;
        let remaining_secs = match self
            .await_ack(active.run, |e| matches!(e, CountdownEvent::Remaining { .. }))
            .await?
        {
            CountdownEvent::Remaining { remaining_secs } => remaining_secs,
            _ => 0,
        };
        let completed_meanwhile = self
            .deferred
            .iter()
            .any(|m| m.run == active.run && matches!(m.event, CountdownEvent::Complete));
        if remaining_secs == 0 || completed_meanwhile {
            // The interval ran out before the pause landed: finish it instead
            // of keeping a zero-length snapshot, and stay stopped.
            self.stop_countdown().await?;
            self.deferred.retain(|m| m.run != active.run);
            self.finish_interval(&active.task_id, false).await?;
            tracing::info!(task = %active.task_id, "interval ran out while pausing");
            return Ok(true);
        }

        self.snapshots.record(
            &active.task_id,
            PausedSnapshot {
                remaining_secs,
                interval_index: active.interval_index,
            },
        );

        self.countdown.send(CountdownCommand::Pause)?;
        self.await_ack(active.run, |e| matches!(e, CountdownEvent::Paused { .. }))
            .await?;
        self.active = None;

        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == active.task_id) {
            task.pause(now());
        }
        self.out.display.update_controls(ControlsState {
            running: false,
            paused: true,
            ..ControlsState::default()
        });
        tracing::info!(task = %active.task_id, remaining_secs, "paused");
        Ok(true)
    }

    /// Next countdown message for the active run, or `None` when nothing is
    /// running. Cancel safe.
    pub async fn next_message(&mut self) -> Result<Option<CountdownMessage>> {
        if let Some(message) = self.deferred.pop_front() {
            return Ok(Some(message));
        }
        if self.active.is_none() {
            return Ok(None);
        }
        match self.countdown.recv().await {
            Some(message) => Ok(Some(message)),
            None => Err(CoreError::TimerUnavailable),
        }
    }

    /// React to one countdown message.
    pub async fn handle_message(&mut self, message: CountdownMessage) -> Result<Pumped> {
        let Some(active) = self.active.clone().filter(|a| a.run == message.run) else {
            if matches!(message.event, CountdownEvent::Tick { .. }) {
                tracing::debug!(run = message.run, "dropping tick for inactive run");
            } else {
                tracing::warn!(run = message.run, event = ?message.event, "discarding late countdown message");
            }
            return Ok(Pumped::Discarded);
        };
        match message.event {
            CountdownEvent::Tick {
                remaining_secs,
                progress_pct,
            } => {
                self.out.display.update_display(remaining_secs, progress_pct);
                Ok(Pumped::Tick {
                    remaining_secs,
                    progress_pct,
                })
            }
            CountdownEvent::Complete => {
                self.active = None;
                match self.finish_interval(&active.task_id, true).await? {
                    Some(completion) => {
                        self.commit()?;
                        Ok(Pumped::IntervalCompleted(completion))
                    }
                    None => Ok(Pumped::Discarded),
                }
            }
            _ => Ok(Pumped::Discarded),
        }
    }

    /// Wait for and handle one message. `None` when nothing is running.
    pub async fn pump(&mut self) -> Result<Option<Pumped>> {
        match self.next_message().await? {
            Some(message) => self.handle_message(message).await.map(Some),
            None => Ok(None),
        }
    }

    /// Complete the running interval now. A no-op when nothing is running.
    pub async fn complete_active_interval(&mut self) -> Result<Option<IntervalCompletion>> {
        let Some(active) = self.active.clone() else {
            return Ok(None);
        };
        self.stop_countdown().await?;
        let completion = self.finish_interval(&active.task_id, true).await?;
        if completion.is_some() {
            self.commit()?;
        }
        Ok(completion)
    }

    /// Force-complete a task, remembering where it stopped.
    pub async fn end_early(&mut self, id: &str) -> Result<bool> {
        let idx = self.index_of(id)?;
        if self.is_active(id) {
            self.stop_countdown().await?;
        }
        if !self.tasks[idx].end_early(now()) {
            return Ok(false);
        }
        self.snapshots.discard(id);
        if let Some(notifier) = self.notifier() {
            notifier.on_task_completed(&self.tasks[idx]);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn unmark_completed(&mut self, id: &str) -> Result<bool> {
        let idx = self.index_of(id)?;
        if !self.tasks[idx].unmark_completed(now()) {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    /// Mark every pending task whose scheduled start (local wall-clock
    /// time) is before `now` as missed. Returns their ids.
    pub fn check_missed(&mut self, now_local: NaiveDateTime) -> Result<Vec<String>> {
        let at = now();
        let mut missed = Vec::new();
        for task in self.tasks.iter_mut() {
            if task.is_template() || task.status != TaskStatus::Pending {
                continue;
            }
            let overdue = task.scheduled_start().map(|s| s < now_local).unwrap_or(false);
            if overdue && task.mark_missed(at) {
                missed.push(task.id.clone());
            }
        }
        if missed.is_empty() {
            return Ok(missed);
        }
        if let Some(notifier) = self.notifier() {
            for task in self.tasks.iter().filter(|t| missed.contains(&t.id)) {
                notifier.on_task_missed(task);
            }
        }
        self.commit()?;
        Ok(missed)
    }

    /// Create recurring instances for the lookahead window starting `today`.
    pub fn expand_recurring(&mut self, today: NaiveDate) -> Result<Vec<String>> {
        let expander = RecurringExpander::new(self.settings.lookahead_days);
        let created = expander.expand_all(&mut self.tasks, today, now());
        if !created.is_empty() {
            self.commit()?;
        }
        Ok(created)
    }

    /// The pending task that outranks `id`, if any. Advisory only.
    pub fn suggest_preemption(&self, id: &str) -> Result<Option<&Task>> {
        let task = self
            .task(id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))?;
        Ok(higher_priority(task, &self.tasks))
    }

    /// Pause whatever is running and stop the countdown process.
    pub async fn shutdown(mut self) -> Result<()> {
        self.pause_active().await?;
        tracing::debug!("controller shut down");
        Ok(())
    }

    // --- internals -------------------------------------------------------

    /// Start the countdown for the task's current interval and mark it running.
    async fn launch(&mut self, idx: usize, duration_secs: u64, advanced: bool) -> Result<()> {
        let run = self.next_run;
        self.next_run += 1;
        self.countdown
            .send(CountdownCommand::Start { duration_secs, run })?;
        if let CountdownEvent::Tick {
            remaining_secs,
            progress_pct,
        } = self
            .await_ack(run, |e| matches!(e, CountdownEvent::Tick { .. }))
            .await?
        {
            self.out.display.update_display(remaining_secs, progress_pct);
        }

        let task = &mut self.tasks[idx];
        task.start(now());
        let index = task.progress.current_session;
        let interval = &task.intervals[index];
        self.active = Some(ActiveRun {
            task_id: task.id.clone(),
            interval_index: index,
            interval_id: interval.id.clone(),
            run,
        });

        let is_focus = interval.is_focus();
        let focus_mode = is_focus
            && task.focus_mode
            && (!advanced || self.settings.focus_mode_on_advance);
        let task = &self.tasks[idx];
        self.out.display.update_task_info(Some(task));
        self.out.display.update_controls(ControlsState {
            running: true,
            paused: false,
            focus_mode,
            interval: Some(task.intervals[index].interval_type),
        });
        if let Some(notifier) = self.notifier() {
            match task.session_number(index) {
                Some(session) => notifier.on_focus_start(task, session),
                None => notifier.on_break_start(task),
            }
        }
        tracing::info!(task = %task.id, interval = index, duration_secs, run, "interval running");
        Ok(())
    }

    /// Complete the task's current interval after its countdown ended, then
    /// auto-advance (when `may_advance` and the policy allow it) or leave the
    /// timer stopped with the task paused. Does not save.
    async fn finish_interval(
        &mut self,
        task_id: &str,
        may_advance: bool,
    ) -> Result<Option<IntervalCompletion>> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == task_id) else {
            return Ok(None);
        };
        let at = now();
        let Some(completion) = self.tasks[idx].complete_current_interval(at) else {
            return Ok(None);
        };
        self.snapshots.discard(task_id);

        if let Some(notifier) = self.notifier() {
            let task = &self.tasks[idx];
            match (completion.interval_type, completion.session_number) {
                (IntervalType::Focus, Some(session)) => notifier.on_focus_end(task, session),
                _ => notifier.on_break_end(task),
            }
            if completion.task_completed {
                notifier.on_task_completed(task);
            }
        }

        let advance = may_advance
            && self.settings.auto_advance
            && !completion.task_completed
            && self.tasks[idx].status == TaskStatus::Ongoing;
        if advance {
            let full = self.tasks[idx]
                .current_interval()
                .map(|i| i.duration_secs())
                .unwrap_or_default();
            self.launch(idx, full, true).await?;
        } else {
            if !completion.task_completed {
                self.tasks[idx].pause(at);
            }
            self.out.display.update_controls(ControlsState::default());
        }
        Ok(Some(completion))
    }

    /// Restart the countdown if the running interval was regenerated.
    async fn resync_active(&mut self) -> Result<()> {
        let Some(active) = self.active.clone() else {
            return Ok(());
        };
        let Some(idx) = self.tasks.iter().position(|t| t.id == active.task_id) else {
            return Ok(());
        };
        let unchanged = self.tasks[idx]
            .current_interval()
            .is_some_and(|i| i.id == active.interval_id);
        if unchanged {
            return Ok(());
        }

        self.stop_countdown().await?;
        if self.tasks[idx].status == TaskStatus::Completed {
            if let Some(notifier) = self.notifier() {
                notifier.on_task_completed(&self.tasks[idx]);
            }
            return Ok(());
        }
        let full = self.tasks[idx]
            .current_interval()
            .map(|i| i.duration_secs())
            .unwrap_or_default();
        tracing::info!(task = %active.task_id, "running interval regenerated; restarting countdown");
        self.launch(idx, full, false).await
    }

    async fn stop_countdown(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        self.countdown.send(CountdownCommand::Stop)?;
        self.await_ack(active.run, |e| matches!(e, CountdownEvent::Stopped))
            .await?;
        self.out.display.update_controls(ControlsState::default());
        Ok(())
    }

    /// Wait for the acknowledgement of the last command sent for `run`.
    /// Anything else that arrives meanwhile is queued for [`Self::next_message`].
    async fn await_ack(
        &mut self,
        run: RunId,
        is_ack: impl Fn(&CountdownEvent) -> bool,
    ) -> Result<CountdownEvent> {
        loop {
            let message = self
                .countdown
                .recv()
                .await
                .ok_or(CoreError::TimerUnavailable)?;
            if message.run == run && is_ack(&message.event) {
                tracing::debug!(run, event = ?message.event, "countdown ack");
                return Ok(message.event);
            }
            self.deferred.push_back(message);
        }
    }

    fn notifier(&self) -> Option<&dyn NotificationSink> {
        self.settings
            .notifications_enabled
            .then_some(self.out.notifier.as_ref())
    }

    fn is_active(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.task_id == id)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }

    /// Refresh views and save the collection.
    fn commit(&mut self) -> Result<()> {
        self.out.views.refresh_task_list();
        self.out.views.refresh_calendar();
        self.store.save_tasks(&self.tasks).inspect_err(|e| {
            tracing::warn!(error = %e, "failed to save tasks; keeping in-memory state");
        })
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
