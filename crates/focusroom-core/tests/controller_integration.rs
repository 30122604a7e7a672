//! Integration tests for the timer synchronization controller.
//!
//! Every test runs on tokio's paused clock: the countdown process reads
//! `MonotonicClock`, so `tokio::time::advance` and idle auto-advance move
//! the countdown deterministically.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use focusroom_core::timer::countdown::{CountdownEvent, CountdownMessage};
use focusroom_core::{
    Collaborators, CoreError, DatabaseError, Event, EventLog, MemoryStore, MonotonicClock,
    PausedSnapshot, Priority, Pumped, Settings, SyncController, Task, TaskDraft, TaskEdit,
    TaskStatus, TimerLengths, TimerPreference,
};

fn controller(store: &MemoryStore, log: &EventLog) -> SyncController {
    SyncController::new(
        store.clone(),
        Collaborators::shared(log.clone()),
        Arc::new(MonotonicClock::new()),
    )
    .unwrap()
}

fn draft(name: &str, estimated: u32, focus_min: u32, break_min: u32) -> TaskDraft {
    let mut d = TaskDraft::new(name, estimated);
    d.timer = TimerPreference::Custom {
        focus_min,
        break_min,
    };
    d
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// Remaining seconds shown by the first display update in `events`.
fn first_display(events: &[Event]) -> Option<u64> {
    events.iter().find_map(|e| match e {
        Event::DisplayUpdated { remaining_secs, .. } => Some(*remaining_secs),
        _ => None,
    })
}

fn ongoing_count(ctrl: &SyncController) -> usize {
    ctrl.tasks()
        .iter()
        .filter(|t| t.status == TaskStatus::Ongoing)
        .count()
}

#[tokio::test(start_paused = true)]
async fn resume_restarts_at_snapshot_remaining() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Report", 75, 25, 15)).unwrap();

    assert!(ctrl.start_task(&id).await.unwrap());
    let completion = ctrl.complete_active_interval().await.unwrap().unwrap();
    assert_eq!(completion.session_number, Some(1));
    assert_eq!(ctrl.active().unwrap().interval_index, 1);

    // 88 s into the 15-minute break.
    tokio::time::advance(Duration::from_secs(88)).await;
    assert!(ctrl.pause_active().await.unwrap());

    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Partial);
    assert_eq!(task.progress.total_sessions, 3);
    assert_eq!(task.progress.completed_sessions, 1);
    assert_eq!(
        ctrl.snapshot(&id),
        Some(&PausedSnapshot {
            remaining_secs: 812,
            interval_index: 1
        })
    );
    assert!(ctrl.active().is_none());

    log.drain();
    assert!(ctrl.start_task(&id).await.unwrap());
    assert_eq!(first_display(&log.events()), Some(812));
    assert!(ctrl.snapshot(&id).is_none());
    assert_eq!(ctrl.task(&id).unwrap().status, TaskStatus::Ongoing);
}

#[tokio::test(start_paused = true)]
async fn pause_then_immediate_resume_keeps_remaining() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Read", 25, 25, 5)).unwrap();

    ctrl.start_task(&id).await.unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;
    ctrl.pause_active().await.unwrap();
    log.drain();
    ctrl.start_task(&id).await.unwrap();
    assert_eq!(first_display(&log.events()), Some(1_200));
}

#[tokio::test(start_paused = true)]
async fn stale_snapshot_falls_back_to_full_duration() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Report", 75, 25, 15)).unwrap();

    ctrl.start_task(&id).await.unwrap();
    ctrl.complete_active_interval().await.unwrap();
    tokio::time::advance(Duration::from_secs(88)).await;
    ctrl.pause_active().await.unwrap();
    assert_eq!(ctrl.snapshot(&id).unwrap().interval_index, 1);

    // A leading break shifts the cursor from 1 to 2.
    let edit = TaskEdit {
        start_with_break: Some(true),
        ..TaskEdit::default()
    };
    ctrl.edit_task(&id, edit, monday()).await.unwrap();
    assert_eq!(ctrl.task(&id).unwrap().progress.current_session, 2);

    log.drain();
    ctrl.start_task(&id).await.unwrap();
    assert_eq!(first_display(&log.events()), Some(900));
    assert!(ctrl.snapshot(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn starting_another_task_pauses_the_running_one() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let a = ctrl.create_task(draft("A", 50, 25, 5)).unwrap();
    let b = ctrl.create_task(draft("B", 50, 25, 5)).unwrap();

    ctrl.start_task(&a).await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    ctrl.start_task(&b).await.unwrap();

    assert_eq!(ongoing_count(&ctrl), 1);
    assert_eq!(ctrl.task(&a).unwrap().status, TaskStatus::Partial);
    assert_eq!(ctrl.task(&b).unwrap().status, TaskStatus::Ongoing);
    assert_eq!(ctrl.active().unwrap().task_id, b);
    assert_eq!(ctrl.snapshot(&a).unwrap().remaining_secs, 1_440);

    // Switching back picks up A's own snapshot.
    log.drain();
    ctrl.start_task(&a).await.unwrap();
    assert_eq!(first_display(&log.events()), Some(1_440));
    assert_eq!(ongoing_count(&ctrl), 1);
    assert_eq!(ctrl.snapshot(&b).unwrap().remaining_secs, 1_500);
}

#[tokio::test(start_paused = true)]
async fn countdown_completion_auto_advances_to_the_end() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Essay", 50, 25, 5)).unwrap();
    ctrl.start_task(&id).await.unwrap();

    let mut completions = Vec::new();
    while let Some(pumped) = ctrl.pump().await.unwrap() {
        if let Pumped::IntervalCompleted(c) = pumped {
            completions.push(c);
        }
    }

    assert_eq!(completions.len(), 3);
    assert!(completions[2].task_completed);
    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress.completed_sessions, 2);
    assert!(ctrl.active().is_none());
    assert_eq!(
        log.notification_kinds(),
        vec![
            "FocusStarted",
            "FocusEnded",
            "BreakStarted",
            "BreakEnded",
            "FocusStarted",
            "FocusEnded",
            "TaskCompleted",
        ]
    );
    assert_eq!(store.saved_tasks()[0].status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn without_auto_advance_the_timer_waits() {
    let settings = Settings {
        auto_advance: false,
        ..Settings::default()
    };
    let store = MemoryStore::new().with_settings(settings);
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(TaskDraft::new("Plan", 50)).unwrap();

    ctrl.start_task(&id).await.unwrap();
    ctrl.complete_active_interval().await.unwrap().unwrap();
    assert!(ctrl.active().is_none());
    assert!(ctrl.pump().await.unwrap().is_none());

    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Partial);
    assert_eq!(task.progress.current_session, 1);
}

#[tokio::test(start_paused = true)]
async fn focus_mode_follows_the_advance_flag() {
    let settings = Settings {
        focus_mode_on_advance: true,
        ..Settings::default()
    };
    let store = MemoryStore::new().with_settings(settings);
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let mut d = TaskDraft::new("Deep work", 50);
    d.focus_mode = true;
    let id = ctrl.create_task(d).unwrap();

    ctrl.start_task(&id).await.unwrap();
    ctrl.complete_active_interval().await.unwrap(); // focus -> break
    ctrl.complete_active_interval().await.unwrap(); // break -> focus

    let last_controls = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::ControlsUpdated { controls, .. } => Some(controls),
            _ => None,
        })
        .last()
        .unwrap();
    assert!(last_controls.running);
    assert!(last_controls.focus_mode);
}

#[tokio::test(start_paused = true)]
async fn end_early_and_unmark_round_trip() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Slides", 75, 25, 5)).unwrap();

    ctrl.start_task(&id).await.unwrap();
    for _ in 0..3 {
        ctrl.complete_active_interval().await.unwrap();
    }
    assert_eq!(ctrl.task(&id).unwrap().progress.completed_sessions, 2);

    assert!(ctrl.end_early(&id).await.unwrap());
    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.ended_early());
    assert!(ctrl.active().is_none());

    assert!(ctrl.unmark_completed(&id).unwrap());
    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Partial);
    assert_eq!(task.progress.completed_sessions, 2);
    assert!(task.progress_is_consistent());
}

#[tokio::test(start_paused = true)]
async fn messages_from_other_runs_are_discarded() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(TaskDraft::new("Mail", 25)).unwrap();
    ctrl.start_task(&id).await.unwrap();
    let run = ctrl.active().unwrap().run;

    let late = CountdownMessage {
        run: run + 100,
        event: CountdownEvent::Complete,
    };
    assert_eq!(ctrl.handle_message(late).await.unwrap(), Pumped::Discarded);
    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Ongoing);
    assert_eq!(task.progress.completed_sessions, 0);
    assert_eq!(ctrl.active().unwrap().run, run);
}

#[tokio::test(start_paused = true)]
async fn completing_with_nothing_running_is_a_no_op() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    ctrl.create_task(TaskDraft::new("Idle", 25)).unwrap();
    assert!(ctrl.complete_active_interval().await.unwrap().is_none());
    assert!(!ctrl.pause_active().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn failed_saves_surface_but_keep_memory_state() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(TaskDraft::new("Taxes", 50)).unwrap();

    store.set_fail_saves(true);
    let err = ctrl.start_task(&id).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Database(DatabaseError::Unavailable(_))
    ));
    assert_eq!(ctrl.task(&id).unwrap().status, TaskStatus::Ongoing);
    assert!(ctrl.active().is_some());
    assert_eq!(store.saved_tasks()[0].status, TaskStatus::Pending);

    // The timer keeps working; the next successful save catches up.
    store.set_fail_saves(false);
    assert!(ctrl.pause_active().await.unwrap());
    assert_eq!(store.saved_tasks()[0].status, TaskStatus::Partial);
}

#[tokio::test(start_paused = true)]
async fn restart_demotes_running_tasks() {
    let mut running = Task::from_draft(
        TaskDraft::new("Left running", 50),
        TimerLengths::default(),
        chrono::Utc::now(),
    )
    .unwrap();
    running.start(chrono::Utc::now());
    let store = MemoryStore::with_tasks(vec![running.clone()]);

    let log = EventLog::new();
    let ctrl = controller(&store, &log);
    assert_eq!(ctrl.recovered().len(), 1);
    assert_eq!(ctrl.task(&running.id).unwrap().status, TaskStatus::Partial);
    assert!(ctrl.active().is_none());
    assert_eq!(store.saved_tasks()[0].status, TaskStatus::Partial);
}

#[tokio::test(start_paused = true)]
async fn starting_warns_about_higher_priority_work() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let current = ctrl.create_task(TaskDraft::new("Medium", 25)).unwrap();
    let mut urgent = TaskDraft::new("Urgent", 25);
    urgent.priority = Priority::High;
    let urgent = ctrl.create_task(urgent).unwrap();

    assert!(ctrl.start_task(&current).await.unwrap());
    assert_eq!(ctrl.task(&current).unwrap().status, TaskStatus::Ongoing);
    let conflict = log.events().into_iter().find_map(|e| match e {
        Event::PriorityConflict { task_id, .. } => Some(task_id),
        _ => None,
    });
    assert_eq!(conflict, Some(urgent.clone()));
    assert_eq!(
        ctrl.suggest_preemption(&current).unwrap().map(|t| t.id.clone()),
        Some(urgent)
    );
}

#[tokio::test(start_paused = true)]
async fn overdue_pending_tasks_are_marked_missed() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let mut scheduled = TaskDraft::new("Standup", 25);
    scheduled.start_date = Some(monday());
    scheduled.start_time = NaiveTime::from_hms_opt(9, 0, 0);
    let overdue = ctrl.create_task(scheduled).unwrap();
    let unscheduled = ctrl.create_task(TaskDraft::new("Someday", 25)).unwrap();

    let missed = ctrl
        .check_missed(monday().and_hms_opt(8, 59, 0).unwrap())
        .unwrap();
    assert!(missed.is_empty());

    let missed = ctrl
        .check_missed(monday().and_hms_opt(9, 30, 0).unwrap())
        .unwrap();
    assert_eq!(missed, vec![overdue.clone()]);
    assert_eq!(ctrl.task(&overdue).unwrap().status, TaskStatus::Missed);
    assert_eq!(ctrl.task(&unscheduled).unwrap().status, TaskStatus::Pending);
    assert_eq!(log.notification_kinds(), vec!["TaskMissed"]);

    // A missed task can still be started.
    assert!(ctrl.start_task(&overdue).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn recurring_templates_expand_once_and_delete_forward() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let mut template = TaskDraft::new("Workout", 25);
    template.recurrence = [1, 2, 3, 4, 5].into_iter().collect();
    let template = ctrl.create_task(template).unwrap();

    assert_eq!(ctrl.expand_recurring(monday()).unwrap().len(), 5);
    assert!(ctrl.expand_recurring(monday()).unwrap().is_empty());
    assert_eq!(ctrl.tasks().len(), 6);

    let edit = TaskEdit {
        name: Some("Morning workout".into()),
        ..TaskEdit::default()
    };
    ctrl.edit_task(&template, edit, monday()).await.unwrap();
    assert!(ctrl
        .tasks()
        .iter()
        .filter(|t| t.is_instance())
        .all(|t| t.name == "Morning workout"));

    ctrl.delete_task(&template, monday()).await.unwrap();
    assert!(ctrl.tasks().is_empty());
    assert!(store.saved_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deleting_the_running_task_stops_the_countdown() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(TaskDraft::new("Scratch", 25)).unwrap();
    ctrl.start_task(&id).await.unwrap();

    let removed = ctrl.delete_task(&id, monday()).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(ctrl.active().is_none());
    assert!(ctrl.pump().await.unwrap().is_none());
    assert!(matches!(
        ctrl.start_task(&id).await,
        Err(CoreError::TaskNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn retiming_the_running_task_restarts_its_interval() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Code", 50, 25, 5)).unwrap();
    ctrl.start_task(&id).await.unwrap();
    let before = ctrl.active().unwrap().clone();

    log.drain();
    let edit = TaskEdit {
        timer: Some(TimerPreference::Custom {
            focus_min: 50,
            break_min: 10,
        }),
        ..TaskEdit::default()
    };
    ctrl.edit_task(&id, edit, monday()).await.unwrap();

    let after = ctrl.active().unwrap();
    assert_ne!(after.run, before.run);
    assert_ne!(after.interval_id, before.interval_id);
    assert_eq!(first_display(&log.events()), Some(3_000));
    assert_eq!(ctrl.task(&id).unwrap().status, TaskStatus::Ongoing);
}

#[tokio::test(start_paused = true)]
async fn pausing_after_the_interval_ran_out_completes_it() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Inbox", 2, 1, 1)).unwrap();
    ctrl.start_task(&id).await.unwrap();

    // The countdown finishes while nobody is pumping its messages.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(ctrl.pause_active().await.unwrap());

    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.progress.completed_sessions, 1);
    assert_eq!(task.progress.current_session, 1);
    assert_eq!(task.status, TaskStatus::Partial);
    assert!(ctrl.snapshot(&id).is_none());
    assert!(ctrl.active().is_none());
    assert!(ctrl.pump().await.unwrap().is_none());
    assert_eq!(
        log.notification_kinds(),
        vec!["FocusStarted", "FocusEnded"]
    );
    assert_eq!(store.saved_tasks()[0].progress.completed_sessions, 1);

    log.drain();
    ctrl.start_task(&id).await.unwrap();
    assert_eq!(first_display(&log.events()), Some(60));
    assert_eq!(ctrl.active().unwrap().interval_index, 1);
}

#[tokio::test(start_paused = true)]
async fn growing_the_estimate_keeps_a_taken_break_and_its_snapshot() {
    let store = MemoryStore::new();
    let log = EventLog::new();
    let mut ctrl = controller(&store, &log);
    let id = ctrl.create_task(draft("Thesis", 75, 25, 5)).unwrap();

    ctrl.start_task(&id).await.unwrap();
    ctrl.complete_active_interval().await.unwrap(); // F1
    ctrl.complete_active_interval().await.unwrap(); // break
    assert_eq!(ctrl.active().unwrap().interval_index, 2);
    tokio::time::advance(Duration::from_secs(100)).await;
    ctrl.pause_active().await.unwrap();

    let edit = TaskEdit {
        estimated_minutes: Some(125),
        ..TaskEdit::default()
    };
    ctrl.edit_task(&id, edit, monday()).await.unwrap();
    let task = ctrl.task(&id).unwrap();
    assert_eq!(task.progress.total_sessions, 5);
    assert_eq!(task.progress.current_session, 2);
    assert!(task.intervals[1].completed);

    log.drain();
    ctrl.start_task(&id).await.unwrap();
    assert_eq!(first_display(&log.events()), Some(1_400));
}
