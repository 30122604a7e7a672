//! Countdown process.
//!
//! The countdown knows nothing about tasks or intervals, only a duration in
//! seconds. It runs as its own tokio task and talks to its owner over two
//! ordered channels: [`CountdownCommand`]s in, [`CountdownMessage`]s out.
//!
//! Remaining time is never accumulated tick by tick. Every check recomputes
//!
//! ```text
//! remaining = max(0, duration - floor((now - start) / 1000))
//! ```
//!
//! from the clock, so a suspended host or a starved poll loop cannot make the
//! countdown drift. Resuming shifts `start` forward by the paused span so the
//! same formula keeps working.
//!
//! Every command is acknowledged by exactly one event, even when the command
//! is a no-op in the current state:
//!
//! | command          | acknowledgement          |
//! |------------------|--------------------------|
//! | `Start`          | `Tick` (full duration)   |
//! | `Pause`          | `Paused`                 |
//! | `Resume`         | `Resumed`                |
//! | `Stop`           | `Stopped`                |
//! | `QueryRemaining` | `Remaining`              |

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::{CoreError, Result};

/// Internal polling cadence. Ticks are still emitted at most once per second.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Opaque tag the owner attaches to a `Start`; echoed on every event of that run.
pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountdownCommand {
    Start { duration_secs: u64, run: RunId },
    Pause,
    Resume,
    Stop,
    QueryRemaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountdownEvent {
    Tick { remaining_secs: u64, progress_pct: f64 },
    Paused { remaining_secs: u64 },
    Resumed,
    Stopped,
    Complete,
    Remaining { remaining_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountdownMessage {
    pub run: RunId,
    pub event: CountdownEvent,
}

/// Source of "now" for the countdown, in milliseconds.
pub trait CountdownClock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Wall clock (milliseconds since the Unix epoch).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl CountdownClock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Milliseconds since creation on tokio's clock.
///
/// Follows `tokio::time::pause`/`advance`, which makes countdown runs
/// deterministic under `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownClock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Idle,
    Running,
    Paused,
}

/// Countdown bookkeeping, free of any I/O. The actor feeds it commands and
/// clock readings and forwards whatever it returns.
#[derive(Debug, Clone)]
pub struct Countdown {
    state: CountdownState,
    run: RunId,
    duration_secs: u64,
    started_at_ms: Option<u64>,
    paused_at_ms: Option<u64>,
    remaining_secs: u64,
    last_reported_secs: Option<u64>,
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            state: CountdownState::Idle,
            run: 0,
            duration_secs: 0,
            started_at_ms: None,
            paused_at_ms: None,
            remaining_secs: 0,
            last_reported_secs: None,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// Apply one command, returning the events to emit (acknowledgement first).
    pub fn apply(&mut self, command: CountdownCommand, now_ms: u64) -> Vec<CountdownMessage> {
        match command {
            CountdownCommand::Start { duration_secs, run } => {
                self.run = run;
                self.duration_secs = duration_secs;
                self.started_at_ms = Some(now_ms);
                self.paused_at_ms = None;
                self.remaining_secs = duration_secs;
                self.last_reported_secs = Some(duration_secs);
                self.state = CountdownState::Running;
                let mut out = vec![self.message(CountdownEvent::Tick {
                    remaining_secs: duration_secs,
                    progress_pct: 0.0,
                })];
                if duration_secs == 0 {
                    out.extend(self.poll(now_ms));
                }
                out
            }
            CountdownCommand::Pause => {
                if self.state == CountdownState::Running {
                    self.remaining_secs = self.compute_remaining(now_ms);
                    self.paused_at_ms = Some(now_ms);
                    self.state = CountdownState::Paused;
                }
                vec![self.message(CountdownEvent::Paused {
                    remaining_secs: self.remaining_secs,
                })]
            }
            CountdownCommand::Resume => {
                if self.state == CountdownState::Paused {
                    if let (Some(started), Some(paused)) = (self.started_at_ms, self.paused_at_ms) {
                        let paused_for = now_ms.saturating_sub(paused);
                        self.started_at_ms = Some(started.saturating_add(paused_for));
                    }
                    self.paused_at_ms = None;
                    self.state = CountdownState::Running;
                }
                vec![self.message(CountdownEvent::Resumed)]
            }
            CountdownCommand::Stop => {
                self.reset();
                vec![self.message(CountdownEvent::Stopped)]
            }
            CountdownCommand::QueryRemaining => {
                if self.state == CountdownState::Running {
                    self.remaining_secs = self.compute_remaining(now_ms);
                }
                vec![self.message(CountdownEvent::Remaining {
                    remaining_secs: self.remaining_secs,
                })]
            }
        }
    }

    /// Periodic check. Emits a tick when the whole-second remaining value
    /// changed, or a single `Complete` when it reaches zero.
    pub fn poll(&mut self, now_ms: u64) -> Vec<CountdownMessage> {
        if self.state != CountdownState::Running {
            return Vec::new();
        }
        let remaining = self.compute_remaining(now_ms);
        self.remaining_secs = remaining;

        if remaining == 0 {
            self.state = CountdownState::Idle;
            self.started_at_ms = None;
            self.last_reported_secs = None;
            return vec![self.message(CountdownEvent::Complete)];
        }
        if self.last_reported_secs == Some(remaining) {
            return Vec::new();
        }
        self.last_reported_secs = Some(remaining);
        vec![self.message(CountdownEvent::Tick {
            remaining_secs: remaining,
            progress_pct: self.progress_pct(remaining),
        })]
    }

    fn compute_remaining(&self, now_ms: u64) -> u64 {
        let Some(started) = self.started_at_ms else {
            return self.remaining_secs;
        };
        let elapsed_secs = now_ms.saturating_sub(started) / 1000;
        self.duration_secs.saturating_sub(elapsed_secs)
    }

    fn progress_pct(&self, remaining: u64) -> f64 {
        if self.duration_secs == 0 {
            return 100.0;
        }
        let done = self.duration_secs.saturating_sub(remaining) as f64;
        (done / self.duration_secs as f64 * 100.0).min(100.0)
    }

    fn reset(&mut self) {
        self.state = CountdownState::Idle;
        self.duration_secs = 0;
        self.started_at_ms = None;
        self.paused_at_ms = None;
        self.remaining_secs = 0;
        self.last_reported_secs = None;
    }

    fn message(&self, event: CountdownEvent) -> CountdownMessage {
        CountdownMessage {
            run: self.run,
            event,
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner's side of a running countdown process.
///
/// Dropping the handle closes the command channel, which ends the process.
#[derive(Debug)]
pub struct CountdownHandle {
    commands: mpsc::UnboundedSender<CountdownCommand>,
    events: mpsc::UnboundedReceiver<CountdownMessage>,
}

impl CountdownHandle {
    pub fn send(&self, command: CountdownCommand) -> Result<()> {
        tracing::debug!(?command, "countdown command");
        self.commands
            .send(command)
            .map_err(|_| CoreError::TimerUnavailable)
    }

    /// Wait for the next event. `None` once the process has exited.
    pub async fn recv(&mut self) -> Option<CountdownMessage> {
        self.events.recv().await
    }
}

/// Spawn a countdown process on the current tokio runtime.
pub fn spawn_countdown(clock: Arc<dyn CountdownClock>) -> CountdownHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_countdown(clock, command_rx, event_tx));
    CountdownHandle {
        commands: command_tx,
        events: event_rx,
    }
}

async fn run_countdown(
    clock: Arc<dyn CountdownClock>,
    mut commands: mpsc::UnboundedReceiver<CountdownCommand>,
    events: mpsc::UnboundedSender<CountdownMessage>,
) {
    let mut countdown = Countdown::new();
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let out = tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(command) => countdown.apply(command, clock.now_ms()),
                None => break,
            },
            _ = poll.tick() => countdown.poll(clock.now_ms()),
        };
        for message in out {
            if events.send(message).is_err() {
                return;
            }
        }
    }
    tracing::debug!("countdown process exiting");
}
