pub mod countdown;
pub mod interval;

pub use countdown::{
    spawn_countdown, CountdownClock, CountdownCommand, CountdownEvent, CountdownHandle,
    CountdownMessage, CountdownState, MonotonicClock, RunId, SystemClock,
};
pub use interval::{generate, Interval, IntervalType, TimerLengths};
