use chrono::{Local, NaiveDateTime, SubsecRound};

/// Source of the deployment's local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}
