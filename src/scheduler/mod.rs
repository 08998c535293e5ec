// src/scheduler/mod.rs - Clock abstraction for the control loop
use std::time::{Duration, Instant, SystemTime};

pub trait TimeInterface: Send + Sync {
    fn now_monotonic(&self) -> Instant;
    fn now_wallclock(&self) -> SystemTime;
    fn sleep(&self, duration: Duration);
}

/// Standard time sync abstraction using std::time.
/// Implements the TimeInterface trait using Rust's standard library.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdTimeSync;

impl TimeInterface for StdTimeSync {
    /// Returns the current monotonic time as std::time::Instant.
    fn now_monotonic(&self) -> Instant {
        Instant::now()
    }

    /// Returns the current wallclock time as std::time::SystemTime.
    fn now_wallclock(&self) -> SystemTime {
        SystemTime::now()
    }

    /// Sleeps the current thread for the specified duration.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_time_sync_sleep_advances_monotonic() {
        let clock = StdTimeSync;
        let before = clock.now_monotonic();
        clock.sleep(Duration::from_millis(2));
        assert!(clock.now_monotonic().duration_since(before) >= Duration::from_millis(2));
    }
}
