//! Simulation clock for deterministic runs

use crate::scheduler::TimeInterface;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Simulated time. `sleep` advances the clock instead of blocking, so a
/// 20 ms loop period costs nothing in tests. Clones share one timeline.
#[derive(Debug, Clone)]
pub struct SimClock {
    base_instant: Instant,
    base_wallclock: SystemTime,
    elapsed_nanos: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Wall clock reads start at `wallclock`.
    pub fn starting_at(wallclock: SystemTime) -> Self {
        Self {
            base_instant: Instant::now(),
            base_wallclock: wallclock,
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, dt: Duration) {
        let nanos = u64::try_from(dt.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeInterface for SimClock {
    fn now_monotonic(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn now_wallclock(&self) -> SystemTime {
        self.base_wallclock + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_sleep_advances_shared_timeline() {
        let clock = SimClock::starting_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let other = clock.clone();
        let t0 = clock.now_monotonic();
        other.sleep(Duration::from_millis(20));
        assert_eq!(clock.now_monotonic().duration_since(t0), Duration::from_millis(20));
        assert_eq!(
            clock.now_wallclock(),
            UNIX_EPOCH + Duration::from_millis(1_700_000_000_020)
        );
    }
}
