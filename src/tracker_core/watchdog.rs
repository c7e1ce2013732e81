//! Liveness watchdog for the snapshot source
//!
//! A live feed that stops producing new outcomes for longer than the threshold usually
//! means the source itself hung (frozen page, stuck endpoint), not that the feed is quiet.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LivenessWatchdog {
    threshold: Duration,
    last_activity: Instant,
}

impl LivenessWatchdog {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_activity: now,
        }
    }

    /// Called whenever at least one new event was confirmed
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Restart the staleness clock after a resync
    pub fn reset(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.is_stale_after(now, self.threshold)
    }

    pub fn is_stale_after(&self, now: Instant, threshold: Duration) -> bool {
        self.idle_for(now) > threshold
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_after_threshold() {
        let start = Instant::now();
        let watchdog = LivenessWatchdog::new(Duration::from_secs(60), start);

        assert!(!watchdog.is_stale(start));
        assert!(!watchdog.is_stale(start + Duration::from_secs(60)));
        assert!(watchdog.is_stale(start + Duration::from_secs(61)));
    }

    #[test]
    fn test_activity_resets_staleness() {
        let start = Instant::now();
        let mut watchdog = LivenessWatchdog::new(Duration::from_secs(30), start);

        let later = start + Duration::from_secs(45);
        assert!(watchdog.is_stale(later));

        watchdog.record_activity(later);
        assert!(!watchdog.is_stale(later + Duration::from_millis(1)));
        assert_eq!(watchdog.idle_for(later + Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_threshold() {
        let start = Instant::now();
        let watchdog = LivenessWatchdog::new(Duration::from_secs(300), start);
        let now = start + Duration::from_secs(20);

        assert!(watchdog.is_stale_after(now, Duration::from_secs(10)));
        assert!(!watchdog.is_stale(now));
    }

    #[test]
    fn test_clock_before_last_activity_is_not_stale() {
        let start = Instant::now() + Duration::from_secs(10);
        let watchdog = LivenessWatchdog::new(Duration::from_secs(1), start);
        assert_eq!(watchdog.idle_for(Instant::now()), Duration::ZERO);
    }
}
