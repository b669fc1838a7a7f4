//! Sliding Log rate limiting algorithm.
//!
//! The Sliding Log algorithm stores timestamps of all admitted requests within
//! the window, providing exact accuracy but with memory proportional to the
//! limit.

use std::collections::VecDeque;
use std::fmt;

use dashmap::DashMap;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::gc::{GcInterval, GcState};
use crate::quota::Quota;

/// Sliding Log rate limiting algorithm.
///
/// For each key, keeps the ascending timestamps of admitted requests that fall
/// in the trailing window `[now - window, now]`. A request is admitted while
/// fewer than `quota.limit()` timestamps remain in that window, so a request
/// made exactly `window` ago still counts.
pub struct SlidingLog<C = SystemClock> {
    quota: Quota,
    logs: DashMap<String, VecDeque<u64>>,
    gc: GcState,
    clock: C,
}

impl SlidingLog {
    /// Create a new Sliding Log limiter on the system clock.
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, SystemClock::new())
    }
}

impl<C: Clock> SlidingLog<C> {
    /// Create a new Sliding Log limiter reading time from `clock`.
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        Self {
            quota,
            logs: DashMap::new(),
            gc: GcState::default(),
            clock,
        }
    }

    /// Set when the limiter sweeps drained logs.
    pub fn with_gc(mut self, interval: GcInterval) -> Self {
        self.gc = GcState::new(interval);
        self
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// Oldest instant still inside the window ending at `now`.
    fn window_start(&self, now: u64) -> u64 {
        now.saturating_sub(self.quota.window_ms())
    }

    fn decide(&self, key: &str, now: u64) -> bool {
        let window_start = self.window_start(now);

        if let Some(mut log) = self.logs.get_mut(key) {
            return self.record(key, &mut log, now, window_start);
        }

        let mut log = self.logs.entry(key.to_owned()).or_default();
        self.record(key, &mut log, now, window_start)
    }

    fn record(&self, key: &str, log: &mut VecDeque<u64>, now: u64, window_start: u64) -> bool {
        trim(log, window_start);

        if log.len() as u64 >= self.quota.limit() {
            tracing::trace!(algorithm = self.name(), key, in_window = log.len(), "limit reached");
            return false;
        }

        log.push_back(now);
        true
    }
}

/// Drop every timestamp older than `window_start`. The log is sorted, so the
/// expired prefix is found by binary search.
fn trim(log: &mut VecDeque<u64>, window_start: u64) {
    let expired = log.partition_point(|&ts| ts < window_start);
    log.drain(..expired);
}

impl<C> fmt::Debug for SlidingLog<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingLog")
            .field("quota", &self.quota)
            .field("keys", &self.logs.len())
            .finish()
    }
}

impl<C: Clock> Algorithm for SlidingLog<C> {
    fn name(&self) -> &'static str {
        "sliding_log"
    }

    fn allow(&self, key: &str) -> bool {
        let allowed = self.decide(key, self.clock.now_ms());
        if self.gc.record_request() {
            self.sweep();
        }
        allowed
    }

    fn sweep(&self) -> usize {
        let Some(_guard) = self.gc.try_begin() else {
            return 0;
        };

        let window_start = self.window_start(self.clock.now_ms());
        let mut evicted = 0;
        self.logs.retain(|_, log| {
            trim(log, window_start);
            if log.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        tracing::debug!(
            algorithm = self.name(),
            evicted,
            remaining = self.logs.len(),
            "sweep finished"
        );
        evicted
    }

    fn len(&self) -> usize {
        self.logs.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::algorithm::testing::admitted_concurrently;
    use crate::clock::ManualClock;

    fn limiter(limit: u64, window: Duration) -> (SlidingLog<ManualClock>, ManualClock) {
        let clock = ManualClock::new(5_000_000);
        let limiter = SlidingLog::with_clock(Quota::new(limit, window), clock.clone())
            .with_gc(GcInterval::Manual);
        (limiter, clock)
    }

    #[test]
    fn test_sliding_log_basic() {
        let (algorithm, _clock) = limiter(3, Duration::from_secs(10));

        for i in 1..=3 {
            assert!(algorithm.allow("user:1"), "Request {} should be allowed", i);
        }

        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_precision() {
        // 2 requests per 200ms
        let (algorithm, clock) = limiter(2, Duration::from_millis(200));

        assert!(algorithm.allow("user:1"));
        clock.advance(Duration::from_millis(50));
        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));

        // First request still counts exactly 200ms after it was made
        clock.advance(Duration::from_millis(150));
        assert!(!algorithm.allow("user:1"));
        clock.advance(Duration::from_millis(1));
        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_drains_after_window() {
        let (algorithm, clock) = limiter(2, Duration::from_secs(2));

        assert!(algorithm.allow("user:2"));
        assert!(algorithm.allow("user:2"));
        assert!(!algorithm.allow("user:2"));

        clock.advance(Duration::from_millis(2_001));
        assert!(algorithm.allow("user:2"));
        assert!(algorithm.allow("user:2"));
    }

    #[test]
    fn test_sliding_log_window_is_closed() {
        let clock = ManualClock::new(10_000);
        let algorithm = SlidingLog::with_clock(Quota::new(1, Duration::from_secs(1)), clock.clone())
            .with_gc(GcInterval::Manual);

        assert!(algorithm.allow("user:1"));

        // A request made exactly one window ago is still in view
        clock.set(11_000);
        assert!(!algorithm.allow("user:1"));
        algorithm.sweep();
        assert!(!algorithm.allow("user:1"));

        clock.set(11_001);
        assert!(algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_no_boundary_burst() {
        let (algorithm, clock) = limiter(2, Duration::from_secs(1));
        clock.set(5_000_900);

        assert!(algorithm.allow("user:1"));
        assert!(algorithm.allow("user:1"));

        // Crossing an aligned second does not reset anything
        clock.set(5_001_100);
        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_rejection_not_logged() {
        let (algorithm, _clock) = limiter(2, Duration::from_secs(10));

        for _ in 0..10 {
            algorithm.allow("user:1");
        }

        let log = algorithm.logs.get("user:1").unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_sliding_log_clock_near_epoch() {
        let clock = ManualClock::new(0);
        let algorithm = SlidingLog::with_clock(Quota::new(1, Duration::from_secs(1)), clock.clone())
            .with_gc(GcInterval::Manual);

        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));
        clock.set(1_000);
        assert!(!algorithm.allow("user:1"));
        clock.set(1_001);
        assert!(algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_sweep() {
        let (algorithm, clock) = limiter(5, Duration::from_secs(1));

        algorithm.allow("user:1");
        clock.advance(Duration::from_millis(600));
        algorithm.allow("user:2");
        assert_eq!(algorithm.len(), 2);

        clock.advance(Duration::from_millis(600));
        assert_eq!(algorithm.sweep(), 1);
        assert_eq!(algorithm.len(), 1);
        assert!(algorithm.logs.get("user:1").is_none());

        // Sweeping again changes nothing
        assert_eq!(algorithm.sweep(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(algorithm.sweep(), 1);
        assert!(algorithm.is_empty());
    }

    #[test]
    fn test_sliding_log_sweep_does_not_change_decisions() {
        let (algorithm, clock) = limiter(2, Duration::from_secs(1));

        algorithm.allow("user:1");
        clock.advance(Duration::from_millis(500));
        algorithm.allow("user:1");
        algorithm.sweep();
        assert!(!algorithm.allow("user:1"));

        clock.advance(Duration::from_millis(501));
        algorithm.sweep();
        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_log_concurrent_same_key() {
        let (algorithm, _clock) = limiter(10, Duration::from_secs(5));
        let admitted = admitted_concurrently(&algorithm, "user:3", 15);
        assert_eq!(admitted, 10);
    }
}
