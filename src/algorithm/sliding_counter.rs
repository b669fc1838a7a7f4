//! Sliding Counter rate limiting algorithm.
//!
//! Approximates the sliding log with two counters per key: the current
//! aligned window and the one before it. The previous window's count is
//! weighted by how much of it still overlaps the trailing window.

use std::collections::BTreeMap;
use std::fmt;

use dashmap::DashMap;

use crate::algorithm::{Algorithm, window_expired, window_index};
use crate::clock::{Clock, SystemClock};
use crate::gc::{GcInterval, GcState};
use crate::quota::Quota;

/// Estimated number of requests in the trailing window ending at `now_ms`.
///
/// `previous * weight + current`, where `weight` is the fraction of the
/// current window still to elapse: `(window_ms - now_ms % window_ms) / window_ms`.
pub fn estimate(now_ms: u64, window_ms: u64, previous: u64, current: u64) -> f64 {
    let elapsed = now_ms % window_ms;
    let weight = (window_ms - elapsed) as f64 / window_ms as f64;
    previous as f64 * weight + current as f64
}

/// Sliding Counter rate limiting algorithm.
///
/// Uses a weighted combination of the current and previous windows to
/// smooth out the fixed window's boundary burst. The estimate may admit a
/// little more or less than an exact log would; that margin is accepted in
/// exchange for constant memory per key.
pub struct SlidingCounter<C = SystemClock> {
    quota: Quota,
    counters: DashMap<String, BTreeMap<u64, u64>>,
    gc: GcState,
    clock: C,
}

impl SlidingCounter {
    /// Create a new Sliding Counter limiter on the system clock.
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, SystemClock::new())
    }
}

impl<C: Clock> SlidingCounter<C> {
    /// Create a new Sliding Counter limiter reading time from `clock`.
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        Self {
            quota,
            counters: DashMap::new(),
            gc: GcState::default(),
            clock,
        }
    }

    /// Set when the limiter sweeps stale windows.
    pub fn with_gc(mut self, interval: GcInterval) -> Self {
        self.gc = GcState::new(interval);
        self
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    fn decide(&self, key: &str, now: u64) -> bool {
        if let Some(mut counts) = self.counters.get_mut(key) {
            return self.record(key, &mut counts, now);
        }

        let mut counts = self.counters.entry(key.to_owned()).or_default();
        self.record(key, &mut counts, now)
    }

    fn record(&self, key: &str, counts: &mut BTreeMap<u64, u64>, now: u64) -> bool {
        let window_ms = self.quota.window_ms();
        let current = window_index(now, window_ms);
        let current_count = counts.get(&current).copied().unwrap_or(0);
        let previous_count = current
            .checked_sub(1)
            .and_then(|previous| counts.get(&previous).copied())
            .unwrap_or(0);

        let estimated = estimate(now, window_ms, previous_count, current_count);
        if estimated >= self.quota.limit() as f64 {
            tracing::trace!(algorithm = self.name(), key, estimated, "limit reached");
            return false;
        }

        *counts.entry(current).or_insert(0) += 1;
        counts.retain(|&index, _| !window_expired(index, current));
        true
    }
}

impl<C> fmt::Debug for SlidingCounter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingCounter")
            .field("quota", &self.quota)
            .field("keys", &self.counters.len())
            .finish()
    }
}

impl<C: Clock> Algorithm for SlidingCounter<C> {
    fn name(&self) -> &'static str {
        "sliding_counter"
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

        let current = window_index(self.clock.now_ms(), self.quota.window_ms());
        let mut evicted = 0;
        self.counters.retain(|_, counts| {
            counts.retain(|&index, _| !window_expired(index, current));
            if counts.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        tracing::debug!(
            algorithm = self.name(),
            evicted,
            remaining = self.counters.len(),
            "sweep finished"
        );
        evicted
    }

    fn len(&self) -> usize {
        self.counters.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::algorithm::testing::admitted_concurrently;
    use crate::clock::ManualClock;

    fn limiter(limit: u64, window: Duration) -> (SlidingCounter<ManualClock>, ManualClock) {
        let clock = ManualClock::new(10_000_000);
        let limiter = SlidingCounter::with_clock(Quota::new(limit, window), clock.clone())
            .with_gc(GcInterval::Manual);
        (limiter, clock)
    }

    #[test]
    fn test_estimate_reference_values() {
        // At the start of a window the whole previous window is in view
        assert_eq!(estimate(10_000, 1_000, 8, 0), 8.0);
        // A quarter in: three quarters of the previous window remain
        assert_eq!(estimate(10_250, 1_000, 8, 2), 8.0);
        // Halfway
        assert_eq!(estimate(10_500, 1_000, 4, 1), 3.0);
        assert_eq!(estimate(10_750, 1_000, 4, 0), 1.0);
    }

    #[test]
    fn test_sliding_counter_basic() {
        let (algorithm, _clock) = limiter(5, Duration::from_secs(10));

        for i in 1..=5 {
            assert!(algorithm.allow("user:1"), "Request {} should be allowed", i);
        }

        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_counter_weights_previous_window() {
        let (algorithm, clock) = limiter(4, Duration::from_secs(1));

        for _ in 0..4 {
            assert!(algorithm.allow("user:1"));
        }

        // Start of next window: previous weight 1.0, estimate 4
        clock.advance(Duration::from_secs(1));
        assert!(!algorithm.allow("user:1"));

        // Halfway: estimate 4 * 0.5 = 2, room for two more
        clock.advance(Duration::from_millis(500));
        assert!(algorithm.allow("user:1"));
        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_counter_window_expiration() {
        let (algorithm, clock) = limiter(2, Duration::from_secs(3));

        assert!(algorithm.allow("user:2"));
        assert!(algorithm.allow("user:2"));
        assert!(!algorithm.allow("user:2"));

        // Two windows later nothing is left in view
        clock.advance(Duration::from_secs(6));
        assert!(algorithm.allow("user:2"));
    }

    #[test]
    fn test_sliding_counter_rejection_does_not_count() {
        let (algorithm, clock) = limiter(3, Duration::from_secs(10));

        for _ in 0..10 {
            algorithm.allow("user:1");
        }

        let current = window_index(clock.now_ms(), 10_000);
        let counts = algorithm.counters.get("user:1").unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get(&current), Some(&3));
    }

    #[test]
    fn test_sliding_counter_keeps_two_windows_per_key() {
        let (algorithm, clock) = limiter(100, Duration::from_secs(1));

        for _ in 0..5 {
            algorithm.allow("user:1");
            clock.advance(Duration::from_secs(1));
        }

        let counts = algorithm.counters.get("user:1").unwrap();
        assert!(counts.len() <= 2);
    }

    #[test]
    fn test_sliding_counter_sweep() {
        let (algorithm, clock) = limiter(3, Duration::from_secs(2));

        for _ in 0..3 {
            algorithm.allow("user:4");
        }
        algorithm.allow("user:5");

        // Previous window still matters
        clock.advance(Duration::from_secs(2));
        assert_eq!(algorithm.sweep(), 0);
        assert_eq!(algorithm.len(), 2);

        clock.advance(Duration::from_secs(2));
        assert_eq!(algorithm.sweep(), 2);
        assert!(algorithm.is_empty());

        assert!(algorithm.allow("user:4"));
    }

    #[test]
    fn test_sliding_counter_sweep_does_not_change_decisions() {
        let (algorithm, clock) = limiter(4, Duration::from_secs(1));

        for _ in 0..4 {
            algorithm.allow("user:1");
        }
        clock.advance(Duration::from_millis(1_500));
        algorithm.sweep();
        algorithm.sweep();
        assert!(algorithm.allow("user:1"));
        assert!(algorithm.allow("user:1"));
        assert!(!algorithm.allow("user:1"));
    }

    #[test]
    fn test_sliding_counter_concurrent_same_key() {
        let (algorithm, _clock) = limiter(10, Duration::from_secs(5));
        let admitted = admitted_concurrently(&algorithm, "user:3", 15);
        assert_eq!(admitted, 10);
    }

    proptest! {
        #[test]
        fn prop_estimate_matches_reference(
            now in 0u64..1_000_000_000_000,
            window in 1u64..10_000_000,
            previous in 0u64..100_000,
            current in 0u64..100_000,
        ) {
            let elapsed = now % window;
            let weight = (window - elapsed) as f64 / window as f64;
            prop_assert!(weight > 0.0 && weight <= 1.0);
            prop_assert_eq!(estimate(now, window, previous, current), previous as f64 * weight + current as f64);
        }

        #[test]
        fn prop_rejects_iff_estimate_reaches_limit(
            limit in 1u64..20,
            previous in 0u64..40,
            offset in 0u64..1_000,
        ) {
            let clock = ManualClock::new(0);
            let algorithm = SlidingCounter::with_clock(Quota::new(limit, Duration::from_secs(1)), clock.clone())
                .with_gc(GcInterval::Manual);
            // Pre-load the previous window directly
            if previous > 0 {
                algorithm.counters.entry("k".to_owned()).or_default().insert(0, previous);
            }

            clock.set(1_000 + offset);
            let expected = estimate(1_000 + offset, 1_000, previous, 0) < limit as f64;
            prop_assert_eq!(algorithm.allow("k"), expected);
        }
    }
}
