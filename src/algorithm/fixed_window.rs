//! Fixed Window rate limiting algorithm.
//!
//! Time is cut into aligned, non-overlapping windows and each key gets a
//! fresh counter in every window. A client can spend its full limit at the
//! end of one window and again at the start of the next, so up to
//! `2 * limit` requests may be admitted across a window edge. That burst is
//! the known cost of this algorithm, not a defect.

use std::fmt;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::algorithm::{Algorithm, window_expired, window_index};
use crate::clock::{Clock, SystemClock};
use crate::gc::{GcInterval, GcState};
use crate::quota::Quota;

/// Composite key: caller key plus window index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    key: String,
    window: u64,
}

/// Fixed Window rate limiting algorithm.
///
/// Admits at most `quota.limit()` requests per key in each aligned window of
/// `quota.window()`.
pub struct FixedWindow<C = SystemClock> {
    quota: Quota,
    counters: DashMap<WindowKey, u64>,
    gc: GcState,
    clock: C,
}

impl FixedWindow {
    /// Create a new Fixed Window limiter on the system clock.
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, SystemClock::new())
    }
}

impl<C: Clock> FixedWindow<C> {
    /// Create a new Fixed Window limiter reading time from `clock`.
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        Self {
            quota,
            counters: DashMap::new(),
            gc: GcState::default(),
            clock,
        }
    }

    /// Set when the limiter sweeps expired windows.
    pub fn with_gc(mut self, interval: GcInterval) -> Self {
        self.gc = GcState::new(interval);
        self
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    fn decide(&self, key: &str, now: u64) -> bool {
        let window = window_index(now, self.quota.window_ms());
        let limit = self.quota.limit();

        match self.counters.entry(WindowKey {
            key: key.to_owned(),
            window,
        }) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= limit {
                    tracing::trace!(algorithm = self.name(), key, window, "limit reached");
                    return false;
                }
                *entry.get_mut() += 1;
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(1);
                true
            }
        }
    }
}

impl<C> fmt::Debug for FixedWindow<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWindow")
            .field("quota", &self.quota)
            .field("entries", &self.counters.len())
            .finish()
    }
}

impl<C: Clock> Algorithm for FixedWindow<C> {
    fn name(&self) -> &'static str {
        "fixed_window"
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
        self.counters.retain(|entry, _| {
            let keep = !window_expired(entry.window, current);
            if !keep {
                evicted += 1;
            }
            keep
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
