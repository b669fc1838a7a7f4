//! Token Bucket rate limiting algorithm.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::gc::{GcInterval, GcState};
use crate::quota::BucketQuota;

/// One key's bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bucket {
    tokens: u64,
    last_refilled: u64,
    /// Set when a sweep has removed this bucket from the map.
    retired: bool,
}

impl Bucket {
    fn full(quota: &BucketQuota, now: u64) -> Self {
        Self {
            tokens: quota.capacity(),
            last_refilled: now,
            retired: false,
        }
    }

    /// Credit the whole tokens earned since `last_refilled`.
    ///
    /// Tokens round down and the time spent on them rounds up, so partial
    /// progress toward the next token carries over and the bucket never
    /// over-refills. A full bucket restarts its clock at `now`.
    ///
    /// Resetting the clock to `now` on every refill would drop that partial
    /// progress: at one token per second, waits of 1.5 s and then 0.5 s earn
    /// two tokens here but only one that way.
    fn refill(&mut self, now: u64, quota: &BucketQuota) {
        let rate = quota.refill_rate();
        if rate == 0 || now <= self.last_refilled {
            return;
        }

        let elapsed = now - self.last_refilled;
        let earned = u128::from(elapsed) * u128::from(rate) / 1000;
        if earned == 0 {
            return;
        }

        let missing = quota.capacity() - self.tokens;
        if earned >= u128::from(missing) {
            self.tokens = quota.capacity();
            self.last_refilled = now;
        } else {
            // earned < missing, so it fits in u64; paid <= elapsed
            let paid = (earned * 1000).div_ceil(u128::from(rate)) as u64;
            self.tokens += earned as u64;
            self.last_refilled += paid;
        }
    }

    fn try_take(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Whether the next decision would find this bucket indistinguishable
    /// from a freshly created one.
    fn is_idle(&self, now: u64, quota: &BucketQuota) -> bool {
        if quota.refill_rate() == 0 {
            return self.tokens == quota.capacity();
        }
        let mut refilled = self.clone();
        refilled.refill(now, quota);
        refilled.tokens == quota.capacity() && refilled.last_refilled == now
    }
}

/// Token Bucket rate limiting algorithm.
///
/// Allows bursts of up to `capacity` requests while enforcing an average rate
/// of `refill_rate` requests per second. Every key owns an independent bucket
/// that starts full.
///
/// The map lock only guards finding or creating a bucket; refilling and
/// taking a token happen under the bucket's own mutex, so decisions for
/// different keys never wait on each other once their buckets exist.
pub struct TokenBucket<C = SystemClock> {
    quota: BucketQuota,
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
    gc: GcState,
    clock: C,
}

impl TokenBucket {
    /// Create a new Token Bucket limiter on the system clock.
    pub fn new(quota: BucketQuota) -> Self {
        Self::with_clock(quota, SystemClock::new())
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a new Token Bucket limiter reading time from `clock`.
    pub fn with_clock(quota: BucketQuota, clock: C) -> Self {
        Self {
            quota,
            buckets: DashMap::new(),
            gc: GcState::default(),
            clock,
        }
    }

    /// Set when the limiter sweeps idle buckets.
    pub fn with_gc(mut self, interval: GcInterval) -> Self {
        self.gc = GcState::new(interval);
        self
    }

    /// The configured bucket quota.
    pub fn quota(&self) -> &BucketQuota {
        &self.quota
    }

    /// Find the key's bucket, creating a full one on first use.
    fn bucket(&self, key: &str) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let bucket = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(&self.quota, self.clock.now_ms()))));
        Arc::clone(bucket.value())
    }

    fn decide(&self, key: &str) -> bool {
        loop {
            let bucket = self.bucket(key);
            let mut state = bucket.lock();
            if state.retired {
                // A sweep evicted it between lookup and lock; look again
                continue;
            }

            state.refill(self.clock.now_ms(), &self.quota);
            let allowed = state.try_take();
            if !allowed {
                tracing::trace!(algorithm = self.name(), key, "bucket empty");
            }
            return allowed;
        }
    }
}

impl<C> fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("quota", &self.quota)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl<C: Clock> Algorithm for TokenBucket<C> {
    fn name(&self) -> &'static str {
        "token_bucket"
    }

    fn allow(&self, key: &str) -> bool {
        let allowed = self.decide(key);
        if self.gc.record_request() {
            self.sweep();
        }
        allowed
    }

    fn sweep(&self) -> usize {
        let Some(_guard) = self.gc.try_begin() else {
            return 0;
        };

        let now = self.clock.now_ms();
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let mut state = bucket.lock();
            if state.is_idle(now, &self.quota) {
                state.retired = true;
                evicted += 1;
                false
            } else {
                true
            }
        });

        tracing::debug!(
            algorithm = self.name(),
            evicted,
            remaining = self.buckets.len(),
            "sweep finished"
        );
        evicted
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}
