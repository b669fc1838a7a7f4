//! Rate limiting algorithm trait and implementations.
//!
//! This module defines the [`Algorithm`] trait, the single admission contract,
//! and the four engines that satisfy it.
//!
//! # Available Algorithms
//!
//! - **Fixed Window**: counter per aligned time window
//! - **Sliding Log**: exact, stores one timestamp per admitted request
//! - **Sliding Counter**: weighted previous + current window counters
//! - **Token Bucket**: controlled bursts with refilling tokens
//!
//! Every engine owns its per-key state in a sharded [`dashmap::DashMap`].
//! Decisions for keys in different shards never contend; decisions for one
//! key are serialized by that key's shard lock (or, for the token bucket, by
//! the bucket's own mutex).

mod fixed_window;
mod sliding_counter;
mod sliding_log;
mod token_bucket;

pub use fixed_window::FixedWindow;
pub use sliding_counter::{SlidingCounter, estimate};
pub use sliding_log::SlidingLog;
pub use token_bucket::TokenBucket;

use std::sync::Arc;

/// Rate limiting algorithm trait.
///
/// Each algorithm provides different trade-offs between accuracy, memory usage,
/// and burst handling. All implementations are safe to call concurrently from
/// any number of threads for any mix of keys.
///
/// # Algorithm Comparison
///
/// | Algorithm | Accuracy | Memory per key | Burst | Best For |
/// |-----------|----------|----------------|-------|----------|
/// | Fixed Window | Low | 1 counter | Up to 2x limit at edges | Simple use cases |
/// | Sliding Log | Exact | Up to `limit` timestamps | Good | Precision critical |
/// | Sliding Counter | Approximate | 2 counters | Good | General purpose |
/// | Token Bucket | High | 1 bucket | Up to capacity | Bursty traffic |
pub trait Algorithm: Send + Sync + 'static {
    /// Get the algorithm name (for logging).
    fn name(&self) -> &'static str;

    /// Decide whether a request for `key` is admitted.
    ///
    /// Admission records the request against the key. A rejection leaves the
    /// key's recorded usage unchanged.
    fn allow(&self, key: &str) -> bool;

    /// Evict state for keys that can no longer influence a decision.
    ///
    /// Returns the number of evicted entries. If another sweep of the same
    /// engine is in progress this returns 0 without doing anything.
    fn sweep(&self) -> usize;

    /// Number of state entries currently held.
    fn len(&self) -> usize;

    /// Whether no state is held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: Algorithm + ?Sized> Algorithm for Arc<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn allow(&self, key: &str) -> bool {
        (**self).allow(key)
    }

    fn sweep(&self) -> usize {
        (**self).sweep()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<A: Algorithm + ?Sized> Algorithm for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn allow(&self, key: &str) -> bool {
        (**self).allow(key)
    }

    fn sweep(&self) -> usize {
        (**self).sweep()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Index of the aligned window containing `now_ms`.
pub(crate) fn window_index(now_ms: u64, window_ms: u64) -> u64 {
    now_ms / window_ms
}

/// Whether an aligned window is more than one window behind `current`.
pub(crate) fn window_expired(index: u64, current: u64) -> bool {
    current.saturating_sub(index) > 1
}
