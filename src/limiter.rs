//! Selecting an engine at construction time.
//!
//! [`LimiterConfig`] is the configuration surface: one variant per engine,
//! deserializable from JSON. [`LimiterConfig::build`] validates it and
//! produces a [`Limiter`], a closed set of the four engines that is itself an
//! [`Algorithm`].
//!
//! ```
//! use ratewarden::{Algorithm, LimiterConfig};
//!
//! let config = LimiterConfig::from_json(
//!     r#"{"algorithm": "token_bucket", "capacity": 5, "refill_rate": 1}"#,
//! ).unwrap();
//! let limiter = config.build().unwrap();
//!
//! assert_eq!(limiter.name(), "token_bucket");
//! assert!(limiter.allow("203.0.113.7"));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, FixedWindow, SlidingCounter, SlidingLog, TokenBucket};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::gc::GcInterval;
use crate::quota::{BucketQuota, Quota};

/// Engine parameters, tagged by `algorithm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    /// Counter per aligned window.
    FixedWindow {
        limit: u64,
        window_ms: u64,
        #[serde(default)]
        gc: GcInterval,
    },
    /// Exact log of admitted timestamps.
    SlidingLog {
        limit: u64,
        window_ms: u64,
        #[serde(default)]
        gc: GcInterval,
    },
    /// Weighted previous and current window counters.
    SlidingCounter {
        limit: u64,
        window_ms: u64,
        #[serde(default)]
        gc: GcInterval,
    },
    /// Refilling bucket per key.
    TokenBucket {
        capacity: u64,
        refill_rate: u64,
        #[serde(default)]
        gc: GcInterval,
    },
}

impl LimiterConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and build the configured engine on the system clock.
    pub fn build(&self) -> Result<Limiter> {
        self.build_with_clock(SystemClock::new())
    }

    /// Validate and build the configured engine reading time from `clock`.
    pub fn build_with_clock<C: Clock>(&self, clock: C) -> Result<Limiter<C>> {
        let limiter = match *self {
            Self::FixedWindow { limit, window_ms, gc } => {
                let quota = Quota::try_new(limit, Duration::from_millis(window_ms))?;
                Limiter::FixedWindow(FixedWindow::with_clock(quota, clock).with_gc(gc))
            }
            Self::SlidingLog { limit, window_ms, gc } => {
                let quota = Quota::try_new(limit, Duration::from_millis(window_ms))?;
                Limiter::SlidingLog(SlidingLog::with_clock(quota, clock).with_gc(gc))
            }
            Self::SlidingCounter { limit, window_ms, gc } => {
                let quota = Quota::try_new(limit, Duration::from_millis(window_ms))?;
                Limiter::SlidingCounter(SlidingCounter::with_clock(quota, clock).with_gc(gc))
            }
            Self::TokenBucket {
                capacity,
                refill_rate,
                gc,
            } => {
                let quota = BucketQuota::try_new(capacity, refill_rate)?;
                Limiter::TokenBucket(TokenBucket::with_clock(quota, clock).with_gc(gc))
            }
        };

        tracing::debug!(algorithm = limiter.name(), "limiter built");
        Ok(limiter)
    }
}

/// One of the four engines, chosen once and never switched.
#[derive(Debug)]
pub enum Limiter<C = SystemClock> {
    FixedWindow(FixedWindow<C>),
    SlidingLog(SlidingLog<C>),
    SlidingCounter(SlidingCounter<C>),
    TokenBucket(TokenBucket<C>),
}

impl<C: Clock> Algorithm for Limiter<C> {
    fn name(&self) -> &'static str {
        match self {
            Self::FixedWindow(inner) => inner.name(),
            Self::SlidingLog(inner) => inner.name(),
            Self::SlidingCounter(inner) => inner.name(),
            Self::TokenBucket(inner) => inner.name(),
        }
    }

    fn allow(&self, key: &str) -> bool {
        match self {
            Self::FixedWindow(inner) => inner.allow(key),
            Self::SlidingLog(inner) => inner.allow(key),
            Self::SlidingCounter(inner) => inner.allow(key),
            Self::TokenBucket(inner) => inner.allow(key),
        }
    }

    fn sweep(&self) -> usize {
        match self {
            Self::FixedWindow(inner) => inner.sweep(),
            Self::SlidingLog(inner) => inner.sweep(),
            Self::SlidingCounter(inner) => inner.sweep(),
            Self::TokenBucket(inner) => inner.sweep(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::FixedWindow(inner) => inner.len(),
            Self::SlidingLog(inner) => inner.len(),
            Self::SlidingCounter(inner) => inner.len(),
            Self::TokenBucket(inner) => inner.len(),
        }
    }
}

impl<C> From<FixedWindow<C>> for Limiter<C> {
    fn from(inner: FixedWindow<C>) -> Self {
        Self::FixedWindow(inner)
    }
}

impl<C> From<SlidingLog<C>> for Limiter<C> {
    fn from(inner: SlidingLog<C>) -> Self {
        Self::SlidingLog(inner)
    }
}

impl<C> From<SlidingCounter<C>> for Limiter<C> {
    fn from(inner: SlidingCounter<C>) -> Self {
        Self::SlidingCounter(inner)
    }
}

impl<C> From<TokenBucket<C>> for Limiter<C> {
    fn from(inner: TokenBucket<C>) -> Self {
        Self::TokenBucket(inner)
    }
}
