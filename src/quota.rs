//! Quota configuration for rate limiting.
//!
//! A [`Quota`] bounds how many requests a key may make over a window and
//! parameterises the three windowed engines. A [`BucketQuota`] describes a
//! token bucket: its capacity and how many tokens flow back per second.
//!
//! # Examples
//!
//! ```
//! use ratewarden::{BucketQuota, Quota};
//! use std::time::Duration;
//!
//! // 100 requests per minute
//! let quota = Quota::per_minute(100);
//!
//! // Custom: 50 requests per 30 seconds
//! let quota = Quota::new(50, Duration::from_secs(30));
//!
//! // Bursts of 5, one token back every second
//! let bucket = BucketQuota::new(5, 1);
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::error::{ConfigError, Result};

/// Request quota for the windowed engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Maximum number of requests in the window.
    limit: u64,

    /// Time window duration.
    window: Duration,
}

impl Quota {
    /// Create a new quota with the given request limit and window.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0 or `window` is shorter than one millisecond.
    pub fn new(limit: u64, window: Duration) -> Self {
        assert!(limit > 0, "limit must be greater than 0");
        assert!(window.as_millis() > 0, "window must be at least 1ms");

        Self { limit, window }
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Create a quota allowing `n` requests per hour.
    pub fn per_hour(n: u64) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// Try to create a new quota, returning an error if invalid.
    pub fn try_new(limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidQuota("limit must be greater than 0".into()).into());
        }
        if window.as_millis() == 0 {
            return Err(ConfigError::InvalidQuota("window must be at least 1ms".into()).into());
        }
        Ok(Self { limit, window })
    }

    /// Maximum requests allowed per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The window length in whole milliseconds. Always at least 1.
    pub fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketQuota {
    /// Maximum burst: the number of tokens a full bucket holds.
    capacity: u64,

    /// Tokens added back per elapsed second. Zero disables refilling.
    refill_rate: u64,
}

impl BucketQuota {
    /// Create a new bucket quota.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");

        Self {
            capacity,
            refill_rate,
        }
    }

    /// Try to create a bucket quota, returning an error if invalid.
    pub fn try_new(capacity: u64, refill_rate: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidQuota("capacity must be greater than 0".into()).into());
        }
        Ok(Self {
            capacity,
            refill_rate,
        })
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens per second.
    pub fn refill_rate(&self) -> u64 {
        self.refill_rate
    }
}

/// Builder for creating quotas with validation.
#[derive(Debug, Default)]
pub struct QuotaBuilder {
    limit: Option<u64>,
    window: Option<Duration>,
}

impl QuotaBuilder {
    /// Create a new quota builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum requests per window.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set the window duration.
    pub fn window(mut self, duration: Duration) -> Self {
        self.window = Some(duration);
        self
    }

    /// Build the quota, returning an error if invalid.
    pub fn build(self) -> Result<Quota> {
        let limit = self
            .limit
            .ok_or_else(|| ConfigError::MissingRequired("limit".into()))?;
        let window = self
            .window
            .ok_or_else(|| ConfigError::MissingRequired("window".into()))?;

        Quota::try_new(limit, window)
    }
}
