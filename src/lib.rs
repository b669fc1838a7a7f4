//! In-process admission control for Rust services.
//!
//! `ratewarden` answers one question per request: may this key proceed? It
//! provides:
//!
//! - **Four Algorithms**: Fixed Window, Sliding Log, Sliding Counter, Token Bucket
//! - **Sharded State**: per-key state in `DashMap`, no global lock on the hot path
//! - **Bounded Memory**: single-flight sweeps evict keys that went idle
//! - **Framework Integration**: Axum/Tower middleware answering `429`
//!
//! # Quick Start
//!
//! ```
//! use ratewarden::{Algorithm, BucketQuota, TokenBucket};
//!
//! // Bursts of 5, one token back per second
//! let limiter = TokenBucket::new(BucketQuota::new(5, 1));
//!
//! for _ in 0..5 {
//!     assert!(limiter.allow("198.51.100.4"));
//! }
//! assert!(!limiter.allow("198.51.100.4"));
//! ```
//!
//! # Algorithms
//!
//! | Algorithm | Best For | Memory |
//! |-----------|----------|--------|
//! | Fixed Window | Simple use cases | Low |
//! | Sliding Log | Precision critical | High |
//! | Sliding Counter | General purpose | Low |
//! | Token Bucket | Bursty traffic | Low |
//!
//! # Limitations
//!
//! - State lives in one process and is lost on restart.
//! - There is no cap on distinct keys. A flood of never-repeating keys grows
//!   memory until sweeps catch up with it.
//! - With the default [`SystemClock`], engine time cannot run backwards, but
//!   a custom [`Clock`] that does will under-refill buckets and may reuse
//!   window indices.
//!
//! # Feature Flags
//!
//! - `axum`: Axum middleware integration

pub mod algorithm;
pub mod clock;
pub mod error;
pub mod gc;
pub mod key;
pub mod limiter;
pub mod quota;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-export main types
pub use algorithm::{Algorithm, FixedWindow, SlidingCounter, SlidingLog, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, RateLimitError, Result};
pub use gc::{GcInterval, Sweeper};
pub use key::{ExtractKey, FnKey, GlobalKey};
pub use limiter::{Limiter, LimiterConfig};
pub use quota::{BucketQuota, Quota, QuotaBuilder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algorithm::{Algorithm, FixedWindow, SlidingCounter, SlidingLog, TokenBucket};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::gc::{GcInterval, Sweeper};
    pub use crate::limiter::{Limiter, LimiterConfig};
    pub use crate::quota::{BucketQuota, Quota};
}
