//! Deriving the rate-limit key for a request.
//!
//! Engines treat a key as an opaque string and never look inside it. What
//! they do rely on is that one logical caller always maps to the same string:
//! two requests from the same client address (or carrying the same API token)
//! must produce equal keys, or the caller gets a fresh budget per request.
//!
//! [`ExtractKey`] is that mapping. A request it cannot key is let through
//! without consulting any engine.
//!
//! ```
//! use ratewarden::key::{ExtractKey, FnKey};
//!
//! struct Job {
//!     tenant: &'static str,
//! }
//!
//! let by_tenant = FnKey::new("tenant", |job: &Job| Some(job.tenant.to_owned()));
//! assert_eq!(by_tenant.extract_key(&Job { tenant: "acme" }).as_deref(), Some("acme"));
//! ```

mod client;

pub use client::{ClientRequest, HeaderKey, IpKey, ProxyHeader};

/// Maps a request of type `R` to the key its admission is decided under.
pub trait ExtractKey<R>: Send + Sync + 'static {
    /// The key for `request`, or `None` when it has none.
    fn extract_key(&self, request: &R) -> Option<String>;

    /// Short label for log lines.
    fn label(&self) -> &'static str;
}

/// Puts every request under the single key `"global"`, so the whole service
/// shares one budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalKey;

impl GlobalKey {
    pub fn new() -> Self {
        Self
    }
}

impl<R> ExtractKey<R> for GlobalKey {
    fn extract_key(&self, _request: &R) -> Option<String> {
        Some("global".to_owned())
    }

    fn label(&self) -> &'static str {
        "global"
    }
}

/// An `ExtractKey(request) -> string` written as a closure.
///
/// Use it for keys the built-in extractors do not cover, such as a user ID
/// pulled out of a session.
#[derive(Clone)]
pub struct FnKey<F> {
    label: &'static str,
    f: F,
}

impl<F> FnKey<F> {
    pub fn new(label: &'static str, f: F) -> Self {
        Self { label, f }
    }
}

impl<F> std::fmt::Debug for FnKey<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FnKey").field(&self.label).finish()
    }
}

impl<R, F> ExtractKey<R> for FnKey<F>
where
    F: Fn(&R) -> Option<String> + Send + Sync + 'static,
{
    fn extract_key(&self, request: &R) -> Option<String> {
        (self.f)(request)
    }

    fn label(&self) -> &'static str {
        self.label
    }
}
