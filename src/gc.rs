//! Sweeping idle keys out of engine state.
//!
//! Sweeps only bound memory; they never change what a later `allow` call
//! returns. Each engine owns a gate so at most one sweep of that engine runs
//! at a time, and sweeps are triggered in one of two ways:
//!
//! - inline, every N decisions ([`GcInterval::Requests`], the default)
//! - by a host-owned [`Sweeper`] task on a fixed period
//!
//! # Example
//!
//! ```ignore
//! use ratewarden::{FixedWindow, GcInterval, Quota, Sweeper};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let limiter = Arc::new(FixedWindow::new(Quota::per_minute(100)).with_gc(GcInterval::Manual));
//! let sweeper = Sweeper::spawn(limiter.clone(), Duration::from_secs(30));
//! // ...
//! sweeper.shutdown().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::algorithm::Algorithm;

/// When an engine sweeps itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcInterval {
    /// Sweep inline after every N-th decision. `0` never sweeps.
    #[serde(rename = "every_requests")]
    Requests(u64),
    /// Never sweep automatically; call `sweep()` or run a [`Sweeper`].
    Manual,
}

impl Default for GcInterval {
    fn default() -> Self {
        Self::Requests(10_000)
    }
}

impl GcInterval {
    /// Sweep after every `count` decisions.
    pub fn on_requests(count: u64) -> Self {
        Self::Requests(count)
    }

    /// Disable automatic sweeps.
    pub fn manual() -> Self {
        Self::Manual
    }
}

/// Per-engine sweep bookkeeping: the request counter and the single-flight gate.
#[derive(Debug)]
pub(crate) struct GcState {
    interval: GcInterval,
    request_count: AtomicU64,
    running: AtomicBool,
}

impl GcState {
    pub(crate) fn new(interval: GcInterval) -> Self {
        Self {
            interval,
            request_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Count one decision. Returns `true` when an inline sweep is due.
    pub(crate) fn record_request(&self) -> bool {
        match self.interval {
            GcInterval::Requests(threshold) if threshold > 0 => {
                let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
                count % threshold == 0
            }
            _ => false,
        }
    }

    /// Enter the sweep gate, or `None` if a sweep is already in progress.
    pub(crate) fn try_begin(&self) -> Option<SweepGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SweepGuard {
                running: &self.running,
            })
    }
}

impl Default for GcState {
    fn default() -> Self {
        Self::new(GcInterval::default())
    }
}

/// Held for the duration of one sweep; reopens the gate on drop.
pub(crate) struct SweepGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Background task sweeping one engine on a fixed period.
///
/// A sweep walks every shard of the engine's map and holds each shard's lock
/// while doing so, which is blocking work proportional to the number of
/// tracked keys. Each pass therefore runs on tokio's blocking pool, never on
/// an async worker.
///
/// Requires a running tokio runtime. The task stops when the handle is
/// dropped or [`shutdown`](Sweeper::shutdown) is awaited.
#[derive(Debug)]
pub struct Sweeper {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn a sweeper for `algorithm`, sweeping every `period`.
    pub fn spawn<A>(algorithm: Arc<A>, period: Duration) -> Self
    where
        A: Algorithm + ?Sized,
    {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let engine = algorithm.clone();
                        if let Err(err) = tokio::task::spawn_blocking(move || engine.sweep()).await {
                            tracing::warn!(algorithm = algorithm.name(), error = %err, "sweep task failed");
                        }
                    }
                    _ = stop.notified() => {
                        tracing::debug!(algorithm = algorithm.name(), "sweeper stopped");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        // notify_one stores a permit, so a stop requested mid-sweep is not lost
        self.shutdown.notify_one();
    }
}
