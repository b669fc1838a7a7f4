//! HTTP server admitting at most a burst of 5 requests per client address,
//! refilled at one request per second.
//!
//! Run with:
//! ```
//! cargo run --example server --features axum
//! ```
//!
//! Then hit it faster than once a second:
//! ```
//! for i in $(seq 1 8); do curl -s localhost:8080/; done
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use ratewarden::key::IpKey;
use ratewarden::middleware::AdmissionLayer;
use ratewarden::{BucketQuota, GcInterval, Sweeper, TokenBucket};
use tracing_subscriber::EnvFilter;

async fn handler() -> &'static str {
    "Request allowed!"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ratewarden=debug")),
        )
        .init();

    let limiter = Arc::new(TokenBucket::new(BucketQuota::new(5, 1)).with_gc(GcInterval::Manual));
    let sweeper = Sweeper::spawn(limiter.clone(), Duration::from_secs(60));

    let app = Router::new()
        .route("/", get(handler))
        .layer(AdmissionLayer::from_shared(limiter, IpKey::new()));

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    sweeper.shutdown().await;
    Ok(())
}
