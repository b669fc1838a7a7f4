//! Axum middleware for rate limiting.
//!
//! Provides a Tower-compatible layer that consults an [`Algorithm`](crate::Algorithm)
//! once per request and answers `429 Too Many Requests` on rejection.
//!
//! # Example
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use axum::{Router, routing::get};
//! use ratewarden::{BucketQuota, TokenBucket, key::IpKey, middleware::AdmissionLayer};
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(AdmissionLayer::new(TokenBucket::new(BucketQuota::new(5, 1)), IpKey::new()));
//!
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

mod layer;

pub use layer::{AdmissionLayer, AdmissionService, rejection_response};
