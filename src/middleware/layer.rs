//! Tower layer for rate limiting in Axum.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::algorithm::Algorithm;
use crate::key::{ClientRequest, ExtractKey};

/// Tower layer for rate limiting.
pub struct AdmissionLayer<A, K> {
    algorithm: Arc<A>,
    key_extractor: K,
}

impl<A, K> AdmissionLayer<A, K> {
    /// Create a new admission layer.
    pub fn new(algorithm: A, key_extractor: K) -> Self {
        Self::from_shared(Arc::new(algorithm), key_extractor)
    }

    /// Create a layer over an engine the host also holds, e.g. to run a
    /// [`Sweeper`](crate::Sweeper) on it.
    pub fn from_shared(algorithm: Arc<A>, key_extractor: K) -> Self {
        Self {
            algorithm,
            key_extractor,
        }
    }
}

impl<A, K: Clone> Clone for AdmissionLayer<A, K> {
    fn clone(&self) -> Self {
        Self {
            algorithm: self.algorithm.clone(),
            key_extractor: self.key_extractor.clone(),
        }
    }
}

impl<A, K, Inner> Layer<Inner> for AdmissionLayer<A, K>
where
    K: Clone,
{
    type Service = AdmissionService<A, K, Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AdmissionService {
            inner,
            algorithm: self.algorithm.clone(),
            key_extractor: self.key_extractor.clone(),
        }
    }
}

/// The rate limiting service.
pub struct AdmissionService<A, K, Inner> {
    inner: Inner,
    algorithm: Arc<A>,
    key_extractor: K,
}

impl<A, K, Inner> Clone for AdmissionService<A, K, Inner>
where
    K: Clone,
    Inner: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            algorithm: self.algorithm.clone(),
            key_extractor: self.key_extractor.clone(),
        }
    }
}

/// Peer address comes from `ConnectInfo<SocketAddr>`, so serve the router
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
impl<B> ClientRequest for Request<B> {
    fn peer_ip(&self) -> Option<IpAddr> {
        self.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

impl<A, K, Inner, B> Service<Request<B>> for AdmissionService<A, K, Inner>
where
    A: Algorithm,
    K: ExtractKey<Request<B>> + Clone,
    Inner: Service<Request<B>, Response = Response<Body>> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        match self.key_extractor.extract_key(&request) {
            Some(key) if !self.algorithm.allow(&key) => {
                tracing::debug!(
                    key = %key,
                    algorithm = self.algorithm.name(),
                    "request rejected"
                );
                return Box::pin(async { Ok::<_, Inner::Error>(rejection_response()) });
            }
            Some(_) => {}
            None => {
                tracing::debug!(
                    extractor = self.key_extractor.label(),
                    "no rate limit key, forwarding request"
                );
            }
        }

        // Call the instance that was polled ready, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(request).await })
    }
}

/// The response sent for a rejected request: `429 Too Many Requests`.
pub fn rejection_response() -> Response<Body> {
    let mut response = Response::new(Body::from("Too Many Requests\n"));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
