use ahash::AHashMap;
use bytes::Bytes;
use http::header::HeaderMap;
use http::{Method, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::handler::BoxError;
use crate::server::ServerContext;

/// Per-request state handed to a handler.
///
/// Constructed once routing succeeds, dropped after the response is fully
/// written. Carries the captured path parameters and a read-only reference
/// to the process-wide server context.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: String,
    params: AHashMap<String, String>,
    body: Option<Incoming>,
    peer: SocketAddr,
    request_id: u64,
    cancel: CancellationToken,
    server: Arc<ServerContext>,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        route: String,
        params: AHashMap<String, String>,
        body: Incoming,
        peer: SocketAddr,
        request_id: u64,
        cancel: CancellationToken,
        server: Arc<ServerContext>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            route,
            params,
            body: Some(body),
            peer,
            request_id,
            cancel,
            server,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The route pattern this request resolved to, e.g. `/users/{id}`.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// A captured path parameter, e.g. `id` for the pattern `/users/{id}`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &AHashMap<String, String> {
        &self.params
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn server(&self) -> &Arc<ServerContext> {
        &self.server
    }

    /// Collect the request body. Consumes the stream; a second call fails.
    pub async fn body_bytes(&mut self) -> std::result::Result<Bytes, BoxError> {
        let body = self
            .body
            .take()
            .ok_or_else(|| BoxError::from("request body already consumed"))?;
        Ok(body.collect().await?.to_bytes())
    }

    /// Completes when the connection closes mid-request. Handlers should
    /// observe this at their next suspension point and abandon work; the
    /// server never force-terminates a handler.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
