use std::future::Future;
use std::pin::Pin;

use super::context::RequestContext;
use super::response::Response;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Response, BoxError>> + Send>>;

/// A user-supplied request handler.
///
/// The context is passed by value: a handler cannot retain it past its own
/// completion. Returning an error produces a 500 for the client; the error
/// itself is logged with the request id, never exposed.
///
/// Handlers run on the connection's worker and are expected to be
/// non-blocking; long work belongs on an application-provided executor.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Response, BoxError>> + Send + 'static,
{
    fn handle(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin((self)(ctx))
    }
}
