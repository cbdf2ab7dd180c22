use http::{Method, StatusCode, Version};
use hyper::body::Incoming;
use hyper::Request;
use opentelemetry::KeyValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::conn::ConnectionInfo;
use super::context::ServerContext;
use crate::http::response::RespBody;
use crate::http::{RequestContext, Response};
use crate::router::RouteMatch;
use crate::security::Admission;

/// The unified request pipeline, shared by HTTP/1.1 connections and HTTP/2
/// streams: firewall inspection, CORS preflight, rate-limit admission,
/// routing, handler invocation, CORS response headers, status metering.
pub(crate) async fn dispatch(
    req: Request<Incoming>,
    ctx: Arc<ServerContext>,
    conn: Arc<ConnectionInfo>,
    cancel: CancellationToken,
    close: CancellationToken,
) -> hyper::Response<RespBody> {
    ctx.metrics.requests_total.add(1, &[]);
    ctx.firewall.inspect(&req);

    // Preflight is answered before rate-limit accounting so a burst of
    // preflights cannot starve a client's real requests. Connection and IP
    // admission already happened at accept time.
    if let Some(policy) = &ctx.cors {
        if let Some(response) = policy.preflight(&req) {
            return finish(&ctx, response);
        }
    }

    if let Some(limiter) = &ctx.rate_limiter {
        match limiter.check(conn.peer.ip()) {
            Admission::Granted => {}
            Admission::SoftLimited => {
                debug!(conn = conn.id, peer = %conn.peer, "rate limited");
                return finish(&ctx, too_many_requests(req.version(), false));
            }
            Admission::HardLimited => {
                debug!(conn = conn.id, peer = %conn.peer, "rate limited, closing connection");
                // The connection finishes writing this response, then closes.
                close.cancel();
                return finish(&ctx, too_many_requests(req.version(), true));
            }
        }
    }

    let (parts, body) = req.into_parts();
    let routes = ctx.routes.load_full();
    let response = match routes.lookup(&parts.method, parts.uri.path()) {
        RouteMatch::Found { route, params } => {
            ctx.metrics
                .route_requests_total
                .add(1, &[KeyValue::new("route", route.name.clone())]);
            let request_id = ctx.next_request_id();
            let handler = Arc::clone(&route.handler);
            let request_ctx = RequestContext::new(
                parts.method,
                parts.uri,
                parts.headers.clone(),
                route.pattern.as_str().to_string(),
                params,
                body,
                conn.peer,
                request_id,
                cancel.child_token(),
                Arc::clone(&ctx),
            );
            match handler.handle(request_ctx).await {
                Ok(response) => response,
                Err(e) => {
                    error!(request_id, conn = conn.id, error = %e, "handler error");
                    Response::text("Internal Server Error")
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
        RouteMatch::MethodNotAllowed { allow } => {
            let allow_value = allow
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Response::new(StatusCode::METHOD_NOT_ALLOWED).header("allow", &allow_value)
        }
        RouteMatch::NotFound => Response::new(StatusCode::NOT_FOUND),
    };

    let response = match &ctx.cors {
        Some(policy) => policy.apply(&parts.headers, response),
        None => response,
    };
    finish(&ctx, response)
}

fn too_many_requests(version: Version, close_connection: bool) -> Response {
    let response = Response::text("Too Many Requests").status(StatusCode::TOO_MANY_REQUESTS);
    // `connection: close` is prohibited on HTTP/2; there the close token
    // alone triggers the GOAWAY.
    if close_connection && version < Version::HTTP_2 {
        response.header("connection", "close")
    } else {
        response
    }
}

/// The single choke point every response passes through on its way to the
/// wire; exactly one status-code meter ticks here per response.
fn finish(ctx: &ServerContext, response: Response) -> hyper::Response<RespBody> {
    ctx.metrics.response_codes.record(response.status_code());
    response.into_hyper()
}
