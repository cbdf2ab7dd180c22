use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Incoming;
use hyper::server::conn::{http1, http2};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::context::ServerContext;
use super::dispatch::dispatch;
use crate::http::response::RespBody;
use crate::security::ConnectionPermit;
use crate::telemetry::Metrics;

/// Negotiated application protocol for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

/// TLS session summary recorded at handshake time.
#[derive(Debug, Clone)]
pub struct TlsInfo {
    pub alpn: Option<String>,
    pub version: Option<String>,
    pub cipher: Option<String>,
}

/// Immutable record of an accepted connection.
#[derive(Debug)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: SocketAddr,
    pub protocol: Protocol,
    pub tls: Option<TlsInfo>,
    pub accepted_at: Instant,
}

/// Decrements the active-connection gauge when the connection task ends.
struct ActiveGuard {
    metrics: Metrics,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.metrics.connections_active.add(-1, &[]);
    }
}

type ServiceFuture = Pin<
    Box<dyn Future<Output = std::result::Result<hyper::Response<RespBody>, hyper::Error>> + Send>,
>;

fn make_service(
    ctx: Arc<ServerContext>,
    info: Arc<ConnectionInfo>,
    cancel: CancellationToken,
    close: CancellationToken,
) -> impl hyper::service::Service<
    Request<Incoming>,
    Response = hyper::Response<RespBody>,
    Error = hyper::Error,
    Future = ServiceFuture,
> {
    hyper::service::service_fn(move |req: Request<Incoming>| -> ServiceFuture {
        let ctx = Arc::clone(&ctx);
        let info = Arc::clone(&info);
        let cancel = cancel.clone();
        let close = close.clone();
        Box::pin(async move { Ok(dispatch(req, ctx, info, cancel, close).await) })
    })
}

fn record_serve_error(ctx: &ServerContext, conn_id: u64, peer: SocketAddr, error: &hyper::Error) {
    if error.is_parse() || error.is_parse_too_large() || error.is_parse_status() {
        // hyper already answered with a protocol-appropriate error (400 for
        // HTTP/1, GOAWAY for HTTP/2); we only count the event.
        ctx.firewall.record_malformed_frame();
        warn!(conn = conn_id, peer = %peer, error = %error, "protocol error");
    } else if error.is_incomplete_message() {
        debug!(conn = conn_id, peer = %peer, "connection closed mid-message");
    } else {
        warn!(conn = conn_id, peer = %peer, error = %error, "serve_connection error");
    }
}

/// Handle one accepted connection end to end: TLS handshake, protocol
/// selection, request serving, graceful or forced close.
///
/// All I/O and handler invocations for the connection happen inside this
/// task; no other task touches its state.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
    acceptor: Option<TlsAcceptor>,
    allow_h2c: bool,
    mut shutdown_rx: watch::Receiver<bool>,
    force_close: CancellationToken,
    permit: ConnectionPermit,
) {
    // Released exactly once, whatever path this task takes out.
    let _permit = permit;
    let _active = ActiveGuard { metrics: ctx.metrics.clone() };

    // Cancelled when this task ends, so request contexts observe the close.
    let cancel = CancellationToken::new();
    let _cancel_guard = cancel.clone().drop_guard();
    // Cancelled by the pipeline to hard-close the connection (rate limiter).
    let close = CancellationToken::new();

    let id = ctx.next_connection_id();

    match acceptor {
        Some(acceptor) => {
            let tls = tokio::select! {
                accepted = acceptor.accept(stream) => match accepted {
                    Ok(tls) => tls,
                    Err(e) => {
                        ctx.metrics.tls_handshake_errors_total.add(1, &[]);
                        warn!(conn = id, peer = %peer, error = %e, "tls handshake failed");
                        return;
                    }
                },
                _ = force_close.cancelled() => return,
            };

            let info = {
                let (_, session) = tls.get_ref();
                let alpn = session
                    .alpn_protocol()
                    .map(|proto| String::from_utf8_lossy(proto).into_owned());
                let protocol = if alpn.as_deref() == Some("h2") {
                    Protocol::Http2
                } else {
                    Protocol::Http1
                };
                Arc::new(ConnectionInfo {
                    id,
                    peer,
                    protocol,
                    tls: Some(TlsInfo {
                        alpn,
                        version: session.protocol_version().map(|v| format!("{v:?}")),
                        cipher: session
                            .negotiated_cipher_suite()
                            .map(|suite| format!("{:?}", suite.suite())),
                    }),
                    accepted_at: Instant::now(),
                })
            };
            debug!(conn = id, peer = %peer, protocol = ?info.protocol, "connection established");

            let protocol = info.protocol;
            let svc = make_service(Arc::clone(&ctx), info, cancel.clone(), close.clone());

            match protocol {
                Protocol::Http2 => {
                    let conn = http2::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(tls), svc);
                    tokio::pin!(conn);
                    let mut draining = false;
                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    record_serve_error(&ctx, id, peer, &e);
                                }
                                break;
                            }
                            _ = shutdown_rx.wait_for(|flag| *flag), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                            _ = close.cancelled(), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                            _ = force_close.cancelled() => break,
                        }
                    }
                }
                Protocol::Http1 => {
                    let conn =
                        http1::Builder::new().serve_connection(TokioIo::new(tls), svc);
                    tokio::pin!(conn);
                    let mut draining = false;
                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    record_serve_error(&ctx, id, peer, &e);
                                }
                                break;
                            }
                            _ = shutdown_rx.wait_for(|flag| *flag), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                            _ = close.cancelled(), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                            _ = force_close.cancelled() => break,
                        }
                    }
                }
            }
        }
        None => {
            let info = Arc::new(ConnectionInfo {
                id,
                peer,
                protocol: Protocol::Http1,
                tls: None,
                accepted_at: Instant::now(),
            });
            debug!(conn = id, peer = %peer, "plaintext connection established");
            let svc = make_service(Arc::clone(&ctx), info, cancel.clone(), close.clone());

            if allow_h2c {
                // The auto builder sniffs the cleartext HTTP/2 preface and
                // falls back to HTTP/1.1 otherwise.
                let builder = auto::Builder::new(TokioExecutor::new());
                let conn = builder.serve_connection(TokioIo::new(stream), svc);
                tokio::pin!(conn);
                let mut draining = false;
                loop {
                    tokio::select! {
                        result = conn.as_mut() => {
                            if let Err(e) = result {
                                match e.downcast_ref::<hyper::Error>() {
                                    Some(hyper_error) => record_serve_error(&ctx, id, peer, hyper_error),
                                    None => warn!(conn = id, peer = %peer, error = %e, "serve_connection error"),
                                }
                            }
                            break;
                        }
                        _ = shutdown_rx.wait_for(|flag| *flag), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                        _ = close.cancelled(), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                        _ = force_close.cancelled() => break,
                    }
                }
            } else {
                // A cleartext HTTP/2 preface fails HTTP/1.1 parsing here and
                // is counted as a malformed frame.
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
                tokio::pin!(conn);
                let mut draining = false;
                loop {
                    tokio::select! {
                        result = conn.as_mut() => {
                            if let Err(e) = result {
                                record_serve_error(&ctx, id, peer, &e);
                            }
                            break;
                        }
                        _ = shutdown_rx.wait_for(|flag| *flag), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                        _ = close.cancelled(), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                        _ = force_close.cancelled() => break,
                    }
                }
            }
        }
    }

    debug!(conn = id, peer = %peer, "connection closed");
}
