mod admin;
pub mod conn;
mod context;
mod dispatch;
mod lifecycle;

pub use conn::{ConnectionInfo, Protocol, TlsInfo};
pub use context::{ServerContext, ServiceInfo};
pub use lifecycle::{Lifecycle, LifecycleState, ShutdownKind};

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{self, Config, HealthConfig, IpFilterConfig};
use crate::error::{Result, ServerError};
use crate::http::CorsPolicy;
use crate::router::RouteTableBuilder;
use crate::security::{is_ip_allowed, ConnectionLimiter, Firewall, RateLimiter};
use crate::telemetry::{self, HealthCheck, HealthRegistry, HealthStatus};
use crate::tls::build_tls_acceptor;

/// Assembles a server: configuration, route registrations, health checks.
///
/// Binding consumes the builder, which is what freezes the route table:
/// there is no way to register a route once `bind` has returned.
pub struct ServerBuilder {
    config: Config,
    routes: RouteTableBuilder,
    health: HealthRegistry,
}

impl ServerBuilder {
    pub fn new(config: Config) -> Self {
        Self { config, routes: RouteTableBuilder::new(), health: HealthRegistry::new() }
    }

    pub fn routes(&mut self) -> &mut RouteTableBuilder {
        &mut self.routes
    }

    pub fn register_health_check(&mut self, check: impl HealthCheck) {
        self.health.register(check);
    }

    /// Built → Binding: validate the configuration, compile and publish the
    /// route table, build the server context, bind the listener.
    pub async fn bind(self) -> Result<Server> {
        let ServerBuilder { config, mut routes, health } = self;
        config::validate(&config)?;

        let (metrics, registry) = telemetry::init_metrics()?;
        let firewall = Firewall::new(metrics.meter(), &config.security.firewall);

        if config.admin.enabled {
            admin::register_admin_routes(&mut routes)?;
        }
        let table = routes.compile();
        info!(routes = table.route_count(), "route table compiled");

        let cors = config.cors.as_ref().map(CorsPolicy::from_config).transpose()?;
        let rate_limiter = if config.security.rate_limit.enabled {
            Some(RateLimiter::new(&config.security.rate_limit))
        } else {
            None
        };

        let service_info = ServiceInfo {
            name: config.service_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            commit: config
                .build_commit
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        };

        let ctx = Arc::new(ServerContext::new(
            service_info,
            metrics,
            registry,
            table,
            health,
            config.health.clone(),
            cors,
            firewall,
            rate_limiter,
        ));
        ctx.lifecycle.transition(LifecycleState::Binding);

        let acceptor = config.tls.as_ref().map(build_tls_acceptor).transpose()?;
        let limiter = Arc::new(ConnectionLimiter::new(config.security.max_connections));

        let listener = bind_listener(config.listen)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr: config.listen, source })?;
        info!(addr = %local_addr, tls = acceptor.is_some(), "listener bound");

        Ok(Server {
            config,
            ctx,
            listener: Some(listener),
            local_addr,
            acceptor,
            limiter,
        })
    }
}

/// A bound server, ready to serve.
pub struct Server {
    config: Config,
    ctx: Arc<ServerContext>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    limiter: Arc<ConnectionLimiter>,
}

impl Server {
    /// The actually-bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle { ctx: Arc::clone(&self.ctx) }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Serve until `Stopped`. Called exactly once from the controlling task;
    /// a restart request drains and re-enters `Binding` on the same address
    /// internally.
    pub async fn serve(mut self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        telemetry::reporters::spawn_reporters(&self.ctx, &self.config.telemetry);
        if self.config.health.background_checks {
            spawn_background_health(Arc::clone(&self.ctx), self.config.health.clone());
        }

        loop {
            let listener = match self.listener.take() {
                Some(listener) => listener,
                None => {
                    self.ctx.lifecycle.transition(LifecycleState::Binding);
                    bind_listener(self.local_addr)?
                }
            };
            self.ctx.lifecycle.transition(LifecycleState::Serving);
            info!(addr = %self.local_addr, "serving");

            let force_close = CancellationToken::new();
            let kind = self
                .accept_until_shutdown(listener, shutdown_rx.clone(), force_close.clone())
                .await;

            self.ctx.lifecycle.transition(LifecycleState::Draining);
            let _ = shutdown_tx.send(true);
            self.drain(&force_close).await;

            match kind {
                ShutdownKind::Restart => {
                    // A stop request that arrived during the drain supersedes
                    // the restart.
                    let upgraded = *self.ctx.lifecycle.subscribe_shutdown().borrow();
                    if upgraded == Some(ShutdownKind::Stop) {
                        break;
                    }
                    info!("drain complete, restarting listener");
                    let _ = shutdown_tx.send(false);
                    self.ctx.lifecycle.reset_shutdown();
                }
                ShutdownKind::Stop => break,
            }
        }

        self.ctx.lifecycle.transition(LifecycleState::Stopped);
        info!("server stopped");
        Ok(())
    }

    async fn accept_until_shutdown(
        &self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
        force_close: CancellationToken,
    ) -> ShutdownKind {
        let listener = Arc::new(listener);
        let stop_accepting = CancellationToken::new();

        let mut acceptors = Vec::new();
        for index in 0..self.config.runtime.acceptor_threads.max(1) {
            acceptors.push(tokio::spawn(accept_loop(
                Arc::clone(&listener),
                Arc::clone(&self.ctx),
                Arc::clone(&self.limiter),
                self.acceptor.clone(),
                self.config.allow_h2c,
                self.config.security.ip_filter.clone(),
                shutdown_rx.clone(),
                force_close.clone(),
                stop_accepting.clone(),
                index,
            )));
        }

        let mut shutdown = self.ctx.lifecycle.subscribe_shutdown();
        let kind = match shutdown.wait_for(|kind| kind.is_some()).await {
            Ok(guard) => (*guard).unwrap_or(ShutdownKind::Stop),
            Err(_) => ShutdownKind::Stop,
        };

        stop_accepting.cancel();
        for acceptor in acceptors {
            let _ = acceptor.await;
        }
        // The last listener reference drops here, releasing the port before
        // the drain begins.
        kind
    }

    async fn drain(&self, force_close: &CancellationToken) {
        let timeout = Duration::from_secs(self.config.timeout.drain_secs);
        let active = self.limiter.active();
        if active > 0 {
            info!(active, timeout_secs = self.config.timeout.drain_secs, "draining connections");
        }
        tokio::select! {
            _ = self.limiter.drained() => {
                debug!("all connections closed");
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(active = self.limiter.active(), "drain timeout reached, force-closing connections");
                force_close.cancel();
                self.limiter.drained().await;
            }
        }
    }
}

/// Cloneable control handle for a running server.
#[derive(Clone)]
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
}

impl ServerHandle {
    pub fn state(&self) -> LifecycleState {
        self.ctx.lifecycle.state()
    }

    /// Drain and stop, as /killkillkill does.
    pub fn shutdown(&self) {
        self.ctx.lifecycle.request_shutdown(ShutdownKind::Stop);
    }

    /// Drain and rebind, as /restart does.
    pub fn restart(&self) {
        self.ctx.lifecycle.request_shutdown(ShutdownKind::Restart);
    }

    pub async fn wait_for(&self, state: LifecycleState) {
        self.ctx.lifecycle.wait_for(state).await;
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop(
    listener: Arc<TcpListener>,
    ctx: Arc<ServerContext>,
    limiter: Arc<ConnectionLimiter>,
    tls: Option<TlsAcceptor>,
    allow_h2c: bool,
    ip_filter: IpFilterConfig,
    shutdown_rx: watch::Receiver<bool>,
    force_close: CancellationToken,
    stop: CancellationToken,
    index: usize,
) {
    let mut backoff = Duration::from_millis(10);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => {
                        backoff = Duration::from_millis(10);
                        pair
                    }
                    Err(e) => {
                        warn!(acceptor = index, error = %e, "accept error, backing off");
                        tokio::select! {
                            _ = stop.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(Duration::from_secs(1));
                        continue;
                    }
                };

                // Accepted at the socket level to avoid SYN backlog stacking,
                // then dropped without a handshake if over the cap.
                let Some(permit) = limiter.try_acquire() else {
                    ctx.metrics.connections_rejected_total.add(1, &[]);
                    warn!(peer = %peer, cap = limiter.cap(), "connection limit reached, dropping connection");
                    continue;
                };

                if !is_ip_allowed(peer.ip(), &ip_filter) {
                    ctx.metrics.connections_filtered_total.add(1, &[]);
                    debug!(peer = %peer, "connection filtered by ip rules");
                    continue;
                }

                let _ = stream.set_nodelay(true);
                ctx.metrics.connections_total.add(1, &[]);
                ctx.metrics.connections_active.add(1, &[]);
                tokio::spawn(conn::handle_connection(
                    stream,
                    peer,
                    Arc::clone(&ctx),
                    tls.clone(),
                    allow_h2c,
                    shutdown_rx.clone(),
                    force_close.clone(),
                    permit,
                ));
            }
        }
    }
}

fn spawn_background_health(ctx: Arc<ServerContext>, cfg: HealthConfig) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cfg.initial_delay_secs)) => {}
            _ = ctx.lifecycle.wait_for(LifecycleState::Stopped) => return,
        }
        loop {
            let results = ctx.health.run_all(cfg.max_concurrent_checks).await;
            for (name, status) in &results {
                if let HealthStatus::Unhealthy(reason) = status {
                    warn!(check = %name, reason = %reason, "background health check failed");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(cfg.delay_secs)) => {}
                _ = ctx.lifecycle.wait_for(LifecycleState::Stopped) => return,
            }
        }
    });
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source: std::io::Error| ServerError::Bind { addr, source };

    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(SockProtocol::TCP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(1024).map_err(bind_err)?;
    TcpListener::from_std(socket.into()).map_err(bind_err)
}
