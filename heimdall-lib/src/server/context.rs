use arc_swap::ArcSwap;
use prometheus::Registry;
use std::sync::atomic::{AtomicU64, Ordering};

use super::lifecycle::Lifecycle;
use crate::config::HealthConfig;
use crate::http::CorsPolicy;
use crate::router::RouteTable;
use crate::security::{Firewall, RateLimiter};
use crate::telemetry::{HealthRegistry, Metrics};

/// Identity reported by the /info endpoint.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub version: &'static str,
    pub commit: String,
}

/// Process-wide server state, constructed once at bind time and shared by
/// every request context via read-only reference.
///
/// The route table snapshot is published here atomically; nothing mutates it
/// afterwards.
pub struct ServerContext {
    pub(crate) info: ServiceInfo,
    pub(crate) metrics: Metrics,
    pub(crate) registry: Registry,
    pub(crate) routes: ArcSwap<RouteTable>,
    pub(crate) health: HealthRegistry,
    pub(crate) health_cfg: HealthConfig,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) cors: Option<CorsPolicy>,
    pub(crate) firewall: Firewall,
    pub(crate) rate_limiter: Option<RateLimiter>,
    request_ids: AtomicU64,
    connection_ids: AtomicU64,
}

impl ServerContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        info: ServiceInfo,
        metrics: Metrics,
        registry: Registry,
        routes: RouteTable,
        health: HealthRegistry,
        health_cfg: HealthConfig,
        cors: Option<CorsPolicy>,
        firewall: Firewall,
        rate_limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            info,
            metrics,
            registry,
            routes: ArcSwap::from_pointee(routes),
            health,
            health_cfg,
            lifecycle: Lifecycle::new(),
            cors,
            firewall,
            rate_limiter,
            request_ids: AtomicU64::new(0),
            connection_ids: AtomicU64::new(0),
        }
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.request_ids.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.connection_ids.fetch_add(1, Ordering::Relaxed)
    }
}
