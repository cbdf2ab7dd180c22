use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tracing::warn;

/// Result of a single health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        HealthStatus::Unhealthy(reason.into())
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

pub type HealthFuture = Pin<Box<dyn Future<Output = HealthStatus> + Send>>;

/// A named, on-demand health check supplied by the application.
pub trait HealthCheck: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> HealthFuture;
}

/// The registered health checks, owned by the server context.
///
/// `/health` runs them on demand; the orchestrator can additionally schedule
/// periodic background runs.
#[derive(Default)]
pub struct HealthRegistry {
    checks: RwLock<Vec<Arc<dyn HealthCheck>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, check: impl HealthCheck) {
        self.register_arc(Arc::new(check));
    }

    pub fn register_arc(&self, check: Arc<dyn HealthCheck>) {
        match self.checks.write() {
            Ok(mut checks) => checks.push(check),
            Err(_) => warn!("Health registry lock poisoned, dropping check registration"),
        }
    }

    pub fn len(&self) -> usize {
        self.checks.read().map(|checks| checks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered check, at most `max_concurrent` at a time, and
    /// collect the named results in registration order.
    pub async fn run_all(&self, max_concurrent: usize) -> Vec<(String, HealthStatus)> {
        let checks: Vec<Arc<dyn HealthCheck>> = match self.checks.read() {
            Ok(checks) => checks.clone(),
            Err(_) => {
                warn!("Health registry lock poisoned");
                return Vec::new();
            }
        };

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut joins = Vec::with_capacity(checks.len());
        for check in checks {
            let semaphore = Arc::clone(&semaphore);
            joins.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let status = check.check().await;
                (check.name().to_string(), status)
            }));
        }

        let mut results = Vec::with_capacity(joins.len());
        for join in joins {
            match join.await {
                Ok(result) => results.push(result),
                Err(e) => results.push((
                    "unknown".to_string(),
                    HealthStatus::unhealthy(format!("check panicked: {e}")),
                )),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCheck {
        name: &'static str,
        status: HealthStatus,
    }

    impl HealthCheck for StaticCheck {
        fn name(&self) -> &str {
            self.name
        }

        fn check(&self) -> HealthFuture {
            let status = self.status.clone();
            Box::pin(async move { status })
        }
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let results = registry.run_all(2).await;
        assert!(results.is_empty());
        assert!(results.iter().all(|(_, status)| status.is_healthy()));
    }

    #[tokio::test]
    async fn test_results_carry_names_and_statuses() {
        let registry = HealthRegistry::new();
        registry.register(StaticCheck { name: "database", status: HealthStatus::Healthy });
        registry.register(StaticCheck {
            name: "cache",
            status: HealthStatus::unhealthy("connection refused"),
        });

        let results = registry.run_all(2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "database");
        assert!(results[0].1.is_healthy());
        assert_eq!(results[1].0, "cache");
        assert_eq!(results[1].1, HealthStatus::Unhealthy("connection refused".to_string()));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingCheck {
            running: Arc<AtomicUsize>,
            peak: Arc<AtomicUsize>,
        }

        impl HealthCheck for CountingCheck {
            fn name(&self) -> &str {
                "counting"
            }

            fn check(&self) -> HealthFuture {
                let running = Arc::clone(&self.running);
                let peak = Arc::clone(&self.peak);
                Box::pin(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    HealthStatus::Healthy
                })
            }
        }

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let registry = HealthRegistry::new();
        for _ in 0..6 {
            registry.register(CountingCheck {
                running: Arc::clone(&running),
                peak: Arc::clone(&peak),
            });
        }

        registry.run_all(2).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
