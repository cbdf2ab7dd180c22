pub mod health;
pub mod metrics;
pub mod metrics_handler;
pub mod reporters;
pub mod tracing;

pub use health::{HealthCheck, HealthFuture, HealthRegistry, HealthStatus};
pub use metrics::{init_metrics, Metrics, ResponseCodeMeters};
pub use metrics_handler::registry_json;
pub use self::tracing::init_tracing;
