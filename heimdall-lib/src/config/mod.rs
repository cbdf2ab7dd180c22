mod cors;
mod loader;
mod root;
mod runtime;
mod security;
mod telemetry;
mod timeout;
mod tls;

pub use cors::CorsConfig;
pub use loader::{load_from_path, validate};
pub use root::Config;
pub use runtime::RuntimeConfig;
pub use security::{FirewallConfig, IpFilterConfig, RateLimitConfig, SecurityConfig};
pub use telemetry::{AdminConfig, HealthConfig, LoggingConfig, ReporterConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
pub use tls::TlsConfig;
