use serde::Deserialize;
use std::net::SocketAddr;

use super::cors::CorsConfig;
use super::runtime::RuntimeConfig;
use super::security::SecurityConfig;
use super::telemetry::{AdminConfig, HealthConfig, LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8420" or "127.0.0.1:8080"
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Service name reported by the /info endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Build commit reported by the /info endpoint
    #[serde(default)]
    pub build_commit: Option<String>,
    /// Accept cleartext HTTP/2 (prior-knowledge preface) on a plaintext
    /// listener. Without this, a cleartext preface is a protocol error.
    /// Default: false
    #[serde(default)]
    pub allow_h2c: bool,
    /// Runtime sizing (acceptor tasks, worker threads)
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Admission control: connection cap, IP filtering, rate limiting,
    /// firewall ceilings
    #[serde(default)]
    pub security: SecurityConfig,
    /// TLS termination configuration (optional)
    /// If not provided, the server operates in plain HTTP mode
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// CORS policy (optional); presence enables preflight handling
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    /// Admin endpoint toggles
    #[serde(default)]
    pub admin: AdminConfig,
    /// Health check scheduling
    #[serde(default)]
    pub health: HealthConfig,
    /// Metric reporters
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Drain and shutdown timing
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            service_name: default_service_name(),
            build_commit: None,
            allow_h2c: false,
            runtime: RuntimeConfig::default(),
            security: SecurityConfig::default(),
            tls: None,
            cors: None,
            admin: AdminConfig::default(),
            health: HealthConfig::default(),
            telemetry: TelemetryConfig::default(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8420))
}

fn default_service_name() -> String {
    "heimdall".to_string()
}
