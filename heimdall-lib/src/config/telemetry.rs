use serde::Deserialize;

/// Admin endpoint configuration
///
/// The admin surface (/info, /metrics, /health, /ping, /ready, /restart,
/// /killkillkill) is registered into the ordinary route table only when
/// enabled. /restart and /killkillkill carry no authentication of their own;
/// operators are expected to gate them with the IP allow-list.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct AdminConfig {
    /// Serve the admin routes
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
}

/// Health check scheduling
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HealthConfig {
    /// Run registered checks periodically in the background (in addition to
    /// on-demand runs via /health)
    /// Default: false
    #[serde(default)]
    pub background_checks: bool,
    /// Seconds before the first background run
    /// Default: 60
    #[serde(default = "default_health_delay_secs")]
    pub initial_delay_secs: u64,
    /// Seconds between background runs
    /// Default: 60
    #[serde(default = "default_health_delay_secs")]
    pub delay_secs: u64,
    /// Maximum checks evaluated concurrently
    /// Default: 2
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            background_checks: false,
            initial_delay_secs: default_health_delay_secs(),
            delay_secs: default_health_delay_secs(),
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

fn default_health_delay_secs() -> u64 {
    60
}

fn default_max_concurrent_checks() -> usize {
    2
}

/// A single periodic metric reporter
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReporterConfig {
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between reports
    /// Default: 60
    #[serde(default = "default_reporter_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self { enabled: false, interval_secs: default_reporter_interval_secs() }
    }
}

fn default_reporter_interval_secs() -> u64 {
    60
}

/// Metric reporter toggles
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct TelemetryConfig {
    /// Periodic registry dump to stdout
    #[serde(default)]
    pub console_reporter: ReporterConfig,
    /// Periodic registry dump through the log subscriber
    #[serde(default)]
    pub log_reporter: ReporterConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (overridden by RUST_LOG when set)
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the event target in log lines
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
