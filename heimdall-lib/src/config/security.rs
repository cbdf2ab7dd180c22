use ipnet::IpNet;
use serde::Deserialize;

/// Admission control configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Maximum number of concurrently open connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// IP filtering (allow/deny lists) configuration
    #[serde(default)]
    pub ip_filter: IpFilterConfig,
    /// Per-client rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Protocol anomaly ceilings (observation only)
    #[serde(default)]
    pub firewall: FirewallConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            ip_filter: IpFilterConfig::default(),
            rate_limit: RateLimitConfig::default(),
            firewall: FirewallConfig::default(),
        }
    }
}

fn default_max_connections() -> usize {
    512
}

/// IP filtering configuration
///
/// Both lists hold CIDR ranges. A non-empty allow-list must match the remote
/// address; any deny-list match then rejects it. Rejected connections are
/// closed before the TLS handshake.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct IpFilterConfig {
    /// Allow-list in CIDR notation: ["127.0.0.1/32", "192.168.1.0/24", "::1/128"]
    /// Empty means no allow-list restriction.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_ip_networks")]
    pub allowlist: Vec<IpNet>,
    /// Deny-list in CIDR notation: ["10.0.0.0/8", "172.16.0.0/12"]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_ip_networks")]
    pub denylist: Vec<IpNet>,
}

/// Custom deserializer for IP networks so a bad entry fails configuration
/// loading instead of being silently skipped
fn deserialize_ip_networks<'de, D>(deserializer: D) -> Result<Vec<IpNet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let strings: Vec<String> = Vec::deserialize(deserializer)?;
    let mut networks = Vec::new();

    for s in strings {
        match s.parse::<IpNet>() {
            Ok(net) => networks.push(net),
            Err(e) => {
                return Err(serde::de::Error::custom(format!("Invalid IP network '{}': {}", s, e)));
            }
        }
    }

    Ok(networks)
}

/// Per-remote-IP rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Soft threshold in requests per second: exceeding it yields 429 but
    /// keeps the connection open
    /// Default: 500
    #[serde(default = "default_soft_req_per_sec")]
    pub soft_req_per_sec: f64,
    /// Hard threshold in requests per second: exhausting it closes the
    /// connection after the 429
    /// Default: 2000
    #[serde(default = "default_hard_req_per_sec")]
    pub hard_req_per_sec: f64,
    /// Maximum tokens a client can accumulate (bucket capacity)
    /// Default: 500
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Idle seconds after which a full per-IP entry may be evicted
    /// Default: 60
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Soft rate of the shared fallback bucket charged on first sight of an
    /// IP, bounding map growth under address-spraying attacks
    /// Default: 10000
    #[serde(default = "default_global_soft_req_per_sec")]
    pub global_soft_req_per_sec: f64,
    /// Hard rate of the shared fallback bucket
    /// Default: 20000
    #[serde(default = "default_global_hard_req_per_sec")]
    pub global_hard_req_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            soft_req_per_sec: default_soft_req_per_sec(),
            hard_req_per_sec: default_hard_req_per_sec(),
            burst: default_burst(),
            idle_timeout_secs: default_idle_timeout_secs(),
            global_soft_req_per_sec: default_global_soft_req_per_sec(),
            global_hard_req_per_sec: default_global_hard_req_per_sec(),
        }
    }
}

fn default_soft_req_per_sec() -> f64 {
    500.0
}

fn default_hard_req_per_sec() -> f64 {
    2000.0
}

fn default_burst() -> u32 {
    500
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_global_soft_req_per_sec() -> f64 {
    10_000.0
}

fn default_global_hard_req_per_sec() -> f64 {
    20_000.0
}

/// Protocol anomaly ceilings. Crossing one increments a counter; nothing is
/// blocked at this layer.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FirewallConfig {
    /// Header block size above which the oversized-header counter ticks
    /// Default: 8192
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Request line length above which the request-line counter ticks
    /// Default: 4096
    #[serde(default = "default_max_request_line_bytes")]
    pub max_request_line_bytes: usize,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: default_max_header_bytes(),
            max_request_line_bytes: default_max_request_line_bytes(),
        }
    }
}

fn default_max_header_bytes() -> usize {
    8192
}

fn default_max_request_line_bytes() -> usize {
    4096
}
