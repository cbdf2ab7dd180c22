use serde::Deserialize;

/// CORS configuration
///
/// When present, matching preflight requests are answered by the response
/// pipeline without reaching user handlers, and allowed cross-origin
/// responses carry the appropriate headers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CorsConfig {
    /// Allowed origins, or ["*"] for any origin
    /// Default: ["*"]
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Allowed methods for cross-origin requests
    /// Default: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    /// Allowed request headers, or ["*"] for any header
    /// Default: ["content-type"]
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds (Access-Control-Max-Age)
    /// Default: 600
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Allow credentialed requests. Forbidden together with a wildcard
    /// origin; that combination fails configuration validation.
    /// Default: false
    #[serde(default)]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            max_age_secs: default_max_age_secs(),
            allow_credentials: false,
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_allowed_headers() -> Vec<String> {
    vec!["content-type".to_string()]
}

fn default_max_age_secs() -> u64 {
    600
}
