use serde::Deserialize;

/// Drain and shutdown timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Seconds to wait for in-flight connections to finish once draining
    /// begins; remaining connections are force-closed afterwards
    /// Default: 30
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { drain_secs: default_drain_secs() }
    }
}

fn default_drain_secs() -> u64 {
    30
}
