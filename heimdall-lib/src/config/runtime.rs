use serde::Deserialize;

/// Runtime sizing configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Number of acceptor tasks sharing the listener
    /// Default: 1
    #[serde(default = "default_acceptor_threads")]
    pub acceptor_threads: usize,
    /// Worker threads for the runtime; 0 means one per CPU core
    /// Default: 0
    #[serde(default)]
    pub worker_threads: usize,
    /// Format string for worker thread names; "{}" is replaced with the
    /// worker index
    /// Default: "heimdall-worker-{}"
    #[serde(default = "default_worker_name_format")]
    pub worker_name_format: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            acceptor_threads: default_acceptor_threads(),
            worker_threads: 0,
            worker_name_format: default_worker_name_format(),
        }
    }
}

fn default_acceptor_threads() -> usize {
    1
}

fn default_worker_name_format() -> String {
    "heimdall-worker-{}".to_string()
}
