use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the log subscriber from configuration.
///
/// RUST_LOG overrides the configured level when set. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing(cfg: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cfg.show_target)
        .try_init();
}
