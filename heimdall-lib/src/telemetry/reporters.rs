use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::metrics_handler::registry_json;
use crate::config::TelemetryConfig;
use crate::server::{LifecycleState, ServerContext};

/// Spawn the configured periodic reporters.
///
/// Each reporter dumps the registry on its own interval until the
/// orchestrator reaches `Stopped`.
pub(crate) fn spawn_reporters(ctx: &Arc<ServerContext>, cfg: &TelemetryConfig) {
    if cfg.console_reporter.enabled {
        let ctx = Arc::clone(ctx);
        let interval = Duration::from_secs(cfg.console_reporter.interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        println!("{}", registry_json(ctx.registry()));
                    }
                    _ = ctx.lifecycle().wait_for(LifecycleState::Stopped) => break,
                }
            }
        });
    }

    if cfg.log_reporter.enabled {
        let ctx = Arc::clone(ctx);
        let interval = Duration::from_secs(cfg.log_reporter.interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        info!(target: "heimdall::metrics", metrics = %registry_json(ctx.registry()), "metrics report");
                    }
                    _ = ctx.lifecycle().wait_for(LifecycleState::Stopped) => break,
                }
            }
        });
    }
}
