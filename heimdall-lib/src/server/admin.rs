use http::StatusCode;
use serde_json::json;

use crate::error::Result;
use crate::http::{BoxError, RequestContext, Response};
use crate::router::RouteTableBuilder;
use crate::server::lifecycle::ShutdownKind;
use crate::telemetry::{registry_json, HealthStatus};

/// Register the operational endpoints into the route table.
///
/// They carry no authentication of their own; operators are expected to
/// restrict /restart and /killkillkill with the IP allow-list.
pub(crate) fn register_admin_routes(routes: &mut RouteTableBuilder) -> Result<()> {
    routes.get("/info", info)?;
    routes.get("/metrics", metrics)?;
    routes.get("/health", health)?;
    routes.get("/ping", ping)?;
    routes.get("/ready", ready)?;
    routes.get("/restart", restart)?;
    routes.get("/killkillkill", kill)?;
    Ok(())
}

async fn info(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    let info = ctx.server().info();
    Ok(Response::json(&json!({
        "name": info.name,
        "version": info.version,
        "commit": info.commit,
    }))?)
}

async fn metrics(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    Ok(Response::json(&registry_json(ctx.server().registry()))?)
}

async fn health(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    let max_concurrent = ctx.server().health_cfg.max_concurrent_checks;
    let results = ctx.server().health().run_all(max_concurrent).await;

    let all_healthy = results.iter().all(|(_, status)| status.is_healthy());
    let mut checks = serde_json::Map::new();
    for (name, status) in results {
        let entry = match status {
            HealthStatus::Healthy => json!({"healthy": true}),
            HealthStatus::Unhealthy(reason) => json!({"healthy": false, "reason": reason}),
        };
        checks.insert(name, entry);
    }

    let response = Response::json(&json!({"healthy": all_healthy, "checks": checks}))?;
    Ok(if all_healthy {
        response
    } else {
        response.status(StatusCode::SERVICE_UNAVAILABLE)
    })
}

async fn ping(_ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    Ok(Response::text("PONG"))
}

async fn ready(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    if ctx.server().lifecycle().is_serving() {
        Ok(Response::json(&json!({"status": "ready"}))?)
    } else {
        Ok(Response::json(&json!({"status": "not_ready"}))?
            .status(StatusCode::SERVICE_UNAVAILABLE))
    }
}

async fn restart(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    ctx.server().lifecycle().request_shutdown(ShutdownKind::Restart);
    Ok(Response::json(&json!({"status": "restarting"}))?)
}

async fn kill(ctx: RequestContext) -> std::result::Result<Response, BoxError> {
    ctx.server().lifecycle().request_shutdown(ShutdownKind::Stop);
    Ok(Response::json(&json!({"status": "stopping"}))?)
}
