#![forbid(unsafe_code)]

use clap::Parser;
use heimdall_lib::config::{load_from_path, Config, RuntimeConfig};
use heimdall_lib::telemetry::init_tracing;
use heimdall_lib::{RequestContext, Response, ServerBuilder};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Heimdall embeddable HTTP/1.1 + HTTP/2 ingress server")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/heimdall.toml")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    let runtime = match build_runtime(&config.runtime) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build runtime");
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(run(config));
    std::process::exit(code);
}

fn build_runtime(cfg: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if cfg.worker_threads > 0 {
        builder.worker_threads(cfg.worker_threads);
    }
    let name_format = cfg.worker_name_format.clone();
    let counter = AtomicUsize::new(0);
    builder.thread_name_fn(move || {
        let index = counter.fetch_add(1, Ordering::SeqCst);
        name_format.replacen("{}", &index.to_string(), 1)
    });
    builder.build()
}

async fn run(config: Config) -> i32 {
    let mut builder = ServerBuilder::new(config);
    if let Err(err) = register_demo_routes(&mut builder) {
        error!(%err, "failed to register routes");
        return 1;
    }

    let server = match builder.bind().await {
        Ok(server) => server,
        Err(err) => {
            error!(%err, "failed to start server");
            return 1;
        }
    };
    info!(addr = %server.local_addr(), "heimdall started");

    let handle = server.handle();
    tokio::spawn(async move {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
        handle.shutdown();
    });

    match server.serve().await {
        Ok(()) => 0,
        Err(err) => {
            error!(%err, "server exited with error");
            1
        }
    }
}

fn register_demo_routes(builder: &mut ServerBuilder) -> heimdall_lib::Result<()> {
    let routes = builder.routes();

    routes.get("/hello/{name}", |ctx: RequestContext| async move {
        let name = ctx.param("name").unwrap_or("stranger").to_string();
        Ok(Response::text(format!("Hello, {name}!")))
    })?;

    routes.get("/users/{id}/orders/{order_id}", |ctx: RequestContext| async move {
        let body = serde_json::json!({
            "user": ctx.param("id"),
            "order": ctx.param("order_id"),
        });
        Ok(Response::json(&body)?)
    })?;

    routes.post("/echo", |mut ctx: RequestContext| async move {
        let body = ctx.body_bytes().await?;
        Ok(Response::ok()
            .header("content-type", "application/octet-stream")
            .body(body))
    })?;

    Ok(())
}
