#![allow(dead_code)]

//! Shared helpers for in-process end-to-end tests.

use heimdall_lib::config::Config;
use heimdall_lib::{LifecycleState, ServerBuilder, ServerHandle};
use std::net::SocketAddr;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub join: tokio::task::JoinHandle<heimdall_lib::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }
}

/// A config bound to an ephemeral loopback port with the admin surface on
/// and a short drain window, suitable for tests.
pub fn base_config() -> Config {
    let mut config = Config::default();
    config.listen = "127.0.0.1:0"
        .parse()
        .unwrap_or_else(|e| panic!("bad listen address: {e}"));
    config.admin.enabled = true;
    config.timeout.drain_secs = 5;
    config
}

/// Bind and serve a server in the background, returning once it reports
/// `Serving`.
pub async fn spawn_server<F>(
    config: Config,
    register: F,
) -> Result<TestServer, Box<dyn std::error::Error + Send + Sync>>
where
    F: FnOnce(&mut ServerBuilder) -> heimdall_lib::Result<()>,
{
    let mut builder = ServerBuilder::new(config);
    register(&mut builder)?;
    let server = builder.bind().await?;
    let addr = server.local_addr();
    let handle = server.handle();
    let join = tokio::spawn(server.serve());
    handle.wait_for(LifecycleState::Serving).await;
    Ok(TestServer { addr, handle, join })
}

/// Read a counter-ish entry out of the registry dump by name substring.
pub fn metric_value(dump: &serde_json::Value, name: &str) -> f64 {
    dump.as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(key, _)| key.contains(name))
                .filter_map(|(_, value)| value.as_f64())
                .sum()
        })
        .unwrap_or(0.0)
}
