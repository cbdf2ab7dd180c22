#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use self::config::{load_from_path, Config};
pub use self::error::{Result, ServerError};
pub use self::http::{BoxError, Handler, RequestContext, Response};
pub use self::router::RouteTableBuilder;
pub use self::server::{LifecycleState, Server, ServerBuilder, ServerHandle, ShutdownKind};
pub use self::telemetry::{HealthCheck, HealthStatus};
pub use self::tls::build_tls_acceptor;
