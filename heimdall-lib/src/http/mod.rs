pub mod context;
pub mod cors;
pub mod handler;
pub mod response;

pub use context::RequestContext;
pub use cors::CorsPolicy;
pub use handler::{BoxError, Handler, HandlerFuture};
pub use response::Response;
