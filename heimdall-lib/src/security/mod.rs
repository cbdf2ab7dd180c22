pub mod conn_limit;
pub mod firewall;
pub mod ip_filter;
pub mod rate_limit;

pub use conn_limit::{ConnectionLimiter, ConnectionPermit};
pub use firewall::Firewall;
pub use ip_filter::is_ip_allowed;
pub use rate_limit::{Admission, RateLimiter};
