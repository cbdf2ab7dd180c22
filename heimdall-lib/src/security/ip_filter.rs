use crate::config::IpFilterConfig;
use std::net::IpAddr;

/// Check if a remote address is allowed by the filter configuration
///
/// Returns `true` if the connection should proceed, `false` if it should be
/// closed before the TLS handshake.
///
/// # Logic:
/// - If the allow-list is non-empty, the remote must match one of its ranges
/// - A remote matching the deny-list is then rejected
/// - Both lists empty: everything passes
pub fn is_ip_allowed(ip: IpAddr, config: &IpFilterConfig) -> bool {
    if !config.allowlist.is_empty() && !config.allowlist.iter().any(|net| net.contains(&ip)) {
        return false;
    }
    !config.denylist.iter().any(|net| net.contains(&ip))
}
