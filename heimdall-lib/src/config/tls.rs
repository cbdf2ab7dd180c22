use serde::Deserialize;

/// TLS termination configuration
///
/// The negotiated ALPN order is fixed: `h2` preferred over `http/1.1`.
/// Minimum protocol version is TLS 1.2.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the PEM-encoded certificate chain
    pub cert_path: String,
    /// Path to the PEM-encoded private key
    pub key_path: String,
}
