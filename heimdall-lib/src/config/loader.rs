use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, ServerError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ServerError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| ServerError::Config(format!("Failed to parse config: {e}")))?;

    validate(&cfg)?;

    Ok(cfg)
}

/// Validate a configuration, whether loaded from disk or assembled in code.
pub fn validate(cfg: &Config) -> Result<()> {
    let rate = &cfg.security.rate_limit;
    if rate.enabled {
        if rate.soft_req_per_sec <= 0.0 || rate.hard_req_per_sec <= 0.0 {
            return Err(ServerError::Config(
                "Rate limit thresholds must be positive".to_string(),
            ));
        }
        if rate.soft_req_per_sec > rate.hard_req_per_sec {
            return Err(ServerError::Config(format!(
                "Soft rate limit ({}) must not exceed hard rate limit ({})",
                rate.soft_req_per_sec, rate.hard_req_per_sec
            )));
        }
        if rate.burst == 0 {
            return Err(ServerError::Config("Rate limit burst must be at least 1".to_string()));
        }
    }

    if cfg.security.max_connections == 0 {
        return Err(ServerError::Config("max_connections must be at least 1".to_string()));
    }

    if let Some(tls) = &cfg.tls {
        if !Path::new(&tls.cert_path).exists() {
            return Err(ServerError::Config(format!(
                "Certificate file not found: {}",
                tls.cert_path
            )));
        }
        if !Path::new(&tls.key_path).exists() {
            return Err(ServerError::Config(format!("Key file not found: {}", tls.key_path)));
        }
    }

    if let Some(cors) = &cfg.cors {
        let wildcard_origin = cors.allowed_origins.iter().any(|o| o == "*");
        if wildcard_origin && cors.allow_credentials {
            return Err(ServerError::Config(
                "CORS allowed_origins=[\"*\"] cannot be combined with allow_credentials=true"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let cfg: Config = toml::from_str("listen = \"127.0.0.1:9000\"")
            .unwrap_or_else(|e| panic!("minimal config should parse: {e}"));
        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.service_name, "heimdall");
        assert!(!cfg.admin.enabled);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_src = r#"
            listen = "0.0.0.0:8443"
            service_name = "edge"
            build_commit = "abc1234"
            allow_h2c = true

            [runtime]
            acceptor_threads = 2
            worker_threads = 8
            worker_name_format = "edge-worker-{}"

            [security]
            max_connections = 1024

            [security.ip_filter]
            allowlist = ["192.168.0.0/16"]
            denylist = ["192.168.13.0/24"]

            [security.rate_limit]
            enabled = true
            soft_req_per_sec = 100
            hard_req_per_sec = 400
            burst = 50

            [cors]
            allowed_origins = ["https://example.com"]
            allowed_methods = ["GET", "POST"]
            max_age_secs = 300
            allow_credentials = true

            [admin]
            enabled = true

            [health]
            background_checks = true
            initial_delay_secs = 5
            delay_secs = 10

            [telemetry.console_reporter]
            enabled = true
            interval_secs = 30

            [timeout]
            drain_secs = 5
        "#;
        let cfg: Config =
            toml::from_str(toml_src).unwrap_or_else(|e| panic!("full config should parse: {e}"));
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.runtime.worker_threads, 8);
        assert_eq!(cfg.security.ip_filter.allowlist.len(), 1);
        assert_eq!(cfg.security.rate_limit.burst, 50);
        assert!(cfg.admin.enabled);
        assert_eq!(cfg.timeout.drain_secs, 5);
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [security.ip_filter]
            denylist = ["not-a-network"]
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_soft_above_hard_rejected() {
        let mut cfg = Config::default();
        cfg.security.rate_limit.enabled = true;
        cfg.security.rate_limit.soft_req_per_sec = 100.0;
        cfg.security.rate_limit.hard_req_per_sec = 10.0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_zero_burst_rejected() {
        let mut cfg = Config::default();
        cfg.security.rate_limit.enabled = true;
        cfg.security.rate_limit.burst = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_wildcard_origin_with_credentials_rejected() {
        let mut cfg = Config::default();
        let mut cors = crate::config::CorsConfig::default();
        cors.allow_credentials = true;
        cfg.cors = Some(cors);
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_missing_tls_files_rejected() {
        let mut cfg = Config::default();
        cfg.tls = Some(crate::config::TlsConfig {
            cert_path: "/nonexistent/server.crt".to_string(),
            key_path: "/nonexistent/server.key".to_string(),
        });
        assert!(validate(&cfg).is_err());
    }
}
