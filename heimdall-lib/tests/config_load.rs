use heimdall_lib::config::load_from_path;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_valid_file() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
listen = "127.0.0.1:0"
service_name = "edge"

[security.rate_limit]
enabled = true
soft_req_per_sec = 100
hard_req_per_sec = 400
burst = 64

[admin]
enabled = true
"#
    )?;

    let config = load_from_path(file.path())?;
    assert_eq!(config.listen.to_string(), "127.0.0.1:0");
    assert_eq!(config.service_name, "edge");
    assert!(config.admin.enabled);
    assert_eq!(config.security.rate_limit.burst, 64);
    Ok(())
}

#[test]
fn test_config_rejects_contradictory_rate_limits() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
listen = "127.0.0.1:0"

[security.rate_limit]
enabled = true
soft_req_per_sec = 500
hard_req_per_sec = 100
"#
    )?;

    assert!(load_from_path(file.path()).is_err());
    Ok(())
}

#[test]
fn test_config_rejects_missing_file() {
    assert!(load_from_path("/nonexistent/heimdall.toml").is_err());
}

#[test]
fn test_sample_config_parses() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = load_from_path(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/heimdall.toml"),
    )?;
    assert!(config.admin.enabled);
    assert!(config.security.rate_limit.enabled);
    Ok(())
}
