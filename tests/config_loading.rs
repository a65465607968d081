//! Layered configuration: defaults, TOML file, environment.

use scope_bridge::config::{BridgeConfig, LogFormat};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_file_values_override_defaults() {
    let file = write_config(
        r#"
[server]
scpi_port = 5100

[instrument]
family = "2000a"
serial = "GO001/0002"
digital_pods = 0

[logging]
format = "json"
"#,
    );

    let config = BridgeConfig::load_from(file.path()).unwrap();
    assert_eq!(config.server.scpi_port, 5100);
    assert_eq!(config.server.bind_address, "0.0.0.0");
    assert_eq!(config.instrument.family, "2000a");
    assert_eq!(config.instrument.serial.as_deref(), Some("GO001/0002"));
    assert_eq!(config.instrument.digital_pods, Some(0));
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = BridgeConfig::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config("[server]\nscpi_port = 5100\n");
    std::env::set_var("SCOPE_BRIDGE_SERVER__SCPI_PORT", "5200");
    std::env::set_var("SCOPE_BRIDGE_INSTRUMENT__FAMILY", "5000a");

    let config = BridgeConfig::load_from(file.path());

    std::env::remove_var("SCOPE_BRIDGE_SERVER__SCPI_PORT");
    std::env::remove_var("SCOPE_BRIDGE_INSTRUMENT__FAMILY");

    let config = config.unwrap();
    assert_eq!(config.server.scpi_port, 5200);
    assert_eq!(config.instrument.family, "5000a");
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let file = write_config("[server]\nscpi_port = \"not a port\"\n");
    assert!(BridgeConfig::load_from(file.path()).is_err());
}

#[test]
#[serial]
fn test_rendered_config_loads_back() {
    let mut original = BridgeConfig::default();
    original.instrument.family = "5000a".to_string();
    original.instrument.model = Some("5444D".to_string());
    original.logging.format = LogFormat::Compact;

    let file = write_config(&original.to_toml().unwrap());
    let loaded = BridgeConfig::load_from(file.path()).unwrap();
    assert_eq!(loaded, original);
}

#[test]
#[serial]
fn test_invalid_family_fails_validation() {
    let file = write_config("[instrument]\nfamily = \"9999x\"\n");
    let config = BridgeConfig::load_from(file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.contains("9999x"));
}
