//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use authwire::config::{AppConfig, LoggingConfig, SecurityConfig, ServerConfig, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = AppConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = AppConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_client_address() {
    let mut config = AppConfig::default();
    config.client.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_backlog() {
    let config = ServerConfig {
        backlog: 0,
        ..ServerConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("backlog must be greater than 0")));
}

#[test]
fn test_read_chunk_bounds() {
    let mut config = ServerConfig {
        read_chunk: 4,
        ..ServerConfig::default()
    };
    assert!(config.validate().iter().any(|e| e.contains("Read chunk too small")));

    config.read_chunk = 4 * 1024 * 1024;
    assert!(config.validate().iter().any(|e| e.contains("Read chunk too large")));
}

#[test]
fn test_max_connections_needs_room_for_listener() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    assert!(!config.validate().is_empty());
}

#[test]
fn test_short_connect_timeout() {
    let mut config = AppConfig::default();
    config.client.connect_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Connect timeout too short")));
}

#[test]
fn test_backslash_delimiter_rejected() {
    let config = StoreConfig {
        delimiter: '\\',
        ..StoreConfig::default()
    };
    assert!(config.validate().iter().any(|e| e.contains("Invalid delimiter")));
}

#[test]
fn test_delimiter_byte() {
    let config = StoreConfig {
        delimiter: ':',
        ..StoreConfig::default()
    };
    assert_eq!(config.delimiter_byte(), b':');
}

#[test]
fn test_security_parameters() {
    let config = SecurityConfig {
        t_cost: 0,
        m_cost_kib: 4,
        max_attempts: 0,
        ..SecurityConfig::default()
    };
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("t_cost")));
    assert!(errors.iter().any(|e| e.contains("memory too small")));
    assert!(errors.iter().any(|e| e.contains("Max attempts")));
}

#[test]
fn test_default_security_matches_login_policy() {
    let config = SecurityConfig::default();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.t_cost, 2);
    assert_eq!(config.m_cost_kib, 65536);
    assert_eq!(config.output_len, 32);
}

#[test]
fn test_file_logging_requires_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_no_logging_outputs() {
    let config = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_collects_all_errors() {
    let mut config = AppConfig::default();
    config.server.address = "nope".to_string();
    config.security.max_attempts = 0;

    let err = config.validate_strict().expect_err("invalid config");
    let text = err.to_string();
    assert!(text.contains("Invalid server address"));
    assert!(text.contains("Max attempts"));
}

#[test]
fn test_from_toml_partial_sections() {
    let config = AppConfig::from_toml(
        r#"
        [server]
        address = "0.0.0.0:7777"
        backlog = 64
        read_chunk = 2048
        max_connections = 10

        [store]
        passwd_path = "/tmp/authwire-passwd"
        whitelist_path = "/tmp/authwire-whitelist"
        delimiter = ","

        [logging]
        app_name = "authwire-test"
        log_level = "debug"
        log_to_console = true
        log_to_file = false
        json_format = true
        "#,
    )
    .expect("parse");

    assert_eq!(config.server.address, "0.0.0.0:7777");
    assert_eq!(config.server.backlog, 64);
    assert_eq!(config.store.whitelist_path, Some(PathBuf::from("/tmp/authwire-whitelist")));
    assert_eq!(config.logging.app_name, "authwire-test");
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    // Untouched sections fall back to defaults
    assert_eq!(config.security.max_attempts, 3);
    assert_eq!(config.client.address, "127.0.0.1:9000");
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = AppConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        log_to_console = true
        log_to_file = false
        json_format = false
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_example_config_round_trips() {
    let text = AppConfig::example_config();
    let parsed = AppConfig::from_toml(&text).expect("example parses");
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("authwire.toml");

    let config = AppConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:4242".to_string();
        c.client.response_timeout = Duration::from_secs(3);
    });
    config.save_to_file(&path).expect("save");

    let loaded = AppConfig::from_file(&path).expect("load");
    assert_eq!(loaded.server.address, "127.0.0.1:4242");
    assert_eq!(loaded.client.response_timeout, Duration::from_secs(3));
}
