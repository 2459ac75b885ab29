//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use costsync_domain::{CostSyncError, Environment, RoundingPolicy};
use costsync_infra::config;
use tempfile::Builder;

fn temp_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_load_config_from_toml_file() {
    let file = temp_config(
        ".toml",
        r#"
[catalog]
root = "/srv/cost-catalog"

[budgeting]
base_url = "https://budgets.example.com/api/v1"
request_timeout_secs = 10

[sync]
enabled = false
poll_interval_secs = 900
max_attempts = 4

[database]
path = "/var/lib/costsync/state.db"
pool_size = 2

[resolution]
rounding = "nearest_half_up"

[validation]
min_alert_rules = 3

[validation.bounds.prod]
min = 1000
max = 250000

[logging]
level = "costsync_core=debug"
json = true
"#,
    );

    let config = config::load_from_file(file.path()).expect("TOML config should load");

    assert_eq!(config.catalog.root, PathBuf::from("/srv/cost-catalog"));
    assert_eq!(config.budgeting.request_timeout_secs, 10);
    assert!(!config.sync.enabled);
    assert_eq!(config.sync.poll_interval_secs, 900);
    assert_eq!(config.sync.max_attempts, 4);
    assert_eq!(config.database.pool_size, 2);
    assert_eq!(config.resolution.rounding, RoundingPolicy::NearestHalfUp);
    assert_eq!(config.validation.min_alert_rules, 3);

    let prod = config.validation.bounds_for(Environment::Prod);
    assert_eq!((prod.min, prod.max), (1000, 250_000));
    assert!(config.logging.json);
    assert!(config::validate(&config).is_ok());
}

#[test]
fn test_load_config_from_json_file() {
    let file = temp_config(
        ".json",
        r#"{
            "budgeting": { "base_url": "http://127.0.0.1:9000/api", "api_token": "t0k3n" },
            "database": { "path": "state.db", "pool_size": 8 }
        }"#,
    );

    let config = config::load_from_file(file.path()).expect("JSON config should load");

    assert_eq!(config.budgeting.api_token.as_deref(), Some("t0k3n"));
    assert_eq!(config.database.path, "state.db");
    assert_eq!(config.database.pool_size, 8);
    // Sections left out keep their defaults
    assert!(config.sync.enabled);
    assert_eq!(config.resolution.rounding, RoundingPolicy::Ceiling);
}

#[test]
fn test_explicit_path_is_validated() {
    let file = temp_config(
        ".toml",
        r#"
[sync]
poll_interval_secs = 0
"#,
    );

    match config::load_with(Some(file.path().to_path_buf())) {
        Err(CostSyncError::Config(msg)) => assert!(msg.contains("poll_interval_secs")),
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(&PathBuf::from("/nonexistent/path/costsync.toml"));

    match result {
        Err(CostSyncError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let file = temp_config(".json", r#"{ "this is": "not valid" "#);

    match config::load_from_file(file.path()) {
        Err(CostSyncError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_unknown_environment_in_bounds_is_rejected() {
    let file = temp_config(
        ".toml",
        r#"
[validation.bounds.staging]
min = 1
max = 2
"#,
    );

    assert!(matches!(config::load_from_file(file.path()), Err(CostSyncError::Config(_))));
}
