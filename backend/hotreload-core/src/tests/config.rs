// Unit tests for loading, saving and validating hotreload.json.

use crate::config::{DecodeConfig, HotReloadConfig, StatusConfig};
use crate::error::ConfigError;
use crate::listener::ConnectionKind;

use std::fs;

use tempfile::TempDir;

#[test]
fn given_defaults_when_inspected_then_values_match_documented_defaults() {
    let config = HotReloadConfig::default();

    assert_eq!(config.version, 1);
    assert_eq!(config.status.kind, ConnectionKind::Net);
    assert_eq!(config.status.host, "127.0.0.1");
    assert_eq!(config.status.port, 8176);
    assert_eq!(config.decode.max_consecutive_failures, None);
    assert!(config.reply_to_ping);
    assert!(config.serial.is_empty());
    assert!(config.host_address.is_none());
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies that a first launch without a config file works.
#[test]
fn given_missing_file_when_loading_then_defaults_are_returned() {
    let dir = TempDir::new().unwrap();

    let config = HotReloadConfig::load(dir.path()).unwrap();

    assert_eq!(config, HotReloadConfig::default());
}

/// **VALUE**: Verifies save then load returns the same values and leaves no temp file behind.
#[test]
fn given_saved_config_when_loading_then_values_survive() {
    // GIVEN: A non-default config saved into a nested directory
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("nested").join("hotreload");
    let config = HotReloadConfig {
        status: StatusConfig {
            kind: ConnectionKind::Usb,
            host: "10.0.0.5".to_string(),
            port: 9000,
        },
        decode: DecodeConfig {
            max_consecutive_failures: Some(3),
        },
        reply_to_ping: false,
        serial: "device-42".to_string(),
        host_address: Some("10.0.0.5:9000".to_string()),
        ..HotReloadConfig::default()
    };

    // WHEN: Saved and loaded again
    config.save(&config_dir).unwrap();
    let loaded = HotReloadConfig::load(&config_dir).unwrap();

    // THEN: Identical, and the temp file was renamed away
    assert_eq!(loaded, config);
    assert!(config_dir.join("hotreload.json").exists());
    assert!(!config_dir.join("hotreload.json.tmp").exists());
}

/// **VALUE**: Verifies that a partial file is completed with defaults.
#[test]
fn given_partial_file_when_loading_then_missing_fields_use_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("hotreload.json"),
        r#"{ "status": { "kind": "usb" }, "serial": "abc" }"#,
    )
    .unwrap();

    let config = HotReloadConfig::load(dir.path()).unwrap();

    assert_eq!(config.status.kind, ConnectionKind::Usb);
    assert_eq!(config.status.host, "127.0.0.1");
    assert_eq!(config.status.port, 8176);
    assert_eq!(config.serial, "abc");
    assert!(config.reply_to_ping);
}

/// **VALUE**: Verifies that broken JSON reports where it broke.
#[test]
fn given_invalid_json_when_loading_then_parse_error_has_position() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hotreload.json"), "{\n  \"version\": ,\n}").unwrap();

    let result = HotReloadConfig::load(dir.path());

    match result {
        Err(ConfigError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("Expected parse error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that each invalid field is rejected and named.
///
/// **BUG THIS CATCHES**: A zero failure limit would end every session on its first bad frame.
#[test]
fn given_invalid_fields_when_validating_then_field_is_named() {
    let cases: Vec<(HotReloadConfig, &str)> = vec![
        (
            HotReloadConfig {
                version: 0,
                ..HotReloadConfig::default()
            },
            "version",
        ),
        (
            HotReloadConfig {
                version: 2,
                ..HotReloadConfig::default()
            },
            "version",
        ),
        (
            HotReloadConfig {
                status: StatusConfig {
                    host: "  ".to_string(),
                    ..StatusConfig::default()
                },
                ..HotReloadConfig::default()
            },
            "status.host",
        ),
        (
            HotReloadConfig {
                status: StatusConfig {
                    port: 0,
                    ..StatusConfig::default()
                },
                ..HotReloadConfig::default()
            },
            "status.port",
        ),
        (
            HotReloadConfig {
                decode: DecodeConfig {
                    max_consecutive_failures: Some(0),
                },
                ..HotReloadConfig::default()
            },
            "decode.max_consecutive_failures",
        ),
        (
            HotReloadConfig {
                host_address: Some("localhost".to_string()),
                ..HotReloadConfig::default()
            },
            "host_address",
        ),
    ];

    for (config, expected) in cases {
        match config.validate() {
            Err(ConfigError::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("Expected validation error for {expected}, got {other:?}"),
        }
    }
}

#[test]
fn given_invalid_config_when_saving_then_nothing_is_written() {
    let dir = TempDir::new().unwrap();
    let config = HotReloadConfig {
        version: 9,
        ..HotReloadConfig::default()
    };

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("hotreload.json").exists());
}
