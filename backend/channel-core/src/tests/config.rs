use crate::config::{ChannelConfig, DEFAULT_TRUSTED_ORIGIN, RetryStrategy};
use crate::error::ConfigError;

use std::fs;

use tempfile::TempDir;

#[test]
fn given_no_config_file_when_loaded_then_returns_defaults() {
    // GIVEN: An empty config dir
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = ChannelConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config, ChannelConfig::default());
    assert_eq!(config.trusted_origin, DEFAULT_TRUSTED_ORIGIN);
    assert_eq!(config.trusted_origin, "http://localhost:3000");
    assert_eq!(config.retry.strategy, RetryStrategy::Exponential);
}

/// **VALUE**: Verifies a saved config loads back identically.
///
/// **WHY THIS MATTERS**: `save` writes through a temp file and rename. If the rename
/// targeted the wrong name, `load` would silently fall back to defaults and the
/// host would trust the wrong origin.
#[test]
fn given_saved_config_when_loaded_then_values_survive() {
    // GIVEN: A customised config on disk
    let dir = TempDir::new().unwrap();
    let mut config = ChannelConfig::default();
    config.trusted_origin = String::from("https://app.example.com");
    config.session_id_prefix = String::from("embed");
    config.retry.strategy = RetryStrategy::Fixed;
    config.retry.max_attempts = Some(5);
    config.save(dir.path()).unwrap();

    // WHEN: Loading
    let loaded = ChannelConfig::load(dir.path()).unwrap();

    // THEN: Same values, no temp file left behind
    assert_eq!(loaded, config);
    assert!(dir.path().join("portbridge.json").exists());
    assert!(!dir.path().join("portbridge.json.tmp").exists());
}

#[test]
fn given_partial_json_when_loaded_then_missing_fields_default() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("portbridge.json"),
        r#"{ "trusted_origin": "http://127.0.0.1:8080", "retry": { "strategy": "fixed" } }"#,
    )
    .unwrap();

    let config = ChannelConfig::load(dir.path()).unwrap();

    assert_eq!(config.trusted_origin, "http://127.0.0.1:8080");
    assert_eq!(config.retry.strategy, RetryStrategy::Fixed);
    assert_eq!(config.retry.initial_interval_ms, 50);
    assert_eq!(config.stale_history, 8);
}

#[test]
fn given_invalid_json_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("portbridge.json"), "{ not json").unwrap();

    let result = ChannelConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies a wildcard trusted origin is refused at load time.
///
/// **WHY THIS MATTERS**: `*` would make the child accept handshakes from any page,
/// which is exactly the hijack the origin check exists to prevent.
#[test]
fn given_wildcard_trusted_origin_when_validated_then_rejected() {
    // GIVEN: A config trusting everything
    let mut config = ChannelConfig::default();
    config.trusted_origin = String::from("*");

    // WHEN: Validating
    let result = config.validate();

    // THEN: Validation error naming the field
    match result {
        Err(ConfigError::ValidationError { reason, .. }) => {
            assert!(reason.contains("trusted_origin"));
        }
        other => panic!("Expected ValidationError, got {other:?}"),
    }
}

#[test]
fn given_bad_retry_values_when_validated_then_rejected() {
    let mut zero_interval = ChannelConfig::default();
    zero_interval.retry.initial_interval_ms = 0;

    let mut inverted = ChannelConfig::default();
    inverted.retry.initial_interval_ms = 500;
    inverted.retry.max_interval_ms = 100;

    let mut shrinking = ChannelConfig::default();
    shrinking.retry.multiplier = 0.5;

    let mut jitter = ChannelConfig::default();
    jitter.retry.randomization_factor = 1.5;

    for config in [zero_interval, inverted, shrinking, jitter] {
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "Expected rejection for {config:?}"
        );
    }
}

#[test]
fn given_empty_prefix_or_unknown_version_when_validated_then_rejected() {
    let mut empty_prefix = ChannelConfig::default();
    empty_prefix.session_id_prefix = String::new();

    let mut future_version = ChannelConfig::default();
    future_version.version = 99;

    assert!(empty_prefix.validate().is_err());
    assert!(future_version.validate().is_err());
}

#[test]
fn given_trusted_origin_with_path_when_parsed_then_reduced_to_origin() {
    let mut config = ChannelConfig::default();
    config.trusted_origin = String::from("http://localhost:3000/app/index.html");

    let origin = config.trusted_origin().unwrap();

    assert_eq!(origin.as_str(), "http://localhost:3000");
}
