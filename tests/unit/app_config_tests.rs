/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use readalong::app_config::{BackendConfig, BackendKind, Config, LogLevel};
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.chapters.min_length, 500);
    assert!(config.chapters.case_insensitive);
    assert!(!config.chapters.stop_on_backwards_numbering);
    assert_eq!(config.pacing.sentence_pause, 0.3);
    assert_eq!(config.pacing.paragraph_pause, 0.8);
    assert!(config.resume.enabled);
    assert!(config.cleaning.enabled);
    assert_eq!(config.synthesis.retry_count, 3);
    assert_eq!(config.synthesis.retry_backoff_ms, 1000);
    assert_eq!(config.synthesis.silence_secs, 0.5);
    assert_eq!(config.synthesis.backends[0].kind, BackendKind::Http);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    config.chapters.patterns = vec!["(unclosed".to_string()];
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.pacing.sentence_pause = -0.1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.silence_secs = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.backends = vec![];
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.backends[0].endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
}

/// Test that a partial JSON file is completed with defaults
#[test]
fn test_from_file_withPartialJson_shouldFillDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "readalong.json",
        r#"{ "chapters": { "min_length": 42 }, "synthesis": { "backends": [ { "type": "command", "program": "say" } ] } }"#,
    )?;

    let config = Config::from_file(&path)?;
    assert_eq!(config.chapters.min_length, 42);
    assert_eq!(config.chapters.patterns.len(), 3);
    assert_eq!(config.synthesis.backends.len(), 1);
    assert_eq!(config.synthesis.backends[0].kind, BackendKind::Command);
    assert_eq!(config.synthesis.backends[0].program, "say");
    assert_eq!(config.pacing.paragraph_pause, 0.8);
    Ok(())
}

/// Test saving and loading a configuration file
#[test]
fn test_save_then_load_shouldPreserveSettings() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("readalong.json");

    let mut config = Config::default();
    config.pacing.sentence_pause = 0.45;
    config.log_level = LogLevel::Debug;
    config.save(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.pacing.sentence_pause, 0.45);
    assert_eq!(loaded.log_level, LogLevel::Debug);
    Ok(())
}

/// Test backend preference reordering
#[test]
fn test_prefer_backend_shouldMoveKindToFront() {
    let mut config = Config::default();
    config.prefer_backend(BackendKind::Command);
    assert_eq!(config.synthesis.backends[0].kind, BackendKind::Command);
    assert_eq!(config.synthesis.backends.len(), 2);

    config.synthesis.backends = vec![BackendConfig::new(BackendKind::Http)];
    config.prefer_backend(BackendKind::Command);
    assert_eq!(config.backends_of(BackendKind::Command).len(), 1);
    assert_eq!(config.synthesis.backends[1].kind, BackendKind::Http);
}
