//! Integration tests for configuration resolution.
//!
//! Settings come from a YAML file, `--set` style overrides and an
//! environment source, in that order of precedence.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::TempDir;

use log_archive_uploader::config::{ParameterResolver, UploadConfig, UploadSettings, ALL_SETTINGS};
use log_archive_uploader::RolloverError;

fn env_from(pairs: &[(&str, &str)]) -> ParameterResolver {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ParameterResolver::with_env(move |name| vars.get(name).cloned())
}

/// A partial YAML file is completed from overrides and the environment
#[test]
fn test_yaml_overrides_and_environment_combine() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("uploader.yaml");
    fs::write(
        &path,
        r#"
url: "https://manta.example.com/"
user: "alice/ops"
log_directory: "alice/stor/logs/"
tuning:
  workers: 3
"#,
    )?;

    let settings = UploadSettings::from_yaml_file(&path)?;
    let mut resolver = env_from(&[
        ("MANTA_KEY_PATH", "/etc/uploader/signing.pem"),
        ("MANTA_KEY_ID", "SHA256:fromenv"),
        ("MANTA_RETRY_ATTEMPTS", "9"),
        ("MANTA_DURABILITY_LEVEL", "1"),
    ]);
    resolver.parse_override("manta.retry_attempts=4")?;
    resolver.parse_override("manta.url=https://ignored.example.com")?;

    let config = UploadConfig::resolve(&settings, &resolver)?;

    assert_eq!(config.endpoint_url, "https://manta.example.com");
    assert_eq!(config.principal, "alice/ops");
    assert_eq!(config.key_path, PathBuf::from("/etc/uploader/signing.pem"));
    assert_eq!(config.key_fingerprint, "SHA256:fromenv");
    assert_eq!(config.log_directory, "/alice/stor/logs");
    assert_eq!(config.max_retry_attempts, 4);
    assert_eq!(config.durability_level, 1);
    assert_eq!(config.tuning.workers, 3);
    Ok(())
}

/// The first missing setting is reported by both of its lookup keys
#[test]
fn test_missing_setting_names_override_and_variable() -> Result<()> {
    let settings = UploadSettings {
        url: Some("https://manta.example.com".to_string()),
        user: Some("alice".to_string()),
        ..UploadSettings::default()
    };

    let err = UploadConfig::resolve(&settings, &env_from(&[])).unwrap_err();
    match err {
        RolloverError::Configuration(message) => {
            assert!(message.contains("MANTA_KEY_PATH"), "{}", message);
            assert!(message.contains("manta.key_path"), "{}", message);
        }
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

/// Every setting can be supplied purely through the environment
#[test]
fn test_environment_only_configuration() -> Result<()> {
    let resolver = env_from(&[
        ("MANTA_URL", "https://manta.example.com"),
        ("MANTA_USER", "alice"),
        ("MANTA_KEY_PATH", "/keys/id_rsa"),
        ("MANTA_KEY_ID", "aa:bb:cc"),
        ("MANTA_LOG_DIR", "/alice/stor/logs"),
        ("MANTA_RETRY_ATTEMPTS", "3"),
        ("MANTA_DURABILITY_LEVEL", "2"),
    ]);

    let config = UploadConfig::resolve(&UploadSettings::default(), &resolver)?;
    assert_eq!(config.max_retry_attempts, 3);
    assert_eq!(config.log_directory, "/alice/stor/logs");
    Ok(())
}

/// Each known setting resolves from its own override key
#[test]
fn test_every_setting_has_a_distinct_override_key() -> Result<()> {
    let mut resolver = env_from(&[]);
    for setting in ALL_SETTINGS.iter() {
        resolver.set_override(setting.property, format!("value-of-{}", setting.env_var));
    }

    for setting in ALL_SETTINGS.iter() {
        assert_eq!(
            resolver.resolve(None, setting)?,
            format!("value-of-{}", setting.env_var)
        );
    }
    Ok(())
}

/// The generated template is valid YAML that loads back unchanged
#[test]
fn test_template_written_by_init_config_loads() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("nested").join("uploader.yaml");

    UploadSettings::template().save_to_yaml_file(&path)?;
    let loaded = UploadSettings::from_yaml_file(&path)?;

    assert_eq!(loaded, UploadSettings::template());
    Ok(())
}
