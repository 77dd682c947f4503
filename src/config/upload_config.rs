use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::params::{
    ParameterResolver, Setting, MANTA_DURABILITY_LEVEL, MANTA_KEY_ID, MANTA_KEY_PATH,
    MANTA_LOG_DIRECTORY, MANTA_RETRY_ATTEMPTS, MANTA_URL, MANTA_USER,
};
use crate::constants::{
    COMPRESSION_MAX_CONSECUTIVE_FAILURES, COMPRESSION_MAX_TOTAL_WAIT, COMPRESSION_POLL_TIMEOUT,
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_DURABILITY_LEVEL, DEFAULT_RETRY_ATTEMPTS,
    MAX_DEFAULT_WORKERS, RETRY_BASE_DELAY_MS,
};
use crate::error::{Result, RolloverError};
use crate::security::credential_scrubber::scrub_path;

/// Raw, explicitly supplied settings as they appear in the YAML file.
///
/// Every remote-store field is optional here; missing values are filled in by
/// [`ParameterResolver`] when the settings are turned into an [`UploadConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub log_directory: Option<String>,
    #[serde(default)]
    pub retry_attempts: Option<String>,
    #[serde(default)]
    pub durability_level: Option<String>,
    #[serde(default)]
    pub tuning: Tuning,
}

/// Knobs that have sensible defaults and are never looked up in the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tuning {
    pub workers: usize,
    pub retry_delay_ms: u64,
    pub connection_timeout_secs: u64,
    pub compression_poll_secs: u64,
    /// Zero disables the limit.
    pub compression_max_wait_secs: u64,
    pub compression_max_failures: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            workers: std::cmp::min(num_cpus::get(), MAX_DEFAULT_WORKERS),
            retry_delay_ms: RETRY_BASE_DELAY_MS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            compression_poll_secs: COMPRESSION_POLL_TIMEOUT.as_secs(),
            compression_max_wait_secs: COMPRESSION_MAX_TOTAL_WAIT.as_secs(),
            compression_max_failures: COMPRESSION_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl Tuning {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn compression_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.compression_poll_secs)
    }

    pub fn compression_max_wait(&self) -> Option<Duration> {
        (self.compression_max_wait_secs > 0)
            .then(|| Duration::from_secs(self.compression_max_wait_secs))
    }
}

impl UploadSettings {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let settings: UploadSettings = serde_yaml::from_str(&content)
            .context(format!("Failed to parse YAML config: {}", path.display()))?;

        debug!("Loaded upload settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize settings to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::write(path, yaml).context(format!("Failed to write config file: {}", path.display()))?;
        info!("Wrote settings template to {}", path.display());
        Ok(())
    }

    /// A template with placeholder values, used by `init-config`.
    pub fn template() -> Self {
        Self {
            url: Some("https://us-east.manta.joyent.com".to_string()),
            user: Some("myaccount".to_string()),
            key_path: Some("~/.ssh/id_rsa".to_string()),
            key_id: Some("SHA256:replace-with-your-key-fingerprint".to_string()),
            log_directory: Some("/myaccount/stor/logs".to_string()),
            retry_attempts: Some(DEFAULT_RETRY_ATTEMPTS.to_string()),
            durability_level: Some(DEFAULT_DURABILITY_LEVEL.to_string()),
            tuning: Tuning::default(),
        }
    }
}

/// The fully resolved, immutable configuration bundle.
#[derive(Clone, PartialEq)]
pub struct UploadConfig {
    pub endpoint_url: String,
    pub principal: String,
    pub key_path: PathBuf,
    pub key_fingerprint: String,
    pub log_directory: String,
    pub max_retry_attempts: u32,
    pub durability_level: u32,
    pub tuning: Tuning,
}

impl UploadConfig {
    /// Resolve every field of the bundle. Fails on the first missing or
    /// malformed setting; nothing is attempted against the remote store.
    pub fn resolve(settings: &UploadSettings, resolver: &ParameterResolver) -> Result<Self> {
        let endpoint_url = resolver.resolve(settings.url.as_deref(), &MANTA_URL)?;
        let principal = resolver.resolve(settings.user.as_deref(), &MANTA_USER)?;
        let key_path = resolver.resolve(settings.key_path.as_deref(), &MANTA_KEY_PATH)?;
        let key_fingerprint = resolver.resolve(settings.key_id.as_deref(), &MANTA_KEY_ID)?;
        let log_directory =
            resolver.resolve(settings.log_directory.as_deref(), &MANTA_LOG_DIRECTORY)?;
        let attempts = resolver.resolve(settings.retry_attempts.as_deref(), &MANTA_RETRY_ATTEMPTS)?;
        let durability =
            resolver.resolve(settings.durability_level.as_deref(), &MANTA_DURABILITY_LEVEL)?;

        if settings.tuning.workers == 0 {
            return Err(RolloverError::configuration("tuning.workers must be at least 1"));
        }

        Ok(Self {
            endpoint_url: endpoint_url.trim().trim_end_matches('/').to_string(),
            principal: principal.trim().to_string(),
            key_path: expand_home(key_path.trim()),
            key_fingerprint: key_fingerprint.trim().to_string(),
            log_directory: normalize_remote_dir(&log_directory),
            max_retry_attempts: parse_positive(&attempts, &MANTA_RETRY_ATTEMPTS)?,
            durability_level: parse_positive(&durability, &MANTA_DURABILITY_LEVEL)?,
            tuning: settings.tuning.clone(),
        })
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("principal", &self.principal)
            .field("key_path", &scrub_path(&self.key_path.to_string_lossy()))
            .field("key_fingerprint", &"<redacted>")
            .field("log_directory", &self.log_directory)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .field("durability_level", &self.durability_level)
            .field("tuning", &self.tuning)
            .finish()
    }
}

fn parse_positive(raw: &str, setting: &Setting) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(RolloverError::Configuration(format!(
            "{} ({} / {}) must be a positive integer, got '{}'",
            setting.property,
            setting.env_var,
            setting.description,
            raw.trim()
        ))),
    }
}

/// Absolute, no trailing slash.
fn normalize_remote_dir(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}
