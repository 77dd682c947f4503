use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::error::{Result, RolloverError};

/// A configuration setting that can be overridden outside the config file.
///
/// Each setting has a process-level override key (set with `--set key=value`)
/// and an environment variable consulted as the last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub property: &'static str,
    pub env_var: &'static str,
    pub description: &'static str,
}

pub const MANTA_URL: Setting = Setting {
    property: "manta.url",
    env_var: "MANTA_URL",
    description: "Manta URL must be specified. It is typically a value like: \
                  https://us-east.manta.joyent.com",
};

pub const MANTA_USER: Setting = Setting {
    property: "manta.user",
    env_var: "MANTA_USER",
    description: "Manta user is the account name (or account/subuser) used to sign requests",
};

pub const MANTA_KEY_PATH: Setting = Setting {
    property: "manta.key_path",
    env_var: "MANTA_KEY_PATH",
    description: "Manta key path is the path to the private key used to sign requests",
};

pub const MANTA_KEY_ID: Setting = Setting {
    property: "manta.key_id",
    env_var: "MANTA_KEY_ID",
    description: "Manta key id is the fingerprint of the key used to sign requests",
};

pub const MANTA_LOG_DIRECTORY: Setting = Setting {
    property: "manta.log_directory",
    env_var: "MANTA_LOG_DIR",
    description: "Manta log directory is the remote directory rotated logs are copied to",
};

pub const MANTA_RETRY_ATTEMPTS: Setting = Setting {
    property: "manta.retry_attempts",
    env_var: "MANTA_RETRY_ATTEMPTS",
    description: "Retry attempts is the number of times to try copying a log to Manta",
};

pub const MANTA_DURABILITY_LEVEL: Setting = Setting {
    property: "manta.durability_level",
    env_var: "MANTA_DURABILITY_LEVEL",
    description: "Durability level is the number of copies Manta keeps of each log",
};

/// Every setting the uploader resolves, in bundle order.
pub const ALL_SETTINGS: [Setting; 7] = [
    MANTA_URL,
    MANTA_USER,
    MANTA_KEY_PATH,
    MANTA_KEY_ID,
    MANTA_LOG_DIRECTORY,
    MANTA_RETRY_ATTEMPTS,
    MANTA_DURABILITY_LEVEL,
];

type EnvSource = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves settings from an explicit value, then process-level overrides,
/// then the environment. The first non-blank value wins.
///
/// Results are never cached: callers may re-resolve the same setting with a
/// different explicit value.
pub struct ParameterResolver {
    overrides: HashMap<String, String>,
    env: EnvSource,
}

impl ParameterResolver {
    /// Resolver backed by the real process environment.
    pub fn new() -> Self {
        Self::with_env(|name| std::env::var(name).ok())
    }

    /// Resolver with a custom environment source.
    pub fn with_env<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            overrides: HashMap::new(),
            env: Box::new(env),
        }
    }

    /// Set a process-level override, keyed by the setting's property name.
    pub fn set_override(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(property.into(), value.into());
    }

    /// Parse a `key=value` pair as given on the command line.
    pub fn parse_override(&mut self, pair: &str) -> Result<()> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                self.set_override(key.trim(), value);
                Ok(())
            }
            _ => Err(RolloverError::configuration(format!(
                "invalid override '{}', expected key=value",
                pair
            ))),
        }
    }

    pub fn resolve(&self, explicit: Option<&str>, setting: &Setting) -> Result<String> {
        if let Some(value) = explicit.filter(|v| !is_blank(v)) {
            return Ok(value.to_string());
        }

        if let Some(value) = self.overrides.get(setting.property).filter(|v| !is_blank(v)) {
            return Ok(value.clone());
        }

        if let Some(value) = (self.env)(setting.env_var).filter(|v| !is_blank(v)) {
            return Ok(value);
        }

        let message = format!(
            "Environment variable {} or property {} not specified - {}",
            setting.env_var, setting.property, setting.description
        );
        debug!("{}", message);

        Err(RolloverError::Configuration(message))
    }
}

impl Default for ParameterResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParameterResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Absent, empty or whitespace-only.
pub fn is_blank(value: &str) -> bool {
    value.chars().all(char::is_whitespace)
}
