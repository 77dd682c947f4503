use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{GZ_SUFFIX, ZIP_SUFFIX};
use crate::error::RolloverError;
use crate::rollover::compression::CompressionHandle;

/// How the rotation policy compresses an archived log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMode {
    None,
    Gz,
    Zip,
}

impl CompressionMode {
    /// Suffix appended to the elapsed-period filename.
    pub fn suffix(&self) -> &'static str {
        match self {
            CompressionMode::None => "",
            CompressionMode::Gz => GZ_SUFFIX,
            CompressionMode::Zip => ZIP_SUFFIX,
        }
    }

    /// Infer the mode from a file name pattern the way rolling policies do:
    /// a pattern ending in `.gz` or `.zip` asks for compression.
    pub fn from_file_pattern(pattern: &str) -> Self {
        if pattern.ends_with(GZ_SUFFIX) {
            CompressionMode::Gz
        } else if pattern.ends_with(ZIP_SUFFIX) {
            CompressionMode::Zip
        } else {
            CompressionMode::None
        }
    }
}

impl FromStr for CompressionMode {
    type Err = RolloverError;

    /// Unknown names are an error, never a silent `None`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionMode::None),
            "gz" | "gzip" => Ok(CompressionMode::Gz),
            "zip" => Ok(CompressionMode::Zip),
            _ => Err(RolloverError::UnsupportedCompressionMode(s.to_string())),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMode::None => "none",
            CompressionMode::Gz => "gz",
            CompressionMode::Zip => "zip",
        };
        f.write_str(name)
    }
}

/// One rollover, as reported by the rotation policy.
#[derive(Clone)]
pub struct RolloverEvent {
    pub compression_mode: CompressionMode,
    pub elapsed_period_filename: String,
    pub compression: Option<Arc<dyn CompressionHandle>>,
}

impl RolloverEvent {
    pub fn new(elapsed_period_filename: impl Into<String>, compression_mode: CompressionMode) -> Self {
        Self {
            compression_mode,
            elapsed_period_filename: elapsed_period_filename.into(),
            compression: None,
        }
    }

    pub fn with_compression(mut self, handle: Arc<dyn CompressionHandle>) -> Self {
        self.compression = Some(handle);
        self
    }

    /// The name of the file that exists once compression has finished.
    pub fn archived_filename(&self) -> String {
        format!("{}{}", self.elapsed_period_filename, self.compression_mode.suffix())
    }
}

impl fmt::Debug for RolloverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RolloverEvent")
            .field("compression_mode", &self.compression_mode)
            .field("elapsed_period_filename", &self.elapsed_period_filename)
            .field("compression", &self.compression.is_some())
            .finish()
    }
}
