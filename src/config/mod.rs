//! Configuration for the upload pipeline.
//!
//! Settings come from three places, strictly in this order: an explicit value
//! (YAML file or builder), a process-level override (`--set key=value`), and
//! finally the environment.

pub mod params;
pub mod upload_config;

pub use params::{is_blank, ParameterResolver, Setting, ALL_SETTINGS};
pub use upload_config::{Tuning, UploadConfig, UploadSettings};
