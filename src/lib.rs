//! # log-archive-uploader
//!
//! Ships rotated log archives to a Manta object store as part of log
//! rotation.
//!
//! ## Overview
//!
//! When a rotation policy closes a time period it hands the elapsed-period
//! file to a [`rollover::RolloverCoordinator`]. The coordinator waits for any
//! compression job still running on that file, works out the archive name,
//! and uploads it on a background worker with bounded retries. Retention
//! cleanup runs afterwards whether or not the upload succeeded, and the
//! logging path is never blocked.
//!
//! ## Features
//!
//! - **Layered configuration**: YAML file, then `--set` overrides, then
//!   environment variables
//! - **Idempotent directory provisioning** before every upload
//! - **Bounded retries** with the last failure surfaced to the caller
//! - **Compression-aware**: waits for gzip/zip jobs and honours cancellation
//! - **Worker pool** with panic isolation and join on shutdown
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use log_archive_uploader::cloud::{MantaStore, Uploader};
//! use log_archive_uploader::config::{ParameterResolver, UploadConfig, UploadSettings};
//! use log_archive_uploader::rollover::{
//!     BackgroundExecutor, CompressionMode, CompressionWaiter, RolloverCoordinator, RolloverEvent,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = UploadSettings::from_yaml_file(Path::new("log-archive-uploader.yaml"))?;
//! let config = UploadConfig::resolve(&settings, &ParameterResolver::new())?;
//!
//! let uploader = Uploader::new(&config, Arc::new(MantaStore::new(&config)?))?;
//! let coordinator = RolloverCoordinator::new(
//!     uploader,
//!     CompressionWaiter::from_tuning(&config.tuning),
//!     BackgroundExecutor::new(config.tuning.workers)?,
//! );
//!
//! let ticket = coordinator.rollover(RolloverEvent::new(
//!     "/var/log/app/app.2024-01-01.log",
//!     CompressionMode::None,
//! ))?;
//! println!("{:?}", ticket.wait().state());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Setting resolution and the resolved configuration bundle
//! - [`cloud`]: Remote store interface, Manta client, directory provisioning and uploads
//! - [`rollover`]: Compression wait, rollover state machine and worker pool
//! - [`utils`]: Compression jobs and hashing
//! - [`security`]: Credential scrubbing for logs and errors
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Remote store access and the uploader
pub mod cloud;

/// Setting resolution and configuration bundle
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Error types
pub mod error;

/// Rollover coordination and background execution
pub mod rollover;

/// Credential scrubbing
pub mod security;

/// Utility functions for compression and hashing
pub mod utils;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;

pub use error::{Result, RolloverError, StoreError};
