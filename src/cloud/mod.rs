//! Remote object storage for rotated log archives.
//!
//! This module holds everything that talks to the remote store: the store
//! abstraction, the Manta client, directory provisioning and the uploader
//! with its retry loop.
//!
//! ## Upload sequence
//!
//! ```text
//! ┌──────────────┐    ┌────────────────────┐    ┌──────────────┐
//! │ UploadTask   │───▶│ ensure_directories │───▶│ RemoteStore  │
//! └──────────────┘    └────────────────────┘    │   .put()     │
//!                                               └──────┬───────┘
//!                                                      │
//!                                             ┌────────▼────────┐
//!                                             │ RolloverListener│
//!                                             └─────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use log_archive_uploader::cloud::{MantaStore, Uploader};
//! use log_archive_uploader::config::{ParameterResolver, UploadConfig, UploadSettings};
//!
//! # fn example() -> anyhow::Result<()> {
//! let settings = UploadSettings::from_yaml_file(Path::new("uploader.yaml"))?;
//! let config = UploadConfig::resolve(&settings, &ParameterResolver::new())?;
//! let store = Arc::new(MantaStore::new(&config)?);
//!
//! let uploader = Uploader::new(&config, store)?;
//! let task = uploader.task_for("/var/log/app/app.2024-01-01.log.gz")?;
//! let object = uploader.upload_with_retry(&task)?;
//! println!("stored at {}", object.remote_path);
//! # Ok(())
//! # }
//! ```

/// Remote store abstraction
pub mod store;

/// Manta HTTP client with request signing
pub mod manta;

/// Idempotent remote directory provisioning
pub mod directories;

/// Single-attempt and retrying uploads
pub mod uploader;

pub use directories::ensure_directories;
pub use manta::MantaStore;
pub use store::{ObjectHeaders, RemoteStore};
pub use uploader::{RemoteObject, RolloverListener, UploadTask, Uploader};
