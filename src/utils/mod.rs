//! File helpers used around a rollover.
//!
//! ## Components
//!
//! - **Compression**: background gzip/zip jobs that the coordinator can wait on
//! - **Hashing**: streaming SHA-256 for the checksum header on uploads
//!
//! ```no_run
//! use log_archive_uploader::rollover::{CompressionMode, CompressionWaiter, WaitOutcome};
//! use log_archive_uploader::utils::compress::CompressionJob;
//!
//! # fn example() -> anyhow::Result<()> {
//! let job = CompressionJob::start("/var/log/app/app.2024-01-01.log", CompressionMode::Gz)?;
//! match CompressionWaiter::default().await_completion(Some(&*job)) {
//!     WaitOutcome::Ready => println!("Created {}", job.target().display()),
//!     other => println!("Compression ended as {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

/// Background compression of elapsed-period logs
pub mod compress;

/// Cryptographic hash calculation utilities
pub mod hash;
