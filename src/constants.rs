//! Global constants for the log archive uploader.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

use std::time::Duration;

// Buffer sizes
/// Buffer size for streaming file reads during hashing and compression (1MB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

// Remote store constants
/// Default connection and request timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// HTTP header carrying the replication hint
pub const DURABILITY_LEVEL_HEADER: &str = "durability-level";

/// Object metadata header carrying the SHA-256 of the uploaded file
pub const CONTENT_SHA256_HEADER: &str = "m-sha256";

/// Content type Manta uses to mark a directory entry
pub const DIRECTORY_CONTENT_TYPE: &str = "application/json; type=directory";

/// Content type for uploaded archives
pub const OBJECT_CONTENT_TYPE: &str = "application/octet-stream";

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("log-archive-uploader/", env!("CARGO_PKG_VERSION"));

// Retry constants
/// Default number of upload attempts when none is configured
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default durability level when none is configured
pub const DEFAULT_DURABILITY_LEVEL: u32 = 2;

/// Base retry delay in milliseconds, multiplied by the attempt number
pub const RETRY_BASE_DELAY_MS: u64 = 250;

// Compression wait constants
/// How long a single wait on a compression job may block
pub const COMPRESSION_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the total time spent waiting for one compression job
pub const COMPRESSION_MAX_TOTAL_WAIT: Duration = Duration::from_secs(60 * 60);

/// Consecutive failed waits after which a compression job is considered stuck
pub const COMPRESSION_MAX_CONSECUTIVE_FAILURES: u32 = 5;

// Worker pool constants
/// Thread name prefix for upload workers
pub const WORKER_THREAD_PREFIX: &str = "rollover-upload";

/// Upper bound on the default worker count
pub const MAX_DEFAULT_WORKERS: usize = 4;

/// Pending rollovers the worker queue holds before rejecting submissions
pub const WORKER_QUEUE_CAPACITY: usize = 64;

// File suffixes
pub const GZ_SUFFIX: &str = ".gz";
pub const ZIP_SUFFIX: &str = ".zip";

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "log-archive-uploader.yaml";
