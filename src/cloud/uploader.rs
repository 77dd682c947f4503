use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::cloud::directories::ensure_directories;
use crate::cloud::manta::MantaStore;
use crate::cloud::store::{ObjectHeaders, RemoteStore};
use crate::config::{is_blank, ParameterResolver, Tuning, UploadConfig, UploadSettings};
use crate::constants::{CONTENT_SHA256_HEADER, DURABILITY_LEVEL_HEADER};
use crate::error::{Result, RolloverError, StoreError};
use crate::utils::hash::calculate_sha256;

/// Receives a callback each time a rotated log has been stored remotely.
///
/// Called at most once per successful upload, from whichever worker thread
/// performed it. Calls for different files may run concurrently.
pub trait RolloverListener: Send + Sync {
    fn rolled_over(&self, local_filename: &str, remote_filename: &str);
}

impl<F> RolloverListener for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn rolled_over(&self, local_filename: &str, remote_filename: &str) {
        self(local_filename, remote_filename)
    }
}

/// One local file headed for one remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    local_path: PathBuf,
    remote_directory: String,
    durability_level: u32,
}

impl UploadTask {
    pub fn new(
        local_path: impl Into<PathBuf>,
        remote_directory: impl Into<String>,
        durability_level: u32,
    ) -> Result<Self> {
        let local_path = local_path.into();
        let has_name = local_path
            .file_name()
            .map(|name| !is_blank(&name.to_string_lossy()))
            .unwrap_or(false);

        if !has_name {
            return Err(RolloverError::Configuration(format!(
                "cannot upload '{}': it does not name a file",
                local_path.display()
            )));
        }

        Ok(Self {
            local_path,
            remote_directory: remote_directory.into(),
            durability_level,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_directory(&self) -> &str {
        &self.remote_directory
    }

    pub fn durability_level(&self) -> u32 {
        self.durability_level
    }

    /// `remote_directory/basename(local_path)`, recomputed on every call.
    pub fn remote_filename(&self) -> String {
        let name = self
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", self.remote_directory.trim_end_matches('/'), name)
    }
}

/// What a successful upload left on the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub size: u64,
    pub durability_level: u32,
    pub sha256: String,
}

/// Bookkeeping for a single `upload_with_retry` call.
struct RetryState {
    attempts_made: u32,
    max_attempts: u32,
    last_error: Option<RolloverError>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            last_error: None,
        }
    }

    fn exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Copies rotated log archives to the remote store.
pub struct Uploader {
    store: Arc<dyn RemoteStore>,
    listener: Option<Arc<dyn RolloverListener>>,
    log_directory: String,
    durability_level: u32,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Uploader {
    /// Build an uploader from a resolved configuration bundle.
    ///
    /// A zero retry budget is a configuration error reported here, before any
    /// upload is attempted.
    pub fn new(config: &UploadConfig, store: Arc<dyn RemoteStore>) -> Result<Self> {
        if config.max_retry_attempts == 0 {
            return Err(RolloverError::configuration(
                "max retry attempts must be a positive integer",
            ));
        }
        if is_blank(&config.log_directory) {
            return Err(RolloverError::configuration("remote log directory must not be blank"));
        }

        Ok(Self {
            store,
            listener: None,
            log_directory: config.log_directory.clone(),
            durability_level: config.durability_level,
            max_attempts: config.max_retry_attempts,
            retry_delay: config.tuning.retry_delay(),
        })
    }

    /// Legacy positional constructor. Every argument is a raw string that is
    /// resolved like any other setting, then the canonical constructor runs.
    #[deprecated(note = "build an UploadConfig and call Uploader::new")]
    #[allow(clippy::too_many_arguments)]
    pub fn from_positional(
        url: &str,
        user: &str,
        key_path: &str,
        key_fingerprint: &str,
        log_directory: &str,
        retry_attempts: &str,
        durability_level: &str,
    ) -> Result<Self> {
        let settings = UploadSettings {
            url: Some(url.to_string()),
            user: Some(user.to_string()),
            key_path: Some(key_path.to_string()),
            key_id: Some(key_fingerprint.to_string()),
            log_directory: Some(log_directory.to_string()),
            retry_attempts: Some(retry_attempts.to_string()),
            durability_level: Some(durability_level.to_string()),
            tuning: Tuning::default(),
        };
        let config = UploadConfig::resolve(&settings, &ParameterResolver::new())?;
        let store = MantaStore::new(&config).map_err(|source| {
            RolloverError::Configuration(format!("unable to create Manta client: {}", source))
        })?;

        Self::new(&config, Arc::new(store))
    }

    pub fn with_listener(mut self, listener: Arc<dyn RolloverListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A task for `local_path` aimed at the configured log directory.
    pub fn task_for(&self, local_path: impl Into<PathBuf>) -> Result<UploadTask> {
        UploadTask::new(local_path, self.log_directory.clone(), self.durability_level)
    }

    /// A single upload attempt.
    ///
    /// Provisions the remote directory, streams the file with the durability
    /// and checksum headers, then notifies the listener.
    pub fn upload(&self, task: &UploadTask) -> Result<RemoteObject> {
        let remote_path = task.remote_filename();
        let upload_error = |source: StoreError| RolloverError::Upload {
            local: task.local_path.clone(),
            remote: remote_path.clone(),
            source,
        };

        info!("Rolling log archive over to {}", remote_path);
        let start_time = Instant::now();

        ensure_directories(self.store.as_ref(), &task.remote_directory)?;

        let digest = calculate_sha256(&task.local_path).map_err(|e| upload_error(e.into()))?;

        let headers: ObjectHeaders = vec![
            (DURABILITY_LEVEL_HEADER.to_string(), task.durability_level.to_string()),
            (CONTENT_SHA256_HEADER.to_string(), digest.sha256.clone()),
        ];

        self.store
            .put(&remote_path, &task.local_path, &headers)
            .map_err(upload_error)?;

        debug!(
            "Uploaded {} ({} bytes) to {} in {:?}",
            task.local_path.display(),
            digest.size,
            remote_path,
            start_time.elapsed()
        );

        if let Some(listener) = &self.listener {
            listener.rolled_over(&task.local_path.to_string_lossy(), &remote_path);
        }

        Ok(RemoteObject {
            remote_path,
            local_path: task.local_path.clone(),
            size: digest.size,
            durability_level: task.durability_level,
            sha256: digest.sha256,
        })
    }

    /// Attempt the upload up to the configured number of times.
    ///
    /// Blocks the calling thread across all attempts. Intermediate failures
    /// are logged; if every attempt fails the last failure is returned.
    pub fn upload_with_retry(&self, task: &UploadTask) -> Result<RemoteObject> {
        let mut state = RetryState::new(self.max_attempts);

        while !state.exhausted() {
            state.attempts_made += 1;

            match self.upload(task) {
                Ok(object) => {
                    if state.attempts_made > 1 {
                        info!(
                            "Uploaded {} on attempt {}/{}",
                            task.local_path.display(),
                            state.attempts_made,
                            state.max_attempts
                        );
                    }
                    return Ok(object);
                }
                Err(e) => {
                    if !state.exhausted() {
                        let delay = self.retry_delay * state.attempts_made;
                        warn!(
                            "Error copying {} to remote store, retrying {}/{} in {:?}: {}",
                            task.local_path.display(),
                            state.attempts_made,
                            state.max_attempts,
                            delay,
                            e
                        );
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    state.last_error = Some(e);
                }
            }
        }

        Err(state.last_error.unwrap_or_else(|| {
            RolloverError::configuration("max retry attempts must be a positive integer")
        }))
    }
}
