//! Test utilities for the upload pipeline
//!
//! In-memory stand-ins for the remote store, the rollover listener and a
//! compression job, plus a ready-made configuration.

#![cfg(test)]

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::cloud::store::{ObjectHeaders, RemoteStore};
use crate::cloud::uploader::RolloverListener;
use crate::config::{Tuning, UploadConfig};
use crate::error::StoreError;
use crate::rollover::compression::{CompressionHandle, WaitError};

/// A fully resolved configuration for principal `alice`.
pub fn test_config() -> UploadConfig {
    UploadConfig {
        endpoint_url: "https://manta.example.com".to_string(),
        principal: "alice".to_string(),
        key_path: PathBuf::from("/home/alice/.ssh/id_rsa"),
        key_fingerprint: "SHA256:abc".to_string(),
        log_directory: "/alice/stor/logs".to_string(),
        max_retry_attempts: 3,
        durability_level: 2,
        tuning: Tuning {
            retry_delay_ms: 0,
            ..Tuning::default()
        },
    }
}

#[derive(Debug, Clone)]
pub struct PutRecord {
    pub path: String,
    pub local_file: PathBuf,
    pub headers: ObjectHeaders,
}

#[derive(Default)]
struct StoreState {
    directories: HashSet<String>,
    probes: Vec<String>,
    created: Vec<String>,
    puts: Vec<PutRecord>,
    put_attempts: usize,
    put_failures: usize,
    fail_next_puts: usize,
    fail_all_puts: bool,
    create_failure: Option<u16>,
}

/// Remote store that keeps directories in memory and records every call.
#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<StoreState>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directories(directories: &[&str]) -> Self {
        let store = Self::new();
        store
            .state
            .lock()
            .unwrap()
            .directories
            .extend(directories.iter().map(|d| d.to_string()));
        store
    }

    pub fn fail_next_puts(&self, count: usize) {
        self.state.lock().unwrap().fail_next_puts = count;
    }

    pub fn fail_all_puts(&self) {
        self.state.lock().unwrap().fail_all_puts = true;
    }

    pub fn fail_creates_with(&self, status: u16) {
        self.state.lock().unwrap().create_failure = Some(status);
    }

    pub fn probes(&self) -> Vec<String> {
        self.state.lock().unwrap().probes.clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    /// Successful puts, in order.
    pub fn puts(&self) -> Vec<PutRecord> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn put_paths(&self) -> Vec<String> {
        self.puts().into_iter().map(|p| p.path).collect()
    }

    pub fn put_attempts(&self) -> usize {
        self.state.lock().unwrap().put_attempts
    }
}

impl RemoteStore for RecordingStore {
    fn put(&self, path: &str, local_file: &Path, headers: &ObjectHeaders) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.put_attempts += 1;

        if state.fail_all_puts || state.fail_next_puts > 0 {
            state.fail_next_puts = state.fail_next_puts.saturating_sub(1);
            state.put_failures += 1;
            return Err(StoreError::Transport(format!("put failure #{}", state.put_failures)));
        }

        state.puts.push(PutRecord {
            path: path.to_string(),
            local_file: local_file.to_path_buf(),
            headers: headers.clone(),
        });
        Ok(())
    }

    fn probe(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.probes.push(path.to_string());
        if state.directories.contains(path) {
            Ok(())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.create_failure {
            return Err(StoreError::Http {
                status,
                path: path.to_string(),
                message: "create refused".to_string(),
            });
        }
        state.directories.insert(path.to_string());
        state.created.push(path.to_string());
        Ok(())
    }
}

/// Listener that remembers every `(local, remote)` pair it was given.
#[derive(Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingListener {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RolloverListener for RecordingListener {
    fn rolled_over(&self, local_filename: &str, remote_filename: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((local_filename.to_string(), remote_filename.to_string()));
    }
}

/// Compression handle that replays scripted wait results.
///
/// Once the script runs out, waits keep timing out (or repeat the configured
/// result) until [`finish`](Self::finish) is called.
pub struct ScriptedHandle {
    script: Mutex<VecDeque<Result<(), WaitError>>>,
    repeat: Option<Result<(), WaitError>>,
    cancelled: AtomicBool,
    cancel_after: Option<usize>,
    finished: AtomicBool,
    waits: AtomicUsize,
}

impl ScriptedHandle {
    pub fn new(script: Vec<Result<(), WaitError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            cancelled: AtomicBool::new(false),
            cancel_after: None,
            finished: AtomicBool::new(false),
            waits: AtomicUsize::new(0),
        }
    }

    pub fn repeating(result: Result<(), WaitError>) -> Self {
        Self {
            repeat: Some(result),
            ..Self::new(Vec::new())
        }
    }

    pub fn cancelled() -> Self {
        let handle = Self::new(Vec::new());
        handle.cancelled.store(true, Ordering::SeqCst);
        handle
    }

    /// Report cancellation once `waits` waits have happened.
    pub fn cancel_after_waits(mut self, waits: usize) -> Self {
        self.cancel_after = Some(waits);
        self
    }

    /// Make every following wait succeed.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl CompressionHandle for ScriptedHandle {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.cancel_after, Some(n) if self.waits() >= n)
    }

    fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.finished.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        // Emulate a real bounded wait so callers polling in a loop do not spin.
        thread::sleep(timeout.min(Duration::from_millis(5)));
        self.repeat.clone().unwrap_or(Err(WaitError::TimedOut))
    }
}
