//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log_archive_uploader::cloud::{ObjectHeaders, RemoteStore, RolloverListener};
use log_archive_uploader::config::{Tuning, UploadConfig};
use log_archive_uploader::StoreError;

pub const LOG_LINES: &str = "2024-01-01 00:00:01 INFO started\n2024-01-01 23:59:59 INFO stopping\n";

pub fn config() -> UploadConfig {
    UploadConfig {
        endpoint_url: "https://manta.example.com".to_string(),
        principal: "alice".to_string(),
        key_path: PathBuf::from("/home/alice/.ssh/id_rsa"),
        key_fingerprint: "SHA256:abc".to_string(),
        log_directory: "/alice/stor/logs/app".to_string(),
        max_retry_attempts: 3,
        durability_level: 2,
        tuning: Tuning {
            workers: 2,
            retry_delay_ms: 0,
            compression_poll_secs: 1,
            ..Tuning::default()
        },
    }
}

/// Write an elapsed-period log file and return its path.
pub fn rotated_log(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, LOG_LINES).unwrap();
    path
}

/// Remote store kept entirely in memory. Objects keep their bytes so tests
/// can inspect what was uploaded.
#[derive(Default)]
pub struct MemoryStore {
    directories: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<String, (Vec<u8>, ObjectHeaders)>>,
    failing_puts: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first_puts(count: usize) -> Self {
        let store = Self::default();
        *store.failing_puts.lock().unwrap() = count;
        store
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).map(|(bytes, _)| bytes.clone())
    }

    pub fn header(&self, path: &str, name: &str) -> Option<String> {
        self.objects.lock().unwrap().get(path).and_then(|(_, headers)| {
            headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        })
    }

    pub fn object_paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn directories(&self) -> Vec<String> {
        self.directories.lock().unwrap().iter().cloned().collect()
    }
}

impl RemoteStore for MemoryStore {
    fn put(&self, path: &str, local_file: &Path, headers: &ObjectHeaders) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_puts.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(StoreError::Http {
                    status: 503,
                    path: path.to_string(),
                    message: "ServiceUnavailable".to_string(),
                });
            }
        }

        let parent = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        if !parent.is_empty() && !self.directories.lock().unwrap().contains(parent) {
            return Err(StoreError::NotFound(parent.to_string()));
        }

        let bytes = fs::read(local_file)?;
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes, headers.clone()));
        Ok(())
    }

    fn probe(&self, path: &str) -> Result<(), StoreError> {
        if self.directories.lock().unwrap().contains(path) {
            Ok(())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        self.directories.lock().unwrap().insert(path.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingListener {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl CollectingListener {
    pub fn sorted_calls(&self) -> Vec<(String, String)> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl RolloverListener for CollectingListener {
    fn rolled_over(&self, local_filename: &str, remote_filename: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((local_filename.to_string(), remote_filename.to_string()));
    }
}
