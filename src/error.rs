//! Error types shared by the upload pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a [`RemoteStore`](crate::cloud::store::RemoteStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with its "does not exist" status.
    #[error("{0} not found on remote store")]
    NotFound(String),

    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("remote store returned {status} for {path}: {message}")]
    Http { status: u16, path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to sign request: {0}")]
    Signing(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors surfaced by configuration, upload and rollover coordination.
#[derive(Debug, Error)]
pub enum RolloverError {
    /// A required setting was missing, blank or malformed. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// Probing or creating a parent directory failed with something other
    /// than the expected not-found status.
    #[error("failed to provision remote directory {path}: {source}")]
    DirectoryProvision {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to upload {} to {remote}: {source}", local.display())]
    Upload {
        local: PathBuf,
        remote: String,
        #[source]
        source: StoreError,
    },

    #[error("unknown compression mode: {0}")]
    UnsupportedCompressionMode(String),

    #[error("gave up waiting for compression of {0}")]
    CompressionStalled(String),

    #[error("an upload for {0} is already in flight")]
    AlreadyInFlight(String),

    #[error("could not hand rollover to a background worker: {0}")]
    Submission(String),

    /// Something in the rollover flow panicked, for instance a listener.
    #[error("rollover of {filename} panicked: {message}")]
    Panicked { filename: String, message: String },
}

impl RolloverError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RolloverError::Configuration(message.into())
    }

    /// True for errors a retry could plausibly clear.
    pub fn is_upload_failure(&self) -> bool {
        matches!(
            self,
            RolloverError::Upload { .. } | RolloverError::DirectoryProvision { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RolloverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(StoreError::NotFound("/a".into()).is_not_found());
        assert!(!StoreError::Transport("reset".into()).is_not_found());
    }

    #[test]
    fn test_upload_failure_classification() {
        let upload = RolloverError::Upload {
            local: PathBuf::from("/tmp/app.log"),
            remote: "/u/stor/logs/app.log".into(),
            source: StoreError::Transport("timeout".into()),
        };
        assert!(upload.is_upload_failure());
        assert!(upload.to_string().contains("/tmp/app.log"));

        let config = RolloverError::configuration("missing");
        assert!(!config.is_upload_failure());
    }
}
