use std::path::Path;
use std::sync::Arc;

use crate::error::StoreError;

/// Headers sent along with an uploaded object.
pub type ObjectHeaders = Vec<(String, String)>;

/// The operations the upload pipeline needs from an object store.
///
/// Implementations are shared read-only across worker threads and are
/// expected to enforce their own I/O timeouts.
pub trait RemoteStore: Send + Sync {
    /// Store the contents of `local_file` at `path`.
    fn put(&self, path: &str, local_file: &Path, headers: &ObjectHeaders) -> Result<(), StoreError>;

    /// Check that `path` exists. Must return [`StoreError::NotFound`] for a
    /// missing entry so callers can tell it apart from other failures.
    fn probe(&self, path: &str) -> Result<(), StoreError>;

    fn create_directory(&self, path: &str) -> Result<(), StoreError>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    fn put(&self, path: &str, local_file: &Path, headers: &ObjectHeaders) -> Result<(), StoreError> {
        (**self).put(path, local_file, headers)
    }

    fn probe(&self, path: &str) -> Result<(), StoreError> {
        (**self).probe(path)
    }

    fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        (**self).create_directory(path)
    }
}
