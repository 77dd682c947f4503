use log::{debug, info};

use crate::cloud::store::RemoteStore;
use crate::error::{Result, RolloverError};

/// Ensure every segment of `remote_path` exists on the store.
///
/// Prefixes are probed in order (`/a`, `/a/b`, `/a/b/c`); a prefix that
/// probes as not-found is created. Any other probe or create error is
/// returned as [`RolloverError::DirectoryProvision`] without retrying, so the
/// call is safe to repeat before every upload.
pub fn ensure_directories<S: RemoteStore + ?Sized>(store: &S, remote_path: &str) -> Result<()> {
    for prefix in cumulative_prefixes(remote_path) {
        match store.probe(&prefix) {
            Ok(()) => debug!("Remote directory {} exists", prefix),
            Err(e) if e.is_not_found() => {
                info!("Creating directory on remote store: {}", prefix);
                store
                    .create_directory(&prefix)
                    .map_err(|source| RolloverError::DirectoryProvision {
                        path: prefix.clone(),
                        source,
                    })?;
            }
            Err(source) => {
                return Err(RolloverError::DirectoryProvision {
                    path: prefix,
                    source,
                })
            }
        }
    }

    Ok(())
}

/// `/a//b/c/` yields `/a`, `/a/b`, `/a/b/c`.
pub fn cumulative_prefixes(remote_path: &str) -> Vec<String> {
    let mut current = String::with_capacity(remote_path.len());
    remote_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            current.push('/');
            current.push_str(segment);
            current.clone()
        })
        .collect()
}
