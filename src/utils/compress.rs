use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use zip::{write::FileOptions, ZipWriter};

use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::rollover::compression::{CompressionHandle, WaitError};
use crate::rollover::event::CompressionMode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobState {
    Running,
    Finished,
    Cancelled,
    Failed(String),
}

struct Shared {
    state: Mutex<JobState>,
    done: Condvar,
    cancelled: AtomicBool,
}

impl Shared {
    fn set(&self, next: JobState) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = next;
        self.done.notify_all();
    }
}

/// Compresses one elapsed-period log on its own thread.
///
/// Writes `<source><suffix>` and removes the source once the archive is
/// complete, the way rotating appenders leave only the compressed file
/// behind. Cancelling stops the copy between chunks and deletes the partial
/// archive. A cancel that arrives after the archive is complete is ignored.
pub struct CompressionJob {
    source: PathBuf,
    target: PathBuf,
    shared: Arc<Shared>,
}

impl CompressionJob {
    pub fn start(source: impl Into<PathBuf>, mode: CompressionMode) -> Result<Arc<Self>> {
        let source = source.into();
        if mode == CompressionMode::None {
            bail!("no compression requested for {}", source.display());
        }
        let target = PathBuf::from(format!("{}{}", source.display(), mode.suffix()));

        let shared = Arc::new(Shared {
            state: Mutex::new(JobState::Running),
            done: Condvar::new(),
            cancelled: AtomicBool::new(false),
        });

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let worker_shared = Arc::clone(&shared);
        let worker_source = source.clone();
        let worker_target = target.clone();

        thread::Builder::new()
            .name(format!("compress-{}", name))
            .spawn(move || {
                let start = Instant::now();
                match compress_file(&worker_source, &worker_target, mode, &worker_shared.cancelled) {
                    Ok(true) => {
                        info!(
                            "Compressed {} to {} in {:?}",
                            worker_source.display(),
                            worker_target.display(),
                            start.elapsed()
                        );
                        worker_shared.set(JobState::Finished);
                    }
                    Ok(false) => {
                        debug!("Compression of {} cancelled", worker_source.display());
                        let _ = fs::remove_file(&worker_target);
                        worker_shared.set(JobState::Cancelled);
                    }
                    Err(e) => {
                        warn!("Compression of {} failed: {:#}", worker_source.display(), e);
                        let _ = fs::remove_file(&worker_target);
                        worker_shared.set(JobState::Failed(format!("{:#}", e)));
                    }
                }
            })
            .context("Failed to spawn compression thread")?;

        Ok(Arc::new(Self {
            source,
            target,
            shared,
        }))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Where the compressed archive is written.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Ask the worker to stop. No effect once the job has ended.
    pub fn cancel(&self) {
        let state = self.shared.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == JobState::Running {
            self.shared.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

impl CompressionHandle for CompressionJob {
    /// True only once the worker has actually stopped because of a cancel.
    fn is_cancelled(&self) -> bool {
        let state = self.shared.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state == JobState::Cancelled
    }

    fn wait_timeout(&self, timeout: Duration) -> std::result::Result<(), WaitError> {
        let state = self
            .shared
            .state
            .lock()
            .map_err(|_| WaitError::Failed("compression state poisoned".to_string()))?;
        let (state, _) = self
            .shared
            .done
            .wait_timeout_while(state, timeout, |s| *s == JobState::Running)
            .map_err(|_| WaitError::Failed("compression state poisoned".to_string()))?;

        match &*state {
            JobState::Running => Err(WaitError::TimedOut),
            JobState::Finished => Ok(()),
            JobState::Cancelled => Err(WaitError::Failed("compression was cancelled".to_string())),
            JobState::Failed(reason) => Err(WaitError::Failed(reason.clone())),
        }
    }
}

/// Returns `Ok(false)` if cancelled before the archive was complete.
fn compress_file(source: &Path, target: &Path, mode: CompressionMode, cancelled: &AtomicBool) -> Result<bool> {
    let input = File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    let mut reader = BufReader::new(input);
    let output = File::create(target).with_context(|| format!("Failed to create {}", target.display()))?;

    let complete = match mode {
        CompressionMode::Gz => {
            let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
            let complete = copy_chunks(&mut reader, &mut encoder, cancelled)?;
            encoder
                .finish()
                .and_then(|mut w| w.flush())
                .with_context(|| format!("Failed to finish {}", target.display()))?;
            complete
        }
        CompressionMode::Zip => {
            let mut zip = ZipWriter::new(output);
            let entry = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "log".to_string());
            let options = FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o644);
            zip.start_file(entry, options)
                .with_context(|| format!("Failed to start zip entry in {}", target.display()))?;
            let complete = copy_chunks(&mut reader, &mut zip, cancelled)?;
            zip.finish()
                .with_context(|| format!("Failed to finish {}", target.display()))?;
            complete
        }
        CompressionMode::None => bail!("no compression requested for {}", source.display()),
    };

    if complete {
        fs::remove_file(source)
            .with_context(|| format!("Failed to remove {} after compression", source.display()))?;
    }
    Ok(complete)
}

fn copy_chunks<R: Read, W: Write>(reader: &mut R, writer: &mut W, cancelled: &AtomicBool) -> Result<bool> {
    let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let n = reader.read(&mut buffer).context("Failed to read log file")?;
        if n == 0 {
            return Ok(true);
        }
        writer.write_all(&buffer[..n]).context("Failed to write archive")?;
    }
}
