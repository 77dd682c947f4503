use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver};
use log::{debug, error, info};

use crate::cloud::uploader::{RemoteObject, Uploader};
use crate::error::{Result, RolloverError};
use crate::rollover::compression::{CompressionWaiter, WaitOutcome};
use crate::rollover::event::{CompressionMode, RolloverEvent};
use crate::rollover::executor::{panic_message, BackgroundExecutor};

/// Removes expired archives. Supplied by the rotation policy and run after
/// every rollover, whatever happened to the upload.
pub trait RetentionTrigger: Send + Sync {
    fn clean(&self, now: DateTime<Utc>);
}

impl<F> RetentionTrigger for F
where
    F: Fn(DateTime<Utc>) + Send + Sync,
{
    fn clean(&self, now: DateTime<Utc>) {
        self(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverState {
    AwaitingCompression,
    Naming,
    Uploading,
    Done,
    Abandoned,
    Failed,
}

impl fmt::Display for RolloverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RolloverState::AwaitingCompression => "awaiting-compression",
            RolloverState::Naming => "naming",
            RolloverState::Uploading => "uploading",
            RolloverState::Done => "done",
            RolloverState::Abandoned => "abandoned",
            RolloverState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a rollover ended.
#[derive(Debug)]
pub enum RolloverOutcome {
    Uploaded(RemoteObject),
    /// Compression was cancelled, so nothing was uploaded. Not a failure.
    Abandoned,
    Failed(RolloverError),
}

impl RolloverOutcome {
    pub fn state(&self) -> RolloverState {
        match self {
            RolloverOutcome::Uploaded(_) => RolloverState::Done,
            RolloverOutcome::Abandoned => RolloverState::Abandoned,
            RolloverOutcome::Failed(_) => RolloverState::Failed,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, RolloverOutcome::Uploaded(_))
    }
}

/// Returned by [`RolloverCoordinator::rollover`]; yields the outcome once the
/// background worker is done with the event.
pub struct RolloverTicket {
    filename: String,
    receiver: Receiver<RolloverOutcome>,
}

impl RolloverTicket {
    /// The archived filename this ticket tracks.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn wait(self) -> RolloverOutcome {
        self.receiver.recv().unwrap_or_else(|_| {
            RolloverOutcome::Failed(RolloverError::Submission(format!(
                "worker exited before finishing {}",
                self.filename
            )))
        })
    }

    /// `None` if the rollover is still running after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RolloverOutcome> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

/// Releases an in-flight slot on drop, including when the job panics.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    filename: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, filename: &str) -> Result<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(filename.to_string()) {
            return Err(RolloverError::AlreadyInFlight(filename.to_string()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            filename: filename.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.filename);
    }
}

struct Pipeline {
    uploader: Uploader,
    waiter: CompressionWaiter,
    retention: Option<Arc<dyn RetentionTrigger>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Pipeline {
    fn run(&self, event: RolloverEvent) -> RolloverOutcome {
        let source = event.elapsed_period_filename.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.transition(event)))
            .unwrap_or_else(|payload| {
                RolloverOutcome::Failed(RolloverError::Panicked {
                    filename: source.clone(),
                    message: panic_message(&payload),
                })
            });

        match &outcome {
            RolloverOutcome::Uploaded(object) => {
                info!("Rolled {} over to {}", object.local_path.display(), object.remote_path)
            }
            RolloverOutcome::Abandoned => {
                info!("Compression of {} was cancelled, skipping upload", source)
            }
            RolloverOutcome::Failed(e) => {
                error!("Unable to roll {} over to remote store: {}", source, e)
            }
        }

        self.run_retention();
        outcome
    }

    fn transition(&self, event: RolloverEvent) -> RolloverOutcome {
        let mut state = RolloverState::AwaitingCompression;
        debug!("{}: {}", event.elapsed_period_filename, state);

        if event.compression_mode != CompressionMode::None {
            match self.waiter.await_completion(event.compression.as_deref()) {
                WaitOutcome::Ready => {}
                WaitOutcome::Cancelled => return RolloverOutcome::Abandoned,
                WaitOutcome::Stalled => {
                    return RolloverOutcome::Failed(RolloverError::CompressionStalled(
                        event.archived_filename(),
                    ))
                }
            }
        }

        state = RolloverState::Naming;
        debug!("{}: {}", event.elapsed_period_filename, state);
        let archived = event.archived_filename();
        let task = match self.uploader.task_for(&archived) {
            Ok(task) => task,
            Err(e) => return RolloverOutcome::Failed(e),
        };

        state = RolloverState::Uploading;
        debug!("{}: {}", archived, state);
        match self.uploader.upload_with_retry(&task) {
            Ok(object) => RolloverOutcome::Uploaded(object),
            Err(e) => RolloverOutcome::Failed(e),
        }
    }

    fn run_retention(&self) {
        if let Some(retention) = &self.retention {
            retention.clean(Utc::now());
        }
    }
}

/// Drives each rollover from compression through upload and then hands
/// control back to retention.
///
/// The coordinator owns its worker pool. Dropping it waits for queued
/// rollovers to finish.
pub struct RolloverCoordinator {
    pipeline: Arc<Pipeline>,
    executor: BackgroundExecutor,
}

impl RolloverCoordinator {
    pub fn new(uploader: Uploader, waiter: CompressionWaiter, executor: BackgroundExecutor) -> Self {
        Self::build(uploader, waiter, executor, None)
    }

    /// Like [`new`](Self::new), running `trigger` after every rollover.
    pub fn with_retention(
        uploader: Uploader,
        waiter: CompressionWaiter,
        executor: BackgroundExecutor,
        trigger: Arc<dyn RetentionTrigger>,
    ) -> Self {
        Self::build(uploader, waiter, executor, Some(trigger))
    }

    fn build(
        uploader: Uploader,
        waiter: CompressionWaiter,
        executor: BackgroundExecutor,
        retention: Option<Arc<dyn RetentionTrigger>>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                uploader,
                waiter,
                retention,
                in_flight: Arc::new(Mutex::new(HashSet::new())),
            }),
            executor,
        }
    }

    /// Hand the event to a background worker and return immediately.
    ///
    /// Fails without queueing anything if the same archive is already being
    /// uploaded or the worker queue is full. Retention still runs in the
    /// latter case.
    pub fn rollover(&self, event: RolloverEvent) -> Result<RolloverTicket> {
        let filename = event.archived_filename();
        let guard = InFlightGuard::acquire(&self.pipeline.in_flight, &filename)?;
        let (sender, receiver) = bounded(1);
        let pipeline = Arc::clone(&self.pipeline);

        let submitted = self.executor.submit(move || {
            let outcome = pipeline.run(event);
            drop(guard);
            let _ = sender.send(outcome);
        });

        if let Err(e) = submitted {
            error!("Unable to queue upload of {}: {}", filename, e);
            self.pipeline.run_retention();
            return Err(e);
        }

        Ok(RolloverTicket { filename, receiver })
    }

    /// Run the whole rollover on the calling thread.
    pub fn process(&self, event: RolloverEvent) -> RolloverOutcome {
        let filename = event.archived_filename();
        match InFlightGuard::acquire(&self.pipeline.in_flight, &filename) {
            Ok(_guard) => self.pipeline.run(event),
            Err(e) => RolloverOutcome::Failed(e),
        }
    }

    pub fn is_in_flight(&self, archived_filename: &str) -> bool {
        self.pipeline
            .in_flight
            .lock()
            .map(|set| set.contains(archived_filename))
            .unwrap_or(false)
    }

    /// Wait for every queued rollover, then stop the workers.
    pub fn shutdown(self) {
        self.executor.shutdown();
    }
}
