use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::config::Tuning;
use crate::constants::{
    COMPRESSION_MAX_CONSECUTIVE_FAILURES, COMPRESSION_MAX_TOTAL_WAIT, COMPRESSION_POLL_TIMEOUT,
};

/// Why a bounded wait on a compression job returned without the job finishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// Still running when the wait expired.
    TimedOut,
    /// The handle reported an error; the job may or may not recover.
    Failed(String),
}

/// An in-flight compression job started by the rotation policy.
pub trait CompressionHandle: Send + Sync {
    fn is_cancelled(&self) -> bool;

    /// Block for at most `timeout` until the job completes.
    fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The compressed artifact is complete and may be uploaded.
    Ready,
    /// The job was cancelled; nothing must be uploaded.
    Cancelled,
    /// The wait gave up: the total wait limit passed or the handle kept failing.
    Stalled,
}

/// Waits for compression with a bounded per-iteration timeout, re-checking
/// cancellation between iterations.
#[derive(Debug, Clone)]
pub struct CompressionWaiter {
    poll_timeout: Duration,
    max_total_wait: Option<Duration>,
    max_consecutive_failures: u32,
}

impl Default for CompressionWaiter {
    fn default() -> Self {
        Self {
            poll_timeout: COMPRESSION_POLL_TIMEOUT,
            max_total_wait: Some(COMPRESSION_MAX_TOTAL_WAIT),
            max_consecutive_failures: COMPRESSION_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl CompressionWaiter {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            poll_timeout,
            ..Default::default()
        }
    }

    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self {
            poll_timeout: tuning.compression_poll_timeout(),
            max_total_wait: tuning.compression_max_wait(),
            max_consecutive_failures: tuning.compression_max_failures.max(1),
        }
    }

    /// `None` waits as long as the job keeps running.
    pub fn with_max_total_wait(mut self, limit: Option<Duration>) -> Self {
        self.max_total_wait = limit;
        self
    }

    pub fn with_max_consecutive_failures(mut self, limit: u32) -> Self {
        self.max_consecutive_failures = limit.max(1);
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Wait until the job completes or is cancelled.
    ///
    /// No handle means no compression was requested. Timeouts are expected
    /// for long jobs and only logged; errors from the handle are logged and
    /// the wait continues until the failure limit is reached.
    pub fn await_completion(&self, handle: Option<&dyn CompressionHandle>) -> WaitOutcome {
        let handle = match handle {
            Some(handle) => handle,
            None => return WaitOutcome::Ready,
        };

        let started = Instant::now();
        let mut consecutive_failures = 0u32;

        loop {
            if handle.is_cancelled() {
                debug!("Compression job was cancelled");
                return WaitOutcome::Cancelled;
            }

            match handle.wait_timeout(self.poll_timeout) {
                Ok(()) => return WaitOutcome::Ready,
                Err(WaitError::TimedOut) => {
                    consecutive_failures = 0;
                    warn!(
                        "Timeout while waiting for compression job to finish ({:?} elapsed)",
                        started.elapsed()
                    );
                }
                Err(WaitError::Failed(_)) if handle.is_cancelled() => {
                    debug!("Compression job was cancelled");
                    return WaitOutcome::Cancelled;
                }
                Err(WaitError::Failed(reason)) => {
                    consecutive_failures += 1;
                    error!(
                        "Unexpected error while waiting for compression job to finish ({}/{}): {}",
                        consecutive_failures, self.max_consecutive_failures, reason
                    );
                    if consecutive_failures >= self.max_consecutive_failures {
                        return WaitOutcome::Stalled;
                    }
                }
            }

            if let Some(limit) = self.max_total_wait {
                if started.elapsed() >= limit {
                    error!("Compression job still unfinished after {:?}, giving up", limit);
                    return WaitOutcome::Stalled;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedHandle;

    fn waiter() -> CompressionWaiter {
        CompressionWaiter::new(Duration::from_millis(1))
    }

    #[test]
    fn test_no_handle_is_ready() {
        assert_eq!(waiter().await_completion(None), WaitOutcome::Ready);
    }

    #[test]
    fn test_cancelled_on_first_check() {
        let handle = ScriptedHandle::cancelled();
        assert_eq!(waiter().await_completion(Some(&handle)), WaitOutcome::Cancelled);
        assert_eq!(handle.waits(), 0);
    }

    #[test]
    fn test_ready_after_two_timeouts() {
        let handle = ScriptedHandle::new(vec![Err(WaitError::TimedOut), Err(WaitError::TimedOut), Ok(())]);
        assert_eq!(waiter().await_completion(Some(&handle)), WaitOutcome::Ready);
        assert_eq!(handle.waits(), 3);
    }

    #[test]
    fn test_cancellation_observed_between_waits() {
        let handle = ScriptedHandle::new(vec![Err(WaitError::TimedOut), Err(WaitError::TimedOut)])
            .cancel_after_waits(1);
        assert_eq!(waiter().await_completion(Some(&handle)), WaitOutcome::Cancelled);
        assert_eq!(handle.waits(), 1);
    }

    #[test]
    fn test_transient_failure_keeps_waiting() {
        let handle = ScriptedHandle::new(vec![
            Err(WaitError::Failed("interrupted".into())),
            Err(WaitError::TimedOut),
            Ok(()),
        ]);
        assert_eq!(waiter().await_completion(Some(&handle)), WaitOutcome::Ready);
        assert_eq!(handle.waits(), 3);
    }

    #[test]
    fn test_persistent_failure_stalls() {
        let handle = ScriptedHandle::repeating(Err(WaitError::Failed("broken".into())));
        let waiter = waiter().with_max_consecutive_failures(4);
        assert_eq!(waiter.await_completion(Some(&handle)), WaitOutcome::Stalled);
        assert_eq!(handle.waits(), 4);
    }

    #[test]
    fn test_total_wait_limit_stalls() {
        let handle = ScriptedHandle::repeating(Err(WaitError::TimedOut));
        let waiter = waiter().with_max_total_wait(Some(Duration::ZERO));
        assert_eq!(waiter.await_completion(Some(&handle)), WaitOutcome::Stalled);
        assert_eq!(handle.waits(), 1);
    }

    #[test]
    fn test_from_tuning() {
        let tuning = Tuning {
            compression_poll_secs: 7,
            compression_max_wait_secs: 0,
            compression_max_failures: 0,
            ..Tuning::default()
        };
        let waiter = CompressionWaiter::from_tuning(&tuning);
        assert_eq!(waiter.poll_timeout(), Duration::from_secs(7));
        assert!(waiter.max_total_wait.is_none());
        assert_eq!(waiter.max_consecutive_failures, 1);
    }
}
