use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error};

use crate::constants::{WORKER_QUEUE_CAPACITY, WORKER_THREAD_PREFIX};
use crate::error::{Result, RolloverError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Long-lived pool of named worker threads that runs uploads off the
/// logging path.
///
/// Submission never blocks: a full queue is reported to the caller. Dropping
/// the executor (or calling [`shutdown`](Self::shutdown)) stops accepting
/// work and joins every worker, so queued and in-flight uploads finish before
/// the owner goes away. A panic inside a job is logged and the worker keeps
/// serving.
pub struct BackgroundExecutor {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl BackgroundExecutor {
    pub fn new(threads: usize) -> io::Result<Self> {
        Self::with_capacity(threads, WORKER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(threads: usize, capacity: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = bounded::<Job>(capacity.max(1));

        let mut workers = Vec::with_capacity(threads);
        for i in 1..=threads {
            let name = format!("{}-{}", WORKER_THREAD_PREFIX, i);
            let worker_receiver = receiver.clone();
            let worker_name = name.clone();

            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || worker_loop(&worker_name, worker_receiver))?;
            workers.push(handle);
        }

        debug!("Started {} upload worker(s)", threads);
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job for a worker without blocking the caller.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RolloverError::Submission("executor is shut down".to_string()))?;

        sender.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => RolloverError::Submission("upload queue is full".to_string()),
            TrySendError::Disconnected(_) => {
                RolloverError::Submission("all upload workers have exited".to_string())
            }
        })
    }

    /// Stop accepting work and wait for every queued job to finish.
    pub fn shutdown(mut self) {
        self.join_workers();
    }

    fn join_workers(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!("Upload worker {} terminated abnormally", name);
            }
        }
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        self.join_workers();
    }
}

fn worker_loop(name: &str, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!("Error copying logs to remote store in {}: {}", name, panic_message(&payload));
        }
    }
    debug!("{} exiting", name);
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
