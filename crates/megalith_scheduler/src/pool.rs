//! # Worker Pool
//!
//! A fixed set of named threads fed from one crossbeam job queue.
//!
//! ```text
//!   Scheduler ──> [job queue] ──┬──> megalith-worker-0 ──┐
//!                               ├──> megalith-worker-1 ──┼──> [result channel]
//!                               └──> megalith-worker-N ──┘
//! ```
//!
//! Dropping the pool closes the queue; workers finish the job in hand and
//! are joined.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, trace};

use crate::error::{SchedulerError, SchedulerResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool.
#[derive(Debug)]
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidConfig`] if `threads` is zero or a thread
    ///   cannot be spawned
    pub fn new(threads: usize) -> SchedulerResult<Self> {
        if threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let (jobs, queue) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("megalith-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = queue.recv() {
                        job();
                    }
                    trace!(worker = index, "worker exiting");
                })
                .map_err(|err| SchedulerError::InvalidConfig(format!("cannot spawn worker: {err}")))?;
            workers.push(handle);
        }
        debug!(threads, "worker pool started");
        Ok(Self {
            jobs: Some(jobs),
            workers,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job` on the next free worker.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::WorkerLost`] if every worker has exited.
    pub fn execute<F>(&self, job: F) -> SchedulerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs
            .as_ref()
            .ok_or(SchedulerError::WorkerLost)?
            .send(Box::new(job))
            .map_err(|_| SchedulerError::WorkerLost)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool stopped");
    }
}
