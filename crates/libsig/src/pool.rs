//! Fixed-size worker pool with submission-order result handles.
//!
//! One worker thread per logical core pulls jobs from an unbounded FIFO
//! queue. Submitting a job returns a [`JobHandle`]; waiting on the handle
//! blocks until that job's return value arrives. The pool accepts jobs only
//! while `Running`; shutdown drains the queue completely before the workers
//! exit, and dropping the pool performs the same drain.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool lifecycle. Jobs are accepted only in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Running,
    Draining,
    Terminated,
}

/// Error type for pool operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Submission after the pool began shutting down.
    #[error("worker pool is no longer accepting jobs")]
    Closed,
    /// The executing worker died before delivering a result.
    #[error("job was lost before completing")]
    Lost,
}

/// Completion handle for one submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    result: Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Blocks until the job finishes and yields its return value.
    pub fn wait(self) -> Result<T, PoolError> {
        self.result.recv().map_err(|_| PoolError::Lost)
    }
}

pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// Spawns one worker per available logical core.
    pub fn new() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_workers(workers)
    }

    /// Spawns an explicit number of workers (at least one).
    pub fn with_workers(count: usize) -> Self {
        let (jobs, queue) = unbounded::<Job>();
        let workers = (0..count.max(1))
            .map(|_| {
                let queue: Receiver<Job> = queue.clone();
                thread::spawn(move || {
                    while let Ok(job) = queue.recv() {
                        job();
                    }
                })
            })
            .collect();
        Self {
            jobs: Some(jobs),
            workers,
            state: Mutex::new(PoolState::Running),
        }
    }

    /// Queues a job and returns its completion handle.
    pub fn submit<T, F>(&self, job: F) -> Result<JobHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let state = *self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state != PoolState::Running {
            return Err(PoolError::Closed);
        }
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(PoolError::Closed);
        };

        let (done, result) = bounded(1);
        let task: Job = Box::new(move || {
            // The receiver may be gone if the caller dropped the handle.
            let _ = done.send(job());
        });
        jobs.send(task).map_err(|_| PoolError::Closed)?;
        Ok(JobHandle { result })
    }

    /// Stops accepting jobs, lets the workers drain the queue, and joins
    /// them. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != PoolState::Running {
                return;
            }
            *state = PoolState::Draining;
        }
        // Dropping the sender disconnects the queue once it is empty.
        self.jobs = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = PoolState::Terminated;
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
