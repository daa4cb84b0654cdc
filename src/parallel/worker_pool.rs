// Fixed-size worker pool for blocksum
//
// Workers pull boxed jobs from an unbounded queue and run them. Each submission
// returns a PendingResult that resolves to the job's outcome. Backpressure is
// applied before the pool (by the bounded block queue), so submission never
// waits.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, trace, warn};

use crate::constants::{MIN_WORKER_THREADS, RESERVED_THREADS};
use crate::error::{BlocksumError, Result};
use crate::parallel::promise::{promise, PendingResult};
use crate::parallel::queue::BlockingQueue;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn
    pub worker_threads: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a configuration with an explicit thread count (at least one).
    pub fn new(worker_threads: usize) -> Self {
        Self {
            worker_threads: worker_threads.max(1),
        }
    }
}

/// Available parallelism minus the threads used by the pipeline stages,
/// never below `MIN_WORKER_THREADS`.
pub fn default_worker_threads() -> usize {
    let detected = match thread::available_parallelism() {
        Ok(num) => num.get(),
        Err(_) => MIN_WORKER_THREADS,
    };
    detected
        .saturating_sub(RESERVED_THREADS)
        .max(MIN_WORKER_THREADS)
}

/// Worker thread state
struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

/// A fixed set of threads executing submitted jobs.
///
/// Dropping the pool lets queued jobs finish and joins every worker.
/// [`WorkerPool::shutdown_now`] discards queued jobs instead; their pending
/// results resolve with `QueueClosed`.
pub struct WorkerPool {
    /// Jobs waiting for a worker
    jobs: Arc<BlockingQueue<Job>>,

    /// Worker threads, emptied when the pool is joined
    workers: Vec<Worker>,

    /// Set once no more jobs are accepted
    closed: AtomicBool,

    /// Total number of accepted jobs
    submitted: AtomicU64,
}

impl WorkerPool {
    /// Spawns the configured number of worker threads.
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        let jobs: Arc<BlockingQueue<Job>> = Arc::new(BlockingQueue::unbounded());
        let thread_count = config.worker_threads.max(1);

        let mut pool = Self {
            jobs,
            workers: Vec::with_capacity(thread_count),
            closed: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
        };

        for id in 0..thread_count {
            let jobs = Arc::clone(&pool.jobs);
            let spawned = thread::Builder::new()
                .name(format!("blocksum-worker-{}", id))
                .spawn(move || Self::worker_loop(id, jobs));

            match spawned {
                Ok(handle) => pool.workers.push(Worker { id, handle }),
                Err(e) => {
                    error!("Error during creating worker thread {}: {}", id, e);
                    // Dropping the pool joins the workers that did start
                    return Err(BlocksumError::Io(e));
                }
            }
        }

        debug!("Worker pool started with {} thread(s)", thread_count);
        Ok(pool)
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, jobs: Arc<BlockingQueue<Job>>) {
        debug!("Worker thread {} starting", id);

        loop {
            match jobs.pop_blocking() {
                Ok(Some(job)) => {
                    trace!("Worker {} running a job", id);
                    job();
                }
                Ok(None) => {
                    trace!("Worker {} found queue closed, exiting", id);
                    break;
                }
                Err(BlocksumError::QueueClosed(_)) => {
                    trace!("Worker {} found queue cancelled, exiting", id);
                    break;
                }
                Err(e) => {
                    error!("Worker {} encountered error: {}", id, e);
                    break;
                }
            }
        }

        debug!("Worker thread {} exiting", id);
    }

    /// Queue `task` and return a handle to its outcome.
    ///
    /// An error returned by the task, or a panic inside it, is delivered
    /// through the handle; the worker keeps serving later jobs.
    pub fn submit<F, R>(&self, task: F) -> Result<PendingResult<R>>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(BlocksumError::QueueClosed(
                "worker pool is shut down".to_string(),
            ));
        }

        let (promise, pending) = promise();
        let job: Job = Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(outcome) => outcome,
                Err(payload) => Err(BlocksumError::Task(panic_message(payload.as_ref()))),
            };
            if let Err(e) = promise.fulfill(outcome) {
                warn!("Dropping result of finished job: {}", e);
            }
        });

        self.jobs.push(job)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(pending)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of jobs waiting for a worker
    pub fn pending_tasks(&self) -> Result<usize> {
        self.jobs.len()
    }

    /// Total number of accepted jobs
    pub fn submitted_tasks(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs, let queued jobs finish and join the workers.
    pub fn shutdown(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.jobs.close()?;
        self.join_workers();
        Ok(())
    }

    /// Stop accepting jobs, discard queued ones and join the workers.
    ///
    /// Returns the number of discarded jobs.
    pub fn shutdown_now(&mut self) -> Result<usize> {
        self.closed.store(true, Ordering::Release);
        let discarded = self.jobs.cancel_and_drain()?;
        let count = discarded.len();
        // Dropping the jobs abandons their promises
        drop(discarded);
        self.join_workers();
        Ok(count)
    }

    fn join_workers(&mut self) {
        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.handle.join() {
                error!("Failed to join worker {}: {:?}", worker.id, e);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Worker pool shutdown failed: {}", e);
            let _ = self.jobs.cancel();
            self.join_workers();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", msg)
    } else {
        "task panicked".to_string()
    }
}
