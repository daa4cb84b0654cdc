//! Shared shutdown state for the pipeline stages.
//!
//! Every stage holds an `Arc<PipelineControl>`. The first stage that fails
//! records its error, raises the error flag and cancels every registered
//! queue, which wakes any thread parked on a full or empty queue. Later
//! failures (usually `QueueClosed` fallout from that cancellation) are only
//! logged.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use crate::error::BlocksumError;
use crate::parallel::queue::Cancellable;

/// The long-lived pipeline threads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Reader,
    Hasher,
    Writer,
}

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::Reader => 0,
            Stage::Hasher => 1,
            Stage::Writer => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Reader => write!(f, "reader"),
            Stage::Hasher => write!(f, "hasher"),
            Stage::Writer => write!(f, "writer"),
        }
    }
}

/// The error that stopped the pipeline and the stage that raised it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: BlocksumError,
}

/// Error flag, per-stage done flags and the queues to cancel on failure.
pub struct PipelineControl {
    error: AtomicBool,
    failure: Mutex<Option<StageFailure>>,
    done: [AtomicBool; 3],
    cancellables: Mutex<Vec<Arc<dyn Cancellable>>>,
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineControl {
    pub fn new() -> Self {
        Self {
            error: AtomicBool::new(false),
            failure: Mutex::new(None),
            done: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
            cancellables: Mutex::new(Vec::new()),
        }
    }

    /// Cancel `queue` when the pipeline fails.
    ///
    /// Registering after a failure cancels the queue right away.
    pub fn register(&self, queue: Arc<dyn Cancellable>) {
        if self.is_failed() {
            let _ = queue.cancel();
        }
        match self.cancellables.lock() {
            Ok(mut list) => list.push(queue),
            Err(e) => warn!("Cannot register queue for cancellation: {}", e),
        }
    }

    /// Record a stage failure and cancel every registered queue.
    pub fn fail(&self, stage: Stage, err: BlocksumError) {
        if self.error.swap(true, Ordering::AcqRel) {
            debug!("{} stage stopped after pipeline failure: {}", stage, err);
            return;
        }

        // The caller of the pipeline reports the error itself
        info!("{} stage failed: {}", stage, err);
        match self.failure.lock() {
            Ok(mut failure) => {
                *failure = Some(StageFailure { stage, error: err });
            }
            Err(e) => warn!("Cannot record {} stage failure: {}", stage, e),
        }

        self.cancel_all();
    }

    fn cancel_all(&self) {
        let queues = match self.cancellables.lock() {
            Ok(list) => list.clone(),
            Err(e) => {
                warn!("Cannot cancel queues: {}", e);
                return;
            }
        };
        for queue in queues {
            if let Err(e) = queue.cancel() {
                warn!("Queue cancellation failed: {}", e);
            }
        }
    }

    /// The error flag: true once any stage has failed.
    pub fn is_failed(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    /// Mark `stage` as permanently exited.
    pub fn mark_done(&self, stage: Stage) {
        if self.done[stage.index()].swap(true, Ordering::AcqRel) {
            warn!("{} stage marked done twice", stage);
        }
    }

    /// Whether `stage` has exited
    pub fn is_done(&self, stage: Stage) -> bool {
        self.done[stage.index()].load(Ordering::Acquire)
    }

    /// Take the recorded failure, if any.
    pub fn take_failure(&self) -> Option<StageFailure> {
        match self.failure.lock() {
            Ok(mut failure) => failure.take(),
            Err(e) => Some(StageFailure {
                stage: Stage::Writer,
                error: BlocksumError::Other(e.to_string()),
            }),
        }
    }
}

/// Marks a stage done when dropped, also when the stage thread unwinds.
pub(crate) struct DoneGuard<'a> {
    control: &'a PipelineControl,
    stage: Stage,
}

impl<'a> DoneGuard<'a> {
    pub(crate) fn new(control: &'a PipelineControl, stage: Stage) -> Self {
        Self { control, stage }
    }
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.control.fail(
                self.stage,
                BlocksumError::Other(format!("{} stage panicked", self.stage)),
            );
        }
        self.control.mark_done(self.stage);
    }
}
