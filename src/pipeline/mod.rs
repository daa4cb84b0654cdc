//! The three-stage checksum pipeline.
//!
//! ```text
//! Reader -> [block queue] -> Hasher -> (worker pool) -> [result queue] -> Writer
//! ```
//!
//! Each stage runs on its own scoped thread. Stages only talk through the two
//! bounded queues and the shared [`PipelineControl`]. Any stage failure
//! cancels both queues, so every other stage wakes up and exits; the run then
//! reports the first recorded error.

pub mod control;
pub mod hasher;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};

use log::{debug, info};

use crate::block::Block;
use crate::checksum::BlockChecksum;
use crate::config::PipelineConfig;
use crate::error::{BlocksumError, Result};
use crate::parallel::promise::PendingResult;
use crate::parallel::queue::BlockingQueue;
use crate::parallel::worker_pool::WorkerPool;
use crate::pool::{BlockPool, PoolStats};

use control::{DoneGuard, PipelineControl, Stage};
use hasher::Hasher;
use reader::{open_input, BlockReader, ReadSummary};
use writer::{create_output, ChecksumWriter};

/// Numbers describing a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub block_size: usize,
    pub blocks_read: u64,
    pub bytes_read: u64,
    pub checksums_written: u64,
    pub worker_threads: usize,
    pub algorithm: &'static str,
    pub pool: PoolStats,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} byte(s) in {} block(s) of {} bytes, {} {} checksum(s) written, \
             {} worker(s), {} pool slot(s) in {} super-block(s)",
            self.bytes_read,
            self.blocks_read,
            self.block_size,
            self.checksums_written,
            self.algorithm,
            self.worker_threads,
            self.pool.total_slots,
            self.pool.super_blocks
        )
    }
}

/// Runs the checksum pipeline for a given configuration.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    checksum: Arc<dyn BlockChecksum>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let checksum = config.algorithm.build();
        Ok(Self { config, checksum })
    }

    /// Use a custom checksum instead of the configured algorithm.
    pub fn with_checksum(mut self, checksum: Arc<dyn BlockChecksum>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Checksum the file at `input` into the file at `output`.
    ///
    /// The input is opened before the output is created, so a missing input
    /// never leaves an empty output file behind.
    pub fn run_files(&self, input: &Path, output: &Path) -> Result<PipelineReport> {
        let source = open_input(input)?;
        let sink = create_output(output)?;
        debug!("Checksumming {} into {}", input.display(), output.display());
        self.run(source, sink)
    }

    /// Checksum everything readable from `source` into `sink`.
    ///
    /// Returns once every stage thread and every worker has been joined.
    pub fn run<R, W>(&self, source: R, sink: W) -> Result<PipelineReport>
    where
        R: Read + Send,
        W: Write + Send,
    {
        let config = &self.config;

        let pool = BlockPool::from_config(config)?;
        let blocks: Arc<BlockingQueue<Block>> =
            Arc::new(BlockingQueue::bounded(config.block_queue_capacity));
        let results: Arc<BlockingQueue<PendingResult<u32>>> =
            Arc::new(BlockingQueue::bounded(config.result_queue_capacity));

        let control = Arc::new(PipelineControl::new());
        control.register(blocks.clone());
        control.register(results.clone());

        let workers = WorkerPool::new(config.worker_config.clone())?;
        let worker_threads = workers.worker_count();

        let reader = BlockReader::new(source, Arc::clone(&pool), blocks.clone(), control.clone());
        let hasher = Hasher::new(
            blocks,
            results.clone(),
            workers,
            Arc::clone(&self.checksum),
            control.clone(),
        );
        let writer = ChecksumWriter::new(sink, results, control.clone());

        let (read, written) = thread::scope(|scope| {
            let reader = spawn_stage(scope, &control, Stage::Reader, move || reader.run());
            let hasher = spawn_stage(scope, &control, Stage::Hasher, move || hasher.run());
            let writer = spawn_stage(scope, &control, Stage::Writer, move || writer.run());

            let read = join_stage(reader);
            let _submitted = join_stage(hasher);
            let written = join_stage(writer);
            (read, written)
        });

        if let Some(failure) = control.take_failure() {
            return Err(failure.error);
        }

        let (ReadSummary { blocks, bytes }, written) = match (read, written) {
            (Some(read), Some(written)) => (read, written),
            _ => {
                return Err(BlocksumError::Other(
                    "pipeline stage exited without a result".to_string(),
                ))
            }
        };

        if blocks != written {
            return Err(BlocksumError::Other(format!(
                "read {} block(s) but wrote {} checksum(s)",
                blocks, written
            )));
        }

        let report = PipelineReport {
            block_size: config.block_size,
            blocks_read: blocks,
            bytes_read: bytes,
            checksums_written: written,
            worker_threads,
            algorithm: self.checksum.name(),
            pool: pool.stats()?,
        };
        info!("Pipeline finished: {}", report);
        Ok(report)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("checksum", &self.checksum.name())
            .finish()
    }
}

/// Spawn one stage thread. Its error, panic or spawn failure is reported to
/// `control`, and the stage is marked done whatever happens.
fn spawn_stage<'scope, T, F>(
    scope: &'scope Scope<'scope, '_>,
    control: &Arc<PipelineControl>,
    stage: Stage,
    body: F,
) -> Option<ScopedJoinHandle<'scope, Option<T>>>
where
    F: FnOnce() -> Result<T> + Send + 'scope,
    T: Send + 'scope,
{
    let thread_control = Arc::clone(control);
    let spawned = thread::Builder::new()
        .name(format!("blocksum-{}", stage))
        .spawn_scoped(scope, move || {
            let _done = DoneGuard::new(&thread_control, stage);
            debug!("{} stage started", stage);
            match body() {
                Ok(value) => Some(value),
                Err(e) => {
                    thread_control.fail(stage, e);
                    None
                }
            }
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            control.fail(stage, BlocksumError::Io(e));
            control.mark_done(stage);
            None
        }
    }
}

fn join_stage<T>(handle: Option<ScopedJoinHandle<'_, Option<T>>>) -> Option<T> {
    // A panicking stage was already reported by its DoneGuard
    handle.and_then(|handle| handle.join().ok().flatten())
}
