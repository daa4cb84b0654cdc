//! Pipeline configuration.
//!
//! All sizes are fixed for the lifetime of one run. The configuration is built
//! once and handed by reference to the block pool, the worker pool and the
//! stages.

use crate::checksum::ChecksumAlgorithm;
use crate::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SLOTS_PER_SUPER_BLOCK, MIN_BLOCK_SIZE,
};
use crate::error::{BlocksumError, Result};
use crate::parallel::worker_pool::WorkerPoolConfig;

/// Configuration for one checksum run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Size of every block in bytes.
    pub block_size: usize,

    /// Capacity of the queue between the reader and the hasher.
    pub block_queue_capacity: usize,

    /// Capacity of the queue between the hasher and the writer.
    pub result_queue_capacity: usize,

    /// Number of slots carved from each super-block of the block pool.
    pub slots_per_super_block: usize,

    /// Upper bound on the number of pool slots, `None` for unbounded growth.
    pub max_pool_slots: Option<usize>,

    /// Worker pool settings.
    pub worker_config: WorkerPoolConfig,

    /// Checksum computed for each block.
    pub algorithm: ChecksumAlgorithm,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            slots_per_super_block: DEFAULT_SLOTS_PER_SUPER_BLOCK,
            max_pool_slots: None,
            worker_config: WorkerPoolConfig::default(),
            algorithm: ChecksumAlgorithm::default(),
        }
    }
}

impl PipelineConfig {
    /// Returns a copy with a custom block size.
    ///
    /// Fails if the size is below the minimum of 8 bytes.
    pub fn with_block_size(mut self, block_size: usize) -> Result<Self> {
        validate_block_size(block_size)?;
        self.block_size = block_size;
        Ok(self)
    }

    /// Sets both queue capacities.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BlocksumError::InvalidArgument(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        self.block_queue_capacity = capacity;
        self.result_queue_capacity = capacity;
        Ok(self)
    }

    /// Sets the number of worker threads.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_config = WorkerPoolConfig::new(worker_threads);
        self
    }

    /// Sets the number of slots per super-block.
    pub fn with_slots_per_super_block(mut self, slots: usize) -> Result<Self> {
        if slots == 0 {
            return Err(BlocksumError::InvalidArgument(
                "slots per super-block must be at least 1".to_string(),
            ));
        }
        self.slots_per_super_block = slots;
        Ok(self)
    }

    /// Caps the total number of block slots the pool may create.
    pub fn with_max_pool_slots(mut self, max_slots: usize) -> Self {
        self.max_pool_slots = Some(max_slots);
        self
    }

    /// Selects the checksum algorithm.
    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Re-checks every field; used when a config was built by hand.
    ///
    /// Only structural limits are enforced here. The 8-byte minimum is a
    /// usage rule applied by [`PipelineConfig::with_block_size`] and the
    /// command line, so a hand-built config may use smaller blocks.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(BlocksumError::InvalidArgument(
                "block size must be at least 1 byte".to_string(),
            ));
        }
        if self.block_queue_capacity == 0 || self.result_queue_capacity == 0 {
            return Err(BlocksumError::InvalidArgument(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.slots_per_super_block == 0 {
            return Err(BlocksumError::InvalidArgument(
                "slots per super-block must be at least 1".to_string(),
            ));
        }
        if self.worker_config.worker_threads == 0 {
            return Err(BlocksumError::InvalidArgument(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks that `block_size` is usable.
pub fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size < MIN_BLOCK_SIZE {
        return Err(BlocksumError::InvalidArgument(format!(
            "block size ({}) must be at least {} bytes",
            block_size, MIN_BLOCK_SIZE
        )));
    }
    Ok(())
}
