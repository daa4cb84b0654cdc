//! Hasher stage: block queue -> worker pool -> result queue.
//!
//! Pending results are pushed in the order blocks were popped, so the writer
//! sees file order no matter which worker finishes first.

use std::sync::Arc;

use log::{debug, trace};

use crate::block::Block;
use crate::checksum::BlockChecksum;
use crate::error::{BlocksumError, Result};
use crate::parallel::promise::PendingResult;
use crate::parallel::queue::BlockingQueue;
use crate::parallel::worker_pool::WorkerPool;
use crate::pipeline::control::PipelineControl;

/// Dispatches one checksum job per block and forwards the pending results.
pub struct Hasher {
    blocks: Arc<BlockingQueue<Block>>,
    results: Arc<BlockingQueue<PendingResult<u32>>>,
    workers: WorkerPool,
    checksum: Arc<dyn BlockChecksum>,
    control: Arc<PipelineControl>,
}

impl Hasher {
    pub fn new(
        blocks: Arc<BlockingQueue<Block>>,
        results: Arc<BlockingQueue<PendingResult<u32>>>,
        workers: WorkerPool,
        checksum: Arc<dyn BlockChecksum>,
        control: Arc<PipelineControl>,
    ) -> Self {
        Self {
            blocks,
            results,
            workers,
            checksum,
            control,
        }
    }

    /// Dispatch until the block queue is closed and drained.
    ///
    /// Returns the number of jobs submitted. The worker pool is shut down on
    /// exit: gracefully on success, discarding queued jobs on failure.
    pub fn run(mut self) -> Result<u64> {
        let outcome = self.dispatch();

        match &outcome {
            Ok(_) => {
                self.results.close()?;
                self.workers.shutdown()?;
            }
            Err(_) => {
                let discarded = self.workers.shutdown_now()?;
                if discarded > 0 {
                    debug!("Hasher discarded {} queued checksum job(s)", discarded);
                }
            }
        }

        outcome
    }

    fn dispatch(&mut self) -> Result<u64> {
        let mut submitted = 0u64;

        loop {
            if self.control.is_failed() {
                return Err(BlocksumError::Aborted(format!(
                    "hasher stopped after {} block(s)",
                    submitted
                )));
            }

            let block = match self.blocks.pop_blocking()? {
                Some(block) => block,
                None => break,
            };

            let sequence = block.sequence().unwrap_or(submitted);
            let checksum = Arc::clone(&self.checksum);
            let pending = self.workers.submit(move || {
                let value = checksum
                    .checksum(block.data())
                    .map_err(|e| BlocksumError::Task(format!("block {}: {}", sequence, e)))?;
                trace!("Block {} {} = {:08x}", sequence, checksum.name(), value);
                Ok(value)
            })?;

            self.results.push(pending)?;
            submitted += 1;
        }

        debug!("Hasher finished: {} checksum job(s) submitted", submitted);
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{crc32, Crc32};
    use crate::parallel::worker_pool::WorkerPoolConfig;
    use crate::pipeline::control::Stage;
    use crate::pool::BlockPool;

    struct Fixture {
        pool: Arc<BlockPool>,
        blocks: Arc<BlockingQueue<Block>>,
        results: Arc<BlockingQueue<PendingResult<u32>>>,
        control: Arc<PipelineControl>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pool: Arc::new(BlockPool::new(8, 4, None).unwrap()),
                blocks: Arc::new(BlockingQueue::bounded(16)),
                results: Arc::new(BlockingQueue::bounded(16)),
                control: Arc::new(PipelineControl::new()),
            }
        }

        fn hasher(&self, checksum: Arc<dyn BlockChecksum>) -> Hasher {
            Hasher::new(
                self.blocks.clone(),
                self.results.clone(),
                WorkerPool::new(WorkerPoolConfig::new(3)).unwrap(),
                checksum,
                self.control.clone(),
            )
        }

        fn push_block(&self, seq: u64, fill: u8) {
            let mut block = Block::new(&self.pool).unwrap().with_sequence(seq);
            block.data_mut().fill(fill);
            self.blocks.push(block).unwrap();
        }
    }

    #[test]
    fn test_results_follow_block_order() -> Result<()> {
        let fixture = Fixture::new();
        for i in 0..10u8 {
            fixture.push_block(i as u64, i);
        }
        fixture.blocks.close()?;

        let submitted = fixture.hasher(Arc::new(Crc32)).run()?;
        assert_eq!(submitted, 10);

        for i in 0..10u8 {
            let pending = fixture.results.pop_blocking()?.unwrap();
            assert_eq!(pending.wait()?, crc32(&[i; 8]));
        }
        assert!(fixture.results.pop_blocking()?.is_none());

        // Every block went back to the pool once its job finished
        assert_eq!(fixture.pool.stats()?.in_use(), 0);
        Ok(())
    }

    struct Rejecting;

    impl BlockChecksum for Rejecting {
        fn checksum(&self, data: &[u8]) -> Result<u32> {
            if data[0] == 0xEE {
                Err(BlocksumError::Other("unreadable block".to_string()))
            } else {
                Ok(1)
            }
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    #[test]
    fn test_checksum_failure_lands_in_handle() -> Result<()> {
        let fixture = Fixture::new();
        fixture.push_block(0, 0x01);
        fixture.push_block(1, 0xEE);
        fixture.blocks.close()?;

        fixture.hasher(Arc::new(Rejecting)).run()?;

        assert_eq!(fixture.results.pop_blocking()?.unwrap().wait()?, 1);
        match fixture.results.pop_blocking()?.unwrap().wait() {
            Err(BlocksumError::Task(msg)) => assert!(msg.contains("block 1"), "{}", msg),
            other => panic!("Expected Task error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_stops_on_cancelled_block_queue() {
        let fixture = Fixture::new();
        fixture.control.register(fixture.blocks.clone());
        fixture.control.register(fixture.results.clone());
        fixture.push_block(0, 0x01);

        fixture
            .control
            .fail(Stage::Reader, BlocksumError::Other("reader died".to_string()));

        let result = fixture.hasher(Arc::new(Crc32)).run();
        assert!(result.is_err());
        assert_eq!(fixture.pool.stats().unwrap().in_use(), 0);
    }
}
