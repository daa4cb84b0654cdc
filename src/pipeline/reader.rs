//! Reader stage: input file -> block queue.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace};

use crate::block::Block;
use crate::error::{BlocksumError, Result};
use crate::parallel::queue::BlockingQueue;
use crate::pipeline::control::PipelineControl;
use crate::pool::BlockPool;

/// Open the input file for binary reading.
pub fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| BlocksumError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// What the reader produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub blocks: u64,
    pub bytes: u64,
}

/// Streams the input into pool-backed blocks.
///
/// Every block pushed downstream is exactly `block_size` bytes; the last one
/// is zero-padded when the input does not end on a block boundary. An input
/// that ends exactly on a boundary, or is empty, produces no padding block.
pub struct BlockReader<R> {
    source: R,
    pool: Arc<BlockPool>,
    blocks: Arc<BlockingQueue<Block>>,
    control: Arc<PipelineControl>,
}

impl<R: Read> BlockReader<R> {
    pub fn new(
        source: R,
        pool: Arc<BlockPool>,
        blocks: Arc<BlockingQueue<Block>>,
        control: Arc<PipelineControl>,
    ) -> Self {
        Self {
            source,
            pool,
            blocks,
            control,
        }
    }

    /// Read until end of file, then close the block queue.
    ///
    /// On error the queue is left as is; the caller reports the failure to
    /// the pipeline control, which cancels it.
    pub fn run(mut self) -> Result<ReadSummary> {
        let mut summary = ReadSummary::default();

        loop {
            if self.control.is_failed() {
                return Err(BlocksumError::Aborted(format!(
                    "reader stopped after {} block(s)",
                    summary.blocks
                )));
            }

            let mut block = Block::new(&self.pool)?.with_sequence(summary.blocks);
            let filled = block
                .fill_from(&mut self.source)
                .map_err(|source| BlocksumError::Read {
                    block: summary.blocks,
                    source,
                })?;

            if filled == 0 {
                break;
            }

            let at_eof = filled < block.len();
            if at_eof {
                block.zero_from(filled);
            }

            trace!("Read block {} ({} bytes)", summary.blocks, filled);
            self.blocks.push(block)?;

            summary.blocks += 1;
            summary.bytes += filled as u64;

            if at_eof {
                break;
            }
        }

        self.blocks.close()?;
        debug!(
            "Reader finished: {} block(s), {} byte(s)",
            summary.blocks, summary.bytes
        );
        Ok(summary)
    }
}
