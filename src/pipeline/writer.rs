//! Writer stage: result queue -> output file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{NativeEndian, WriteBytesExt};
use log::{debug, trace};

use crate::error::{BlocksumError, Result};
use crate::parallel::promise::PendingResult;
use crate::parallel::queue::BlockingQueue;
use crate::pipeline::control::PipelineControl;

/// Create (or truncate) the output file.
pub fn create_output(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| BlocksumError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Appends one native-endian `u32` per resolved handle.
///
/// Handles are waited on in queue order, so a slow block holds back the
/// ones behind it even if they finished first.
pub struct ChecksumWriter<W: Write> {
    sink: BufWriter<W>,
    results: Arc<BlockingQueue<PendingResult<u32>>>,
    control: Arc<PipelineControl>,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(
        sink: W,
        results: Arc<BlockingQueue<PendingResult<u32>>>,
        control: Arc<PipelineControl>,
    ) -> Self {
        Self {
            sink: BufWriter::new(sink),
            results,
            control,
        }
    }

    /// Write checksums until the result queue is closed and drained.
    ///
    /// The output is flushed on every exit path; a flush failure only
    /// becomes the returned error if nothing else went wrong first.
    /// Returns the number of checksums written.
    pub fn run(mut self) -> Result<u64> {
        let outcome = self.drain();
        let flushed = self.sink.flush().map_err(BlocksumError::Write);

        let written = outcome?;
        flushed?;
        debug!("Writer finished: {} checksum(s) written", written);
        Ok(written)
    }

    fn drain(&mut self) -> Result<u64> {
        let mut written = 0u64;

        loop {
            if self.control.is_failed() {
                return Err(BlocksumError::Aborted(format!(
                    "writer stopped after {} checksum(s)",
                    written
                )));
            }

            let pending = match self.results.pop_blocking()? {
                Some(pending) => pending,
                None => break,
            };

            let checksum = pending.wait()?;
            self.sink
                .write_u32::<NativeEndian>(checksum)
                .map_err(BlocksumError::Write)?;

            trace!("Wrote checksum {} = {:08x}", written, checksum);
            written += 1;
        }

        Ok(written)
    }
}
