//! Pool-backed fixed-size byte buffer.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::BytesMut;

use crate::error::Result;
use crate::pool::{BlockPool, SlotId};

/// One `block_size`-byte window of the input.
///
/// A block owns exactly one slot of its [`BlockPool`] and gives it back when
/// dropped. Blocks are move-only; there is no way to duplicate a slot.
pub struct Block {
    // Always `Some` until Drop hands the slot back
    slot: Option<(SlotId, BytesMut)>,
    pool: Arc<BlockPool>,
    sequence: Option<u64>,
}

impl Block {
    /// Acquire a slot from `pool`.
    ///
    /// The contents are whatever the previous owner left behind; callers must
    /// overwrite or zero every byte they hand downstream.
    pub fn new(pool: &Arc<BlockPool>) -> Result<Self> {
        let slot = pool.acquire()?;
        Ok(Self {
            slot: Some(slot),
            pool: Arc::clone(pool),
            sequence: None,
        })
    }

    /// Tag the block with its position in the input.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Position in the input, if tagged
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// The pool slot backing this block
    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot.as_ref().map(|(id, _)| *id)
    }

    /// Size of the block in bytes
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Blocks are never empty; provided for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All `block_size` bytes of the block.
    pub fn data(&self) -> &[u8] {
        match &self.slot {
            Some((_, buf)) => &buf[..],
            None => &[],
        }
    }

    /// Mutable view of all `block_size` bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.slot {
            Some((_, buf)) => &mut buf[..],
            None => &mut [],
        }
    }

    /// Zero every byte from `offset` to the end of the block.
    pub fn zero_from(&mut self, offset: usize) {
        let data = self.data_mut();
        if offset < data.len() {
            data[offset..].fill(0);
        }
    }

    /// Read from `source` until the block is full or end of file.
    ///
    /// Returns the number of bytes read; anything less than `len()` means end
    /// of file was reached. Interrupted reads are retried, any other error is
    /// returned as is.
    pub fn fill_from<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<usize> {
        let data = self.data_mut();
        let mut filled = 0;

        while filled < data.len() {
            match source.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(filled)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some((id, buf)) = self.slot.take() {
            self.pool.release(id, buf);
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("slot", &self.slot_id())
            .field("sequence", &self.sequence)
            .field("len", &self.len())
            .finish()
    }
}
