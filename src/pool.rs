//! Fixed-size slot allocator backing every [`Block`](crate::block::Block).
//!
//! The pool grows one super-block at a time. A super-block is a single
//! contiguous allocation that is split into `slots_per_super_block` disjoint
//! views of `slot_size` bytes each. Free slots live on an explicit stack of
//! `(SlotId, BytesMut)` pairs, so acquiring and releasing a slot is a push or a
//! pop under one mutex.
//!
//! Views keep their super-block alive, and the free stack owns every view that
//! is not currently lent out, so super-block memory is only returned to the
//! system when the pool itself (and every block borrowed from it) is gone.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use log::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{BlocksumError, Result};

/// Identifies one slot: which super-block it was carved from and its index there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub super_block: u32,
    pub index: u32,
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.super_block, self.index)
    }
}

#[derive(Debug)]
struct BlockPoolInner {
    /// Slots ready to be handed out, most recently released on top
    free: Vec<(SlotId, BytesMut)>,
    /// Number of super-blocks carved so far
    super_blocks: u32,
    /// Number of slots carved so far
    total_slots: usize,
}

/// Snapshot of pool usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub slot_size: usize,
    pub super_blocks: u32,
    pub total_slots: usize,
    pub free_slots: usize,
}

impl PoolStats {
    /// Slots currently owned by live blocks.
    pub fn in_use(&self) -> usize {
        self.total_slots - self.free_slots
    }
}

/// Thread-safe pool of equally sized byte slots.
#[derive(Debug)]
pub struct BlockPool {
    inner: Mutex<BlockPoolInner>,
    slot_size: usize,
    slots_per_super_block: usize,
    max_slots: Option<usize>,
}

impl BlockPool {
    /// Create an empty pool. No memory is allocated until the first acquire.
    ///
    /// `slot_size` is fixed for the lifetime of the pool. Slots are tracked
    /// outside their memory, so any non-zero size works.
    pub fn new(
        slot_size: usize,
        slots_per_super_block: usize,
        max_slots: Option<usize>,
    ) -> Result<Self> {
        if slot_size == 0 {
            return Err(BlocksumError::InvalidArgument(
                "slot size must be at least 1 byte".to_string(),
            ));
        }
        if slots_per_super_block == 0 {
            return Err(BlocksumError::InvalidArgument(
                "slots per super-block must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(BlockPoolInner {
                free: Vec::new(),
                super_blocks: 0,
                total_slots: 0,
            }),
            slot_size,
            slots_per_super_block,
            max_slots,
        })
    }

    /// Create a shared pool sized for `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Arc<Self>> {
        let pool = Self::new(
            config.block_size,
            config.slots_per_super_block,
            config.max_pool_slots,
        )?;
        Ok(Arc::new(pool))
    }

    fn acquire_lock(&self) -> Result<MutexGuard<'_, BlockPoolInner>> {
        self.inner
            .lock()
            .map_err(|e| BlocksumError::Other(e.to_string()))
    }

    /// Size in bytes of every slot
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Take a free slot, carving a new super-block if none is free.
    pub(crate) fn acquire(&self) -> Result<(SlotId, BytesMut)> {
        let mut inner = self.acquire_lock()?;

        if inner.free.is_empty() {
            self.carve_super_block(&mut inner)?;
        }

        inner.free.pop().ok_or_else(|| {
            BlocksumError::Allocation("free list empty after growing the pool".to_string())
        })
    }

    /// Put a slot back on the free list.
    pub(crate) fn release(&self, id: SlotId, slot: BytesMut) {
        debug_assert_eq!(slot.len(), self.slot_size);
        match self.inner.lock() {
            Ok(mut inner) => inner.free.push((id, slot)),
            Err(e) => warn!("Dropping slot {} after pool lock failure: {}", id, e),
        }
    }

    fn carve_super_block(&self, inner: &mut BlockPoolInner) -> Result<()> {
        let count = match self.max_slots {
            Some(max) => self.slots_per_super_block.min(max.saturating_sub(inner.total_slots)),
            None => self.slots_per_super_block,
        };
        if count == 0 {
            return Err(BlocksumError::Allocation(format!(
                "pool limit of {} slots of {} bytes reached",
                inner.total_slots, self.slot_size
            )));
        }

        let bytes = self.slot_size.checked_mul(count).ok_or_else(|| {
            BlocksumError::Allocation(format!(
                "super-block of {} x {} bytes overflows usize",
                count, self.slot_size
            ))
        })?;

        let super_block = inner.super_blocks;
        let mut arena = allocate_zeroed(bytes)?;
        let mut carved = Vec::with_capacity(count);
        for index in 0..count {
            let slot = arena.split_to(self.slot_size);
            carved.push((
                SlotId {
                    super_block,
                    index: index as u32,
                },
                slot,
            ));
        }

        // Lowest index ends up on top of the stack
        inner.free.extend(carved.into_iter().rev());
        inner.super_blocks += 1;
        inner.total_slots += count;

        debug!(
            "Carved super-block {} with {} slot(s) of {} bytes",
            super_block, count, self.slot_size
        );
        Ok(())
    }

    /// Current usage numbers
    pub fn stats(&self) -> Result<PoolStats> {
        let inner = self.acquire_lock()?;
        Ok(PoolStats {
            slot_size: self.slot_size,
            super_blocks: inner.super_blocks,
            total_slots: inner.total_slots,
            free_slots: inner.free.len(),
        })
    }
}

/// Allocate `bytes` zeroed bytes, reporting failure instead of aborting.
fn allocate_zeroed(bytes: usize) -> Result<BytesMut> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes).map_err(|e| {
        BlocksumError::Allocation(format!("cannot reserve super-block of {} bytes: {}", bytes, e))
    })?;
    buf.resize(bytes, 0);
    // A uniquely owned Bytes converts back without copying
    Ok(BytesMut::from(Bytes::from(buf)))
}
