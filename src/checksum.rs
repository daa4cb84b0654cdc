//! Block checksum algorithms.
//!
//! The pipeline treats the checksum as an opaque `bytes -> u32` function behind
//! the [`BlockChecksum`] trait. Two implementations ship with the crate:
//! CRC-32 (the default) and a 32-bit fold of HighwayHash.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use highway::{HighwayHash, HighwayHasher, Key};

use crate::constants::HIGHWAY_HASH_KEY;
use crate::error::{BlocksumError, Result};

/// A 32-bit checksum computed over one full block.
///
/// Implementations are shared by every worker thread, so they must be
/// stateless or internally synchronized.
pub trait BlockChecksum: Send + Sync {
    /// Compute the checksum of `data`.
    fn checksum(&self, data: &[u8]) -> Result<u32>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// CRC-32 (ISO-HDLC polynomial, the same variant used by zlib and PNG).
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32;

impl BlockChecksum for Crc32 {
    fn checksum(&self, data: &[u8]) -> Result<u32> {
        Ok(crc32(data))
    }

    fn name(&self) -> &'static str {
        "crc32"
    }
}

/// HighwayHash-64 folded down to 32 bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Highway;

impl BlockChecksum for Highway {
    fn checksum(&self, data: &[u8]) -> Result<u32> {
        Ok(highway_hash32(data))
    }

    fn name(&self) -> &'static str {
        "highway"
    }
}

/// Calculate the CRC-32 of a block.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Calculate HighwayHash-64 of a block and fold it to 32 bits.
pub fn highway_hash32(data: &[u8]) -> u32 {
    let mut hasher = HighwayHasher::new(Key(HIGHWAY_HASH_KEY));
    hasher.append(data);
    let hash = hasher.finalize64();
    ((hash >> 32) ^ (hash & 0xffff_ffff)) as u32
}

/// Selectable checksum algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    #[default]
    Crc32,
    Highway,
}

impl ChecksumAlgorithm {
    /// Build the shared checksum implementation for this algorithm.
    pub fn build(self) -> Arc<dyn BlockChecksum> {
        match self {
            ChecksumAlgorithm::Crc32 => Arc::new(Crc32),
            ChecksumAlgorithm::Highway => Arc::new(Highway),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Crc32 => write!(f, "crc32"),
            ChecksumAlgorithm::Highway => write!(f, "highway"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = BlocksumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "highway" => Ok(ChecksumAlgorithm::Highway),
            other => Err(BlocksumError::InvalidArgument(format!(
                "unknown checksum algorithm '{}' (expected crc32 or highway)",
                other
            ))),
        }
    }
}
