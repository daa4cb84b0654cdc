
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::checksum::crc32;

/// Deterministic pseudo-random input of `len` bytes.
pub(super) fn random_input(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// The CRC-32 of every zero-padded `block_size` window of `data`.
pub(super) fn expected_checksums(data: &[u8], block_size: usize) -> Vec<u32> {
    data.chunks(block_size)
        .map(|chunk| {
            let mut padded = chunk.to_vec();
            padded.resize(block_size, 0);
            crc32(&padded)
        })
        .collect()
}

/// Decode the output file format: native-endian `u32`s back to back.
pub(super) fn decode_output(bytes: &[u8]) -> Vec<u32> {
    assert_eq!(bytes.len() % 4, 0, "output is not a whole number of checksums");
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
