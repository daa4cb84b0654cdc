// Copyright 2024
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for blocksum: the library on real files and the
//! `blocksum` binary.

mod cli_test;
mod file_pipeline_test;

use std::path::Path;

use blocksum::checksum::crc32;
use blocksum::constants::CHECKSUM_WIDTH;

/// The CRC-32 of every zero-padded `block_size` window of `data`.
pub fn expected_checksums(data: &[u8], block_size: usize) -> Vec<u32> {
    data.chunks(block_size)
        .map(|chunk| {
            let mut padded = chunk.to_vec();
            padded.resize(block_size, 0);
            crc32(&padded)
        })
        .collect()
}

/// Read an output file back as native-endian `u32`s.
pub fn read_checksums(path: &Path) -> Vec<u32> {
    let bytes = std::fs::read(path).expect("Failed to read output file");
    assert_eq!(bytes.len() % CHECKSUM_WIDTH, 0);
    bytes
        .chunks_exact(CHECKSUM_WIDTH)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
