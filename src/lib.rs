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

//! Blocksum computes a stream of per-block checksums for a file.
//!
//! The input is split into fixed-size blocks, the last one zero-padded, and a
//! 32-bit checksum of every block is written to the output in file order as
//! native-endian `u32`s. Reading, hashing and writing run concurrently on a
//! bounded pipeline backed by a fixed-size block pool.

pub mod block;
pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod parallel;
pub mod pipeline;
pub mod pool;

// Re-exports for a cleaner API
pub use checksum::{BlockChecksum, ChecksumAlgorithm};
pub use config::PipelineConfig;
pub use error::{BlocksumError, Result};
pub use pipeline::{Pipeline, PipelineReport};
