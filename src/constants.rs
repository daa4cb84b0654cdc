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

//! Operational constants for the checksum pipeline.

/// Block size used when none is given (1,000,000 bytes).
pub const DEFAULT_BLOCK_SIZE: usize = 1_000_000;

/// Smallest accepted block size in bytes.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Default capacity of the block queue and of the result queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 300;

/// Number of slots carved out of each super-block of the block pool.
pub const DEFAULT_SLOTS_PER_SUPER_BLOCK: usize = 10;

/// Threads kept free for the reader, hasher and writer stages when sizing the worker pool.
pub const RESERVED_THREADS: usize = 2;

/// Lower bound on the default number of worker threads.
pub const MIN_WORKER_THREADS: usize = 4;

/// Width of one checksum in the output file.
pub const CHECKSUM_WIDTH: usize = 4;

/// Key for the HighwayHash checksum ("blocksum" / "checksum" repeated as little-endian words).
pub const HIGHWAY_HASH_KEY: [u64; 4] = [
    0x6d75736b636f6c62,
    0x6d75736b63656863,
    0x6d75736b636f6c62,
    0x6d75736b63656863,
];
