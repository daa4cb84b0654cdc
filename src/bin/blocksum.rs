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

//! Command line front end: `blocksum <input> <output> [block-size]`.
//!
//! Usage errors exit with code 2 before any file is touched; failures while
//! checksumming exit with code 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{info, LevelFilter};

use blocksum::config::validate_block_size;
use blocksum::constants::{DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SLOTS_PER_SUPER_BLOCK};
use blocksum::{BlocksumError, ChecksumAlgorithm, Pipeline, PipelineConfig, Result};

/// Write a 32-bit checksum for every fixed-size block of a file
#[derive(Parser, Debug)]
#[command(name = "blocksum", version, about, long_about = None)]
struct Cli {
    /// File to checksum
    input: PathBuf,

    /// File receiving one native-endian u32 per block
    output: PathBuf,

    /// Block size in bytes (at least 8)
    #[arg(default_value_t = DEFAULT_BLOCK_SIZE, value_parser = parse_block_size)]
    block_size: usize,

    /// Worker threads computing checksums [default: available cores - 2, at least 4]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of the block queue and of the result queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = parse_positive)]
    queue_capacity: usize,

    /// Blocks allocated together when the block pool grows
    #[arg(long, default_value_t = DEFAULT_SLOTS_PER_SUPER_BLOCK, value_parser = parse_positive)]
    slots_per_super_block: usize,

    /// Checksum algorithm: crc32 or highway
    #[arg(short, long, default_value_t = ChecksumAlgorithm::Crc32, value_parser = parse_algorithm)]
    algorithm: ChecksumAlgorithm,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_block_size(value: &str) -> std::result::Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a valid block size", value))?;
    validate_block_size(size).map_err(|e| e.to_string())?;
    Ok(size)
}

fn parse_positive(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a positive integer", value)),
    }
}

fn parse_algorithm(value: &str) -> std::result::Result<ChecksumAlgorithm, String> {
    value.parse().map_err(|e: BlocksumError| e.to_string())
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default()
            .with_block_size(self.block_size)?
            .with_queue_capacity(self.queue_capacity)?
            .with_slots_per_super_block(self.slots_per_super_block)?
            .with_algorithm(self.algorithm);
        if let Some(workers) = self.workers {
            config = config.with_worker_threads(workers);
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, overrides the -v level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn describe(err: &BlocksumError) -> String {
    match err {
        BlocksumError::InvalidArgument(msg) => format!("Invalid argument: {}", msg),
        BlocksumError::Open { path, source } => {
            format!("Cannot open '{}': {}", path.display(), source)
        }
        BlocksumError::Read { block, source } => {
            format!("Error during file reading at block {}: {}", block, source)
        }
        BlocksumError::Write(source) => format!("Error while writing the result file: {}", source),
        BlocksumError::Allocation(msg) => format!("Out of memory for blocks: {}", msg),
        BlocksumError::Task(msg) => format!("Checksum computation failed: {}", msg),
        other => format!("Error: {}", other),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let pipeline = Pipeline::new(cli.pipeline_config()?)?;
    let report = pipeline.run_files(&cli.input, &cli.output)?;
    info!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}
