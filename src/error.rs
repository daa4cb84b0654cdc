//! Error types for blocksum.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for blocksum operations.
#[derive(Debug, Error)]
pub enum BlocksumError {
    /// An I/O error occurred outside of the pipeline stages.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bad command line usage or an invalid configuration value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The input could not be opened or the output could not be created.
    #[error("Cannot open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the input failed before end of file was reached.
    #[error("Error during file reading at block {block}: {source}")]
    Read {
        block: u64,
        #[source]
        source: io::Error,
    },

    /// Writing a checksum to the output failed.
    #[error("Error while writing the result file: {0}")]
    Write(#[source] io::Error),

    /// The block pool could not carve another super-block.
    #[error("Block pool allocation failed: {0}")]
    Allocation(String),

    /// A checksum task failed or panicked on a worker thread.
    #[error("Checksum task failed: {0}")]
    Task(String),

    /// Occurs when attempting to interact with a closed queue or pool.
    #[error("Queue is closed: {0}")]
    QueueClosed(String),

    /// The pipeline was aborted because another stage failed.
    #[error("Pipeline aborted: {0}")]
    Aborted(String),

    /// A general error occurred.
    #[error("{0}")]
    Other(String),
}

impl BlocksumError {
    /// Short label for the fault kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            BlocksumError::Io(_) => "io",
            BlocksumError::InvalidArgument(_) => "argument",
            BlocksumError::Open { .. } => "open",
            BlocksumError::Read { .. } => "read",
            BlocksumError::Write(_) => "write",
            BlocksumError::Allocation(_) => "allocation",
            BlocksumError::Task(_) => "task",
            BlocksumError::QueueClosed(_) => "queue-closed",
            BlocksumError::Aborted(_) => "aborted",
            BlocksumError::Other(_) => "other",
        }
    }
}

/// A specialized Result type for blocksum operations.
pub type Result<T> = std::result::Result<T, BlocksumError>;
