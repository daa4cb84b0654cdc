//! Threading building blocks shared by the pipeline stages.
//!
//! - [`queue`]: closeable, cancellable blocking FIFO
//! - [`promise`]: one-shot result handoff between a worker and a waiter
//! - [`worker_pool`]: fixed set of threads running submitted checksum jobs

pub mod promise;
pub mod queue;
pub mod worker_pool;
