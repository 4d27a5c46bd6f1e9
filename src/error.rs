//! Engine error handling
//!
//! The scheduler never surfaces runtime failures to the caller (capacity
//! overruns degrade to empty chunks, pool exhaustion retries next frame),
//! so the error type only covers construction-time problems.

use thiserror::Error;

/// Result alias used across the crate.
pub type TerrainResult<T> = Result<T, TerrainError>;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
