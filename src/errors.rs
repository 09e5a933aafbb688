//! Error types for the pool and container

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Warm-up of {requested} objects exceeds pool capacity of {capacity}")]
    WarmupExceedsCapacity { requested: usize, capacity: usize },

    #[error("Warm-up of {requested} objects needs a factory to construct them")]
    WarmupRequiresFactory { requested: usize },
}

pub type PoolResult<T> = Result<T, PoolError>;
