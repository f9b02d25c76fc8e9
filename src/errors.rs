//! Error types for the object pool

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error produced by a user supplied constructor
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool reached its maximum object count ({max})")]
    CapacityExceeded { max: usize },

    #[error("Creating a new object failed: {0}")]
    ConstructionFailed(#[source] Arc<dyn StdError + Send + Sync>),

    #[error("Object does not belong to this pool")]
    NotFound,

    #[error("Failed to start the background destructor: {0}")]
    WorkerSpawn(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

impl PoolError {
    pub(crate) fn construction(err: BoxError) -> Self {
        PoolError::ConstructionFailed(Arc::from(err))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = PoolError::construction(Box::new(io));

        assert!(err.to_string().contains("refused"));
        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "refused");
    }

    #[test]
    fn capacity_message_names_limit() {
        let err = PoolError::CapacityExceeded { max: 512 };
        assert_eq!(err.to_string(), "Pool reached its maximum object count (512)");
    }
}
