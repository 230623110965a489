//! Runtime error types

use crate::iid::StoreError;
use cloudweave_cloud::DriverError;
use cloudweave_config::ConfigError;
use thiserror::Error;

/// Errors returned by the runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A required field was empty or malformed; reported before any lock or provider call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Provider error: {0}")]
    Provider(#[from] DriverError),

    /// A waiter ran out of time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Compensation after a failed step failed as well
    #[error("{original}; compensation failed: {compensation}")]
    PartialFailure {
        original: Box<RuntimeError>,
        compensation: Box<RuntimeError>,
    },

    #[error("Identity store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    pub(crate) fn partial(original: RuntimeError, compensation: impl Into<RuntimeError>) -> Self {
        Self::PartialFailure {
            original: Box::new(original),
            compensation: Box::new(compensation.into()),
        }
    }

    /// Lookup miss in the identity store or on the provider
    pub fn is_not_found(&self) -> bool {
        match self {
            RuntimeError::NotFound(_) => true,
            RuntimeError::Provider(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_mentions_both() {
        let err = RuntimeError::partial(
            RuntimeError::Store(StoreError::Unavailable("disk full".into())),
            DriverError::fatal("delete rejected"),
        );
        let msg = err.to_string();
        assert!(msg.contains("disk full"));
        assert!(msg.contains("delete rejected"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(RuntimeError::NotFound("vpc v1".into()).is_not_found());
        assert!(RuntimeError::Provider(DriverError::not_found("vpc-1")).is_not_found());
        assert!(!RuntimeError::Provider(DriverError::fatal("boom")).is_not_found());
        assert!(!RuntimeError::Timeout("vm".into()).is_not_found());
    }
}
