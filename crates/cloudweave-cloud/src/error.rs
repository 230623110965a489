//! Driver error types
//!
//! Every driver maps its own SDK failures onto these variants. The runtime
//! branches on the variant only and never looks at the message text.

use thiserror::Error;

/// Errors reported by a provider driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The addressed resource does not exist on the provider
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Temporary failure (throttling, network), the same call may succeed later
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Permanent failure of the call
    #[error("Provider error: {0}")]
    Fatal(String),

    /// The driver does not implement this operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
}

impl DriverError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type for driver calls
pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(DriverError::not_found("vpc-1").is_not_found());
        assert!(!DriverError::fatal("boom").is_not_found());
        assert!(DriverError::Transient("throttled".into()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = DriverError::not_found("i-1234");
        assert_eq!(err.to_string(), "Resource not found: i-1234");
    }
}
