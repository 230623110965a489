//! Mock driver error types

use cloudweave_cloud::{DriverError, ResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockError {
    #[error("{kind} not found: {id}")]
    UnknownResource { kind: ResourceKind, id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{kind} {id} is in use: {reason}")]
    InUse {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// Failure planted through [`MockCloud::fail_next`](crate::MockCloud::fail_next)
    #[error("{0}")]
    Injected(DriverError),
}

impl MockError {
    pub(crate) fn unknown(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::UnknownResource {
            kind,
            id: id.into(),
        }
    }
}

impl From<MockError> for DriverError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::UnknownResource { .. } => DriverError::NotFound(err.to_string()),
            MockError::InvalidRequest(_) | MockError::InUse { .. } => {
                DriverError::Fatal(err.to_string())
            }
            MockError::Injected(inner) => inner,
        }
    }
}

pub type Result<T> = std::result::Result<T, MockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_driver_taxonomy() {
        let err: DriverError = MockError::unknown(ResourceKind::Vm, "vm-1").into();
        assert!(err.is_not_found());

        let err: DriverError = MockError::InvalidRequest("empty cidr".into()).into();
        assert!(matches!(err, DriverError::Fatal(_)));

        let err: DriverError = MockError::Injected(DriverError::Transient("slow".into())).into();
        assert!(err.is_transient());
    }
}
