use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use uuid::Uuid;

/// Error taxonomy for the maintenance core.
///
/// Every variant except `DatabaseError` and `EventError` is a deterministic,
/// caller-facing rejection: the caller must correct its input and resubmit.
/// Nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Illegal status edge in either state machine (work order or equipment).
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// Attempted progression into execution without satisfied approval.
    #[error("approval required: {0}")]
    ApprovalRequired(String),

    /// Required field missing for the target state, or cost arithmetic
    /// mismatch beyond tolerance.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Attempt to assign already-assigned equipment, or assign equipment
    /// that is not active.
    #[error("assignment conflict: {0}")]
    AssignmentConflict(String),

    /// Malformed schedule definition (e.g. missing or non-positive interval).
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The record was mutated by another caller between read and write.
    #[error("concurrent modification of record {0}")]
    ConcurrentModification(Uuid),

    #[error("database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("event error: {0}")]
    EventError(String),
}

impl ServiceError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationFailed(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(e) => ServiceError::DatabaseError(e),
            TransactionError::Transaction(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_statuses() {
        let err = ServiceError::invalid_transition("scheduled", "completed");
        assert_eq!(
            err.to_string(),
            "invalid transition from 'scheduled' to 'completed'"
        );
    }

    #[test]
    fn validation_errors_convert_to_validation_failed() {
        let errors = validator::ValidationErrors::new();
        let err: ServiceError = errors.into();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }
}
