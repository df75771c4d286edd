//! Error types for the plan services.

use thiserror::Error;
use trainer_plans_client::{ErrorKind, PlanError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Plan(e) => e.kind(),
            AppError::Validation(_) | AppError::Forbidden(_) => ErrorKind::ValidationFailure,
            AppError::Serialization(_) => ErrorKind::ParseFailure,
        }
    }

    /// Notice shown to the user. Remote failures are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Plan(e) => match e.kind() {
                ErrorKind::NotFound => format!("Could not find what you were editing: {e}"),
                ErrorKind::ValidationFailure => format!("Please check the form: {e}"),
                ErrorKind::ParseFailure => format!("The stored plan could not be read: {e}"),
                ErrorKind::RemoteFailure | ErrorKind::Config => e.to_string(),
            },
            AppError::Validation(msg) => format!("Please check the form: {msg}"),
            AppError::Forbidden(msg) => format!("You cannot do that: {msg}"),
            AppError::Serialization(e) => format!("The plan could not be saved: {e}"),
        }
    }
}

/// Result type alias for service operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_is_verbatim() {
        let err = AppError::from(PlanError::Remote {
            status: 503,
            body: "maintenance".into(),
        });
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert_eq!(err.user_message(), "remote service returned 503: maintenance");
    }

    #[test]
    fn forbidden_is_a_validation_failure() {
        let err = AppError::Forbidden("clients cannot edit plans".into());
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert!(err.user_message().contains("clients cannot edit plans"));
    }
}
