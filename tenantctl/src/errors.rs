use crate::db::errors::DbError;
use crate::types::Operation;
use crate::validation::FieldError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Acting user's tenant does not contain the resource's tenant
    #[error("Not authorized to {action} {resource}")]
    Forbidden { action: Operation, resource: String },

    /// One or more field-attributed rule failures
    #[error("Validation failed: {}", join_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },

    /// Uniqueness violation detected by storage, optionally attributed to a field
    #[error("Conflict: {message}")]
    Conflict { field: Option<String>, message: String },

    /// Target of an update/delete does not exist
    #[error("{message}")]
    NotFound { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The small set of outcomes callers of the resource engine branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Missing,
    System,
    Unauthenticated,
    Forbidden,
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::NotFound { .. } => ErrorKind::Missing,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => ErrorKind::Missing,
                DbError::UniqueViolation { .. } => ErrorKind::Conflict,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => ErrorKind::Validation,
                DbError::Other(_) => ErrorKind::System,
            },
            Error::Internal { .. } | Error::Other(_) => ErrorKind::System,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Missing => StatusCode::NOT_FOUND,
            ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { action, resource } => format!("Not authorized to {action} this {resource}"),
            Error::Validation { .. } => "validation failed".to_string(),
            Error::Conflict { message, .. } => message.clone(),
            Error::NotFound { message } => message.clone(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Internal server error".to_string(),
            },
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match self.kind() {
            ErrorKind::System => tracing::error!("Internal service error: {:#}", self),
            ErrorKind::Conflict => tracing::warn!("Conflict error: {}", self),
            ErrorKind::Unauthenticated | ErrorKind::Forbidden => tracing::info!("Authorization error: {}", self),
            ErrorKind::Validation | ErrorKind::Missing => tracing::debug!("Client error: {}", self),
        }

        let status = self.status_code();

        match &self {
            Error::Validation { errors } => {
                let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
                let body = json!({ "message": self.user_message(), "errors": errors });
                (status, Json(body)).into_response()
            }
            Error::Conflict { field, message } => {
                let body = json!({ "message": message, "field": field });
                (status, Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_to_status() {
        let missing = Error::NotFound {
            message: "no user found with this id".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::Missing);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let conflict = Error::Conflict {
            field: Some("username".to_string()),
            message: "a user with username 'buckaroo' already exists".to_string(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let validation = Error::Validation {
            errors: vec![FieldError::new("email", "cannot be blank")],
        };
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_system_errors_are_opaque_to_callers() {
        let err = Error::Other(anyhow::anyhow!("connection reset by peer at 10.0.0.3"));
        assert_eq!(err.kind(), ErrorKind::System);
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Database(DbError::Other(anyhow::anyhow!("relation tm_user does not exist")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_validation_display_lists_fields() {
        let err = Error::Validation {
            errors: vec![
                FieldError::new("email", "cannot be blank"),
                FieldError::new("role", "cannot be blank"),
            ],
        };
        assert_eq!(err.to_string(), "Validation failed: 'email' cannot be blank, 'role' cannot be blank");
    }
}
