use crate::auth::gate::Denial;
use crate::auth::key_lifecycle::KeyLifecycleError;
use crate::auth::scopes::Scope;
use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated,

    /// Caller lacks the scope required for the operation
    #[error("Missing required permission: {required}")]
    InsufficientPermissions { required: Scope },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// External store error outside of authentication
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(StoreError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated => "Unauthorized".to_string(),
            Error::InsufficientPermissions { required } => format!("Missing required permission: {required}"),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::Internal { operation } => format!("Failed to {operation}"),
            Error::Store(StoreError::Timeout(_)) => "Identity store did not respond in time".to_string(),
            Error::Store(_) => "Identity store error occurred".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::Store(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Unauthenticated | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => Error::Unauthenticated,
            Denial::Forbidden { missing } => Error::InsufficientPermissions { required: missing },
        }
    }
}

impl From<KeyLifecycleError> for Error {
    fn from(err: KeyLifecycleError) -> Self {
        match err {
            KeyLifecycleError::Denied(denial) => denial.into(),
            KeyLifecycleError::NotFound { key_id } => Error::NotFound {
                resource: "API key".to_string(),
                id: key_id,
            },
            KeyLifecycleError::Store { operation, source } => {
                tracing::error!("{operation} failed: {source}");
                Error::Internal {
                    operation: operation.to_string(),
                }
            }
            validation => Error::BadRequest {
                message: validation.to_string(),
            },
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_and_messages() {
        let err = Error::from(Denial::Unauthenticated);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Unauthorized");

        let err = Error::from(Denial::Forbidden {
            missing: Scope::ApiKeysWrite,
        });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.user_message(), "Missing required permission: apikeys:write");

        let err = Error::Internal {
            operation: "create API key".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Failed to create API key");
    }

    #[test]
    fn test_key_lifecycle_errors_map_to_http() {
        let err = Error::from(KeyLifecycleError::EmptyName);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Key name is required");

        let err = Error::from(KeyLifecycleError::NotAdmin { action: "delete" });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Only admins can delete API keys");

        let err = Error::from(KeyLifecycleError::NotFound {
            key_id: "abc".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "API key not found");

        let err = Error::from(KeyLifecycleError::Store {
            operation: "delete API key",
            source: StoreError::Unavailable("down".to_string()),
        });
        assert_eq!(err.user_message(), "Failed to delete API key");
    }

    #[test]
    fn test_store_errors_do_not_leak_details() {
        let err = Error::from(StoreError::Unavailable("postgres://secret@host".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("secret"));
    }
}
