//! Error types for the Tabula HTTP API.
//!
//! Every error renders as a JSON error document:
//!
//! ```json
//! {"errors": [{"status": "404", "code": "not-found", "detail": "..."}]}
//! ```
//!
//! # Error Mapping
//!
//! | Storage Error | HTTP Status | Code |
//! |--------------|-------------|------|
//! | NotFound | 404 | not-found |
//! | UnknownTable | 404 | unknown-table |
//! | ValidationError | 400 | invalid |
//! | InvalidIdentifier | 400 | invalid |
//! | UNIQUE constraint | 409 | conflict |
//! | BackendError | 500 | exception |
//!
//! Authorization failures are not storage errors. Handlers turn an empty
//! filtered result into [`RestError::Unauthorized`] or [`RestError::Forbidden`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tabula_persistence::error::{
    BackendError, LookupError, SchemaError, StorageError, ValidationError,
};
use tracing::error;

/// The primary error type for API operations.
#[derive(Debug)]
pub enum RestError {
    /// Row not found (HTTP 404).
    NotFound {
        /// The table name.
        table: String,
        /// The reference id.
        reference_id: String,
    },

    /// Table not governed by this server (HTTP 404).
    UnknownTable {
        /// The table name.
        table: String,
    },

    /// Bad request - validation error (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Missing or invalid credentials (HTTP 401).
    Unauthorized {
        /// Error message.
        message: String,
    },

    /// Access denied (HTTP 403).
    Forbidden {
        /// Error message.
        message: String,
    },

    /// Write conflicts with stored data (HTTP 409).
    Conflict {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl RestError {
    /// The denial for an actor: 401 for guests, 403 for authenticated actors.
    pub fn denied(is_guest: bool, table: &str, reference_id: &str) -> Self {
        if is_guest {
            RestError::Unauthorized {
                message: format!("Authentication required for {}/{}", table, reference_id),
            }
        } else {
            RestError::Forbidden {
                message: format!("Access to {}/{} denied", table, reference_id),
            }
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RestError::NotFound { .. } => (StatusCode::NOT_FOUND, "not-found"),
            RestError::UnknownTable { .. } => (StatusCode::NOT_FOUND, "unknown-table"),
            RestError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "invalid"),
            RestError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
            RestError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            RestError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            RestError::InternalError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "exception"),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.status_and_code().0
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound {
                table,
                reference_id,
            } => {
                write!(f, "Row not found: {}/{}", table, reference_id)
            }
            RestError::UnknownTable { table } => write!(f, "Unknown table: {}", table),
            RestError::BadRequest { message } => write!(f, "Bad request: {}", message),
            RestError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
            RestError::Forbidden { message } => write!(f, "Forbidden: {}", message),
            RestError::Conflict { message } => write!(f, "Conflict: {}", message),
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = error_document(status, code, &self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Builds the JSON error document returned for every failed request.
pub fn error_document(status: StatusCode, code: &str, detail: &str) -> serde_json::Value {
    serde_json::json!({
        "errors": [{
            "status": status.as_u16().to_string(),
            "code": code,
            "detail": detail
        }]
    })
}

// Conversions from storage errors

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Lookup(e) => e.into(),
            StorageError::Schema(e) => e.into(),
            StorageError::Validation(e) => e.into(),
            StorageError::Backend(e) => e.into(),
        }
    }
}

impl From<LookupError> for RestError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound {
                table,
                reference_id,
            } => RestError::NotFound {
                table,
                reference_id,
            },
            LookupError::NotFoundById { table, id } => RestError::NotFound {
                table,
                reference_id: id.to_string(),
            },
            LookupError::UnknownTable { table } => RestError::UnknownTable { table },
            other => RestError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

impl From<SchemaError> for RestError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::InvalidIdentifier { identifier } => RestError::BadRequest {
                message: format!("Invalid identifier: {}", identifier),
            },
            other => RestError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for RestError {
    fn from(err: ValidationError) -> Self {
        RestError::BadRequest {
            message: err.to_string(),
        }
    }
}

impl From<BackendError> for RestError {
    fn from(err: BackendError) -> Self {
        let message = err.to_string();
        if message.contains("UNIQUE constraint failed") {
            return RestError::Conflict { message };
        }
        RestError::InternalError { message }
    }
}

/// Result type for API operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = RestError::NotFound {
            table: "invoice".to_string(),
            reference_id: "r1".to_string(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            RestError::denied(true, "invoice", "r1").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RestError::denied(false, "invoice", "r1").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_storage_error_mapping() {
        let err: RestError = StorageError::Lookup(LookupError::NotFound {
            table: "invoice".to_string(),
            reference_id: "r1".to_string(),
        })
        .into();
        assert!(matches!(err, RestError::NotFound { .. }));

        let err: RestError = StorageError::Validation(ValidationError::UnknownColumn {
            table: "invoice".to_string(),
            column: "color".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: RestError = StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: "UNIQUE constraint failed: user_account.email".to_string(),
            source: None,
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_document() {
        let doc = error_document(StatusCode::FORBIDDEN, "forbidden", "nope");
        assert_eq!(doc["errors"][0]["status"], "403");
        assert_eq!(doc["errors"][0]["code"], "forbidden");
    }
}
