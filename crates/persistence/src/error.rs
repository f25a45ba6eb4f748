//! Error types for the persistence layer.
//!
//! Errors are grouped by where they originate: row lookups, schema
//! definitions, row validation and the storage backend itself.
//!
//! Authorization outcomes are deliberately absent from this hierarchy. A denied
//! capability is represented as data (a [`PermissionInstance`] with no grants,
//! a filtered row set) and never as an `Err`.
//!
//! [`PermissionInstance`]: crate::permission::PermissionInstance

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Row and column lookup errors
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Table definition errors
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Row validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while locating rows or reading their columns.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The table is not part of the reconciled schema.
    #[error("unknown table: {table}")]
    UnknownTable { table: String },

    /// No row with the given reference id exists.
    #[error("row not found: {table}/{reference_id}")]
    NotFound { table: String, reference_id: String },

    /// No row with the given numeric id exists.
    #[error("row not found: {table}#{id}")]
    NotFoundById { table: String, id: i64 },

    /// The row does not carry the requested column.
    #[error("missing column {column} on {table} row")]
    MissingColumn { table: String, column: String },

    /// The column holds a value of an unexpected JSON type.
    #[error("column {column} on {table} row is not {expected}")]
    WrongType {
        table: String,
        column: String,
        expected: &'static str,
    },
}

/// Errors in configured or reflected table definitions.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A table or column name is not a safe SQL identifier.
    #[error("invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    /// Two definitions disagree and cannot be reconciled.
    #[error("conflicting definitions for {table}: {message}")]
    Conflict { table: String, message: String },

    /// A schema configuration file could not be read or parsed.
    #[error("failed to load schema file {path}: {message}")]
    ConfigFile { path: String, message: String },

    /// A rule tag is not recognized.
    #[error("unknown rule '{tag}' on {table}.{column}")]
    UnknownRule {
        table: String,
        column: String,
        tag: String,
    },
}

/// Errors raised when a row fails validation before it is written.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A value violates a validation rule.
    #[error("invalid value for {table}.{column}: {message}")]
    InvalidField {
        table: String,
        column: String,
        message: String,
    },

    /// The payload names a column the table does not have.
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: String, column: String },

    /// The payload must be a JSON object.
    #[error("invalid payload for {table}: {message}")]
    InvalidPayload { table: String, message: String },
}

/// Errors specific to storage backends.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
