//! Error types for binding operations

use thiserror::Error;

/// Connection errors raised while opening or using the storage client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Coordinator {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Authentication rejected for user {user}")]
    AuthenticationRejected { user: String },

    #[error("Unsupported endpoint: {endpoint}")]
    UnsupportedEndpoint { endpoint: String },

    #[error("Storage client is closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Schema precondition violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table name must not be empty")]
    EmptyTableName,

    #[error("Table {table} has no columns")]
    NoColumns { table: String },

    #[error("Table {table} has no primary key column")]
    NoPrimaryKey { table: String },

    #[error("Table {table} declares {count} primary key columns")]
    MultiplePrimaryKeys { table: String, count: usize },
}

/// Record translation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The storage client returned a row whose width disagrees with the schema.
    #[error("Row shape mismatch on {table}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found in {table} for key {key}")]
    NotFound { table: String, key: String },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Table already exists: {table}")]
    TableExists { table: String },

    #[error("Write failed on {table} for key {key}: {reason}")]
    WriteFailed {
        table: String,
        key: String,
        reason: String,
    },

    #[error("Backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Outcome reported to the workload harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    BadRequest,
    Error,
}

/// Master error type for the binding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BindingError {
    /// Harness status for this error.
    pub fn status(&self) -> Status {
        match self {
            BindingError::Storage(StorageError::NotFound { .. }) => Status::NotFound,
            BindingError::Config(_) => Status::BadRequest,
            _ => Status::Error,
        }
    }

    /// True for a missing record, as opposed to a failed operation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BindingError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

// =============================================================================
// TESTS
// =============================================================================
