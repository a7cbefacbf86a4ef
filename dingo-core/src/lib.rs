//! DingoDB YCSB Core - Schema, Record and Error Types
//!
//! Data types shared by the storage clients and the binding. The record
//! mapper itself lives in `dingo-binding`.

use std::collections::{BTreeMap, HashMap};

pub mod config;
pub mod error;
pub mod schema;

pub use config::{
    BindingConfig, Credentials, TableCommand, DEFAULT_LMDB_MAP_SIZE_MB, MAX_LMDB_MAP_SIZE_MB,
};
pub use error::{
    BindingError, BindingResult, ConfigError, ConnectionError, MappingError, SchemaError,
    Status, StorageError,
};
pub use schema::{build_schema, normalize_name, Column, TableDefinition, TableOptions, TableSchema};

// ============================================================================
// CONSTANTS
// ============================================================================

/// The primary key column in the user table.
pub const PRIMARY_KEY: &str = "YCSB_KEY";

/// Prefix of the value columns (`FIELD0`, `FIELD1`, ...).
pub const COLUMN_PREFIX: &str = "FIELD";

/// Declared type of every column.
pub const DEFAULT_COLUMN_TYPE: &str = "varchar";

/// Length of generated column defaults.
pub const DEFAULT_VALUE_LEN: usize = 20;

/// Default table name.
pub const DEFAULT_TABLE: &str = "usertable";

/// Default number of value columns.
pub const DEFAULT_FIELD_COUNT: i64 = 10;

/// Largest accepted number of value columns.
pub const MAX_FIELD_COUNT: i64 = 4096;

pub const COORDINATOR_HOST_PROPERTY: &str = "coordinator.host";
pub const TABLE_PROPERTY: &str = "dingo.table";
pub const FIELD_COUNT_PROPERTY: &str = "fieldcount";
pub const USER_PROPERTY: &str = "dingo.user";
pub const PASSWORD_PROPERTY: &str = "dingo.password";
pub const TABLE_COMMAND_PROPERTY: &str = "command";
pub const LMDB_MAP_SIZE_PROPERTY: &str = "lmdb.map_size_mb";

// ============================================================================
// RECORD SHAPES
// ============================================================================

/// A column value; `None` is NULL and doubles as the missing-field sentinel.
pub type Value = Option<String>;

/// Positional shape: values aligned 1:1 with a schema's columns.
pub type Row = Vec<Value>;

/// Map shape as supplied by the workload generator.
pub type FieldMap = HashMap<String, String>;

/// Map shape returned to the workload generator.
pub type Record = BTreeMap<String, Value>;
