//! Per-session schema registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dingo_core::{build_schema, BindingResult, StorageError, TableSchema};

/// Build-once cache of table schemas, keyed by table name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached schema for `table`, building it on first use.
    ///
    /// A later call with a different `field_count` gets the cached schema.
    pub fn get_or_build(&self, table: &str, field_count: i64) -> BindingResult<Arc<TableSchema>> {
        if let Some(schema) = self.get(table)? {
            if schema.width() as i64 != field_count + 1 {
                tracing::debug!(
                    table,
                    cached = schema.width() - 1,
                    requested = field_count,
                    "Field count differs from cached schema"
                );
            }
            return Ok(schema);
        }

        let mut schemas = self.schemas.write().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(schema) = schemas.get(table) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(build_schema(table, field_count)?);
        schemas.insert(table.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// The cached schema for `table`, if any.
    pub fn get(&self, table: &str) -> BindingResult<Option<Arc<TableSchema>>> {
        let schemas = self.schemas.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(schemas.get(table).cloned())
    }

    pub fn len(&self) -> usize {
        self.schemas.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
