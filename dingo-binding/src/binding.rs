//! Per-operation entry points used by the workload harness.

use std::sync::Arc;

use dingo_core::{BindingResult, FieldMap, Record, Status, StorageError, TableSchema};

use crate::mapper::{overlay, to_positional, to_record};
use crate::pool::{ClientHandle, ClientPool};

/// Harness status for an operation result.
pub fn status_of<T>(result: &BindingResult<T>) -> Status {
    match result {
        Ok(_) => Status::Ok,
        Err(e) => e.status(),
    }
}

fn not_found(table: &str, key: &str) -> StorageError {
    StorageError::NotFound {
        table: table.to_string(),
        key: key.to_string(),
    }
}

/// One worker's view of the database.
///
/// Holds a handle on the shared session for its whole lifetime; the
/// session closes when the last `Binding` (or other handle) is dropped.
#[derive(Debug)]
pub struct Binding {
    handle: ClientHandle,
    field_count: i64,
}

impl Binding {
    /// Acquire the shared client and warm the configured table's schema.
    pub fn init(pool: &Arc<ClientPool>) -> BindingResult<Self> {
        let handle = pool.acquire()?;
        let config = pool.config();
        let schema = handle
            .registry()
            .get_or_build(&config.table, config.field_count)?;

        tracing::info!(
            table = %config.table,
            columns = schema.width(),
            users = pool.active_users(),
            "Binding initialized"
        );

        Ok(Self {
            handle,
            field_count: config.field_count,
        })
    }

    fn schema(&self, table: &str) -> BindingResult<Arc<TableSchema>> {
        self.handle.registry().get_or_build(table, self.field_count)
    }

    /// Read one record, optionally projected to `requested` fields.
    pub fn read(
        &self,
        table: &str,
        key: &str,
        requested: Option<&[&str]>,
    ) -> BindingResult<Record> {
        let result: BindingResult<Record> = self.schema(table).and_then(|schema| {
            let row = self
                .handle
                .client()
                .get(table, key)?
                .ok_or_else(|| not_found(table, key))?;
            to_record(&schema, &row, requested)
        });
        log_outcome("read", table, key, &result);
        result
    }

    /// Write a full record, replacing any existing row for `key`.
    pub fn insert(&self, table: &str, key: &str, fields: &FieldMap) -> BindingResult<()> {
        let result: BindingResult<()> = self.schema(table).and_then(|schema| {
            let row = to_positional(&schema, key, fields)?;
            self.handle.client().upsert(table, row)
        });
        log_outcome("insert", table, key, &result);
        result
    }

    /// Overwrite the supplied fields of an existing record.
    ///
    /// Read-modify-write without isolation: concurrent updates of the same
    /// key race and the last write wins.
    pub fn update(&self, table: &str, key: &str, fields: &FieldMap) -> BindingResult<()> {
        let result: BindingResult<()> = self.schema(table).and_then(|schema| {
            let client = self.handle.client();
            let mut row = client
                .get(table, key)?
                .ok_or_else(|| not_found(table, key))?;
            overlay(&schema, &mut row, fields)?;
            client.upsert(table, row)
        });
        log_outcome("update", table, key, &result);
        result
    }

    pub fn delete(&self, table: &str, key: &str) -> BindingResult<()> {
        let result: BindingResult<()> = match self.handle.client().delete(table, key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(not_found(table, key).into()),
            Err(e) => Err(e),
        };
        log_outcome("delete", table, key, &result);
        result
    }

    /// Up to `count` records in key order, starting at `start_key`.
    pub fn scan(
        &self,
        table: &str,
        start_key: &str,
        count: usize,
        requested: Option<&[&str]>,
    ) -> BindingResult<Vec<Record>> {
        let result: BindingResult<Vec<Record>> = self.schema(table).and_then(|schema| {
            self.handle
                .client()
                .scan(table, start_key, count)?
                .iter()
                .map(|row| to_record(&schema, row, requested))
                .collect()
        });
        log_outcome("scan", table, start_key, &result);
        result
    }

    /// Release this worker's handle on the shared client.
    pub fn cleanup(self) {
        tracing::debug!(tables = self.handle.registry().len(), "Binding cleanup");
    }
}

fn log_outcome<T>(op: &'static str, table: &str, key: &str, result: &BindingResult<T>) {
    match result {
        Ok(_) => tracing::trace!(op, table, key, "Operation succeeded"),
        Err(e) if e.is_not_found() => tracing::debug!(op, table, key, "Record not found"),
        Err(e) => tracing::warn!(op, table, key, error = %e, "Operation failed"),
    }
}
