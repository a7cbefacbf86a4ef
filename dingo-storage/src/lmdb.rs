//! LMDB-backed storage client.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist tables on local
//! disk, so that the table command and benchmark workers can share data
//! across processes.
//!
//! # Layout
//!
//! Two named databases in one environment:
//! - `catalog`: table name -> JSON table definition
//! - `rows`: [`TableScopedKey`] -> JSON positional row
//!
//! LMDB keeps keys in byte order, which gives `scan` its ordering guarantee.
//!
//! # Thread Safety
//!
//! Reads use read transactions, writes use write transactions. The catalog
//! is mirrored in memory behind an `RwLock`.

use std::collections::HashMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dingo_core::{BindingError, BindingResult, ConnectionError, Row, StorageError, TableSchema};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::table_key::TableScopedKey;
use crate::{extract_key, StorageClient};

/// Error type for LMDB client operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStorageError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment at {path}: {reason}")]
    EnvOpen { path: String, reason: String },

    /// Failed to open a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStorageError> for BindingError {
    fn from(e: LmdbStorageError) -> Self {
        match e {
            LmdbStorageError::EnvOpen { path, reason } => {
                BindingError::Connection(ConnectionError::Unreachable {
                    endpoint: path,
                    reason,
                })
            }
            other => BindingError::Storage(StorageError::Backend {
                reason: other.to_string(),
            }),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbStorageError {
    LmdbStorageError::Transaction(e.to_string())
}

/// LMDB storage client.
pub struct LmdbStorage {
    path: PathBuf,
    env: Env,
    catalog: Database<Bytes, Bytes>,
    rows: Database<Bytes, Bytes>,
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for LmdbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStorage")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl LmdbStorage {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The map size in bytes overflows `usize`
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - The catalog cannot be read
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStorageError> {
        let path = path.as_ref().to_path_buf();
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| LmdbStorageError::EnvOpen {
                path: path.display().to_string(),
                reason: format!("map size of {} MB overflows", max_size_mb),
            })?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(&path)
        }
        .map_err(|e| LmdbStorageError::EnvOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let catalog: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("catalog"))
            .map_err(|e| LmdbStorageError::DbOpen(e.to_string()))?;
        let rows: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("rows"))
            .map_err(|e| LmdbStorageError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        let mut tables = HashMap::new();
        {
            let rtxn = env.read_txn().map_err(txn_err)?;
            for entry in catalog.iter(&rtxn).map_err(txn_err)? {
                let (_, bytes) = entry.map_err(txn_err)?;
                let schema: TableSchema = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStorageError::Deserialization(e.to_string()))?;
                tables.insert(schema.name().to_string(), Arc::new(schema));
            }
        }

        tracing::debug!(path = %path.display(), tables = tables.len(), "Opened LMDB storage");

        Ok(Self {
            path,
            env,
            catalog,
            rows,
            tables: RwLock::new(tables),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> BindingResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed.into());
        }
        Ok(())
    }

    fn schema(&self, table: &str) -> BindingResult<Arc<TableSchema>> {
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        tables.get(table).cloned().ok_or_else(|| {
            StorageError::TableNotFound {
                table: table.to_string(),
            }
            .into()
        })
    }

    fn decode_row(bytes: &[u8]) -> Result<Row, LmdbStorageError> {
        serde_json::from_slice(bytes).map_err(|e| LmdbStorageError::Deserialization(e.to_string()))
    }

    /// Collect every row key belonging to a table.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbStorageError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut keys = Vec::new();
        for entry in self.rows.prefix_iter(&rtxn, prefix).map_err(txn_err)? {
            let (key, _) = entry.map_err(txn_err)?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }
}

impl StorageClient for LmdbStorage {
    fn create_table(&self, schema: &TableSchema) -> BindingResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        if tables.contains_key(schema.name()) {
            return Err(StorageError::TableExists {
                table: schema.name().to_string(),
            }
            .into());
        }

        let bytes = serde_json::to_vec(schema)
            .map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.catalog
            .put(&mut wtxn, schema.name().as_bytes(), &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        tables.insert(schema.name().to_string(), Arc::new(schema.clone()));
        Ok(())
    }

    fn drop_table(&self, table: &str) -> BindingResult<bool> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        if tables.remove(table).is_none() {
            return Ok(false);
        }

        let keys = self.collect_keys_with_prefix(&TableScopedKey::table_prefix(table))?;
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        for key in &keys {
            self.rows.delete(&mut wtxn, key).map_err(txn_err)?;
        }
        self.catalog
            .delete(&mut wtxn, table.as_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        tracing::debug!(table, rows = keys.len(), "Dropped LMDB table");
        Ok(true)
    }

    fn table(&self, table: &str) -> BindingResult<Option<TableSchema>> {
        self.ensure_open()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tables.get(table).map(|schema| schema.as_ref().clone()))
    }

    fn get(&self, table: &str, key: &str) -> BindingResult<Option<Row>> {
        self.ensure_open()?;
        self.schema(table)?;

        let encoded = TableScopedKey::new(table, key).encode();
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        match self.rows.get(&rtxn, &encoded).map_err(txn_err)? {
            Some(bytes) => Ok(Some(Self::decode_row(bytes)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, table: &str, row: Row) -> BindingResult<()> {
        self.ensure_open()?;
        let schema = self.schema(table)?;
        let key = extract_key(&schema, &row)?;

        let bytes = serde_json::to_vec(&row)
            .map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;
        let encoded = TableScopedKey::new(table, key).encode();

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.rows.put(&mut wtxn, &encoded, &bytes).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn delete(&self, table: &str, key: &str) -> BindingResult<bool> {
        self.ensure_open()?;
        self.schema(table)?;

        let encoded = TableScopedKey::new(table, key).encode();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.rows.delete(&mut wtxn, &encoded).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    fn scan(&self, table: &str, start_key: &str, limit: usize) -> BindingResult<Vec<Row>> {
        self.ensure_open()?;
        self.schema(table)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let prefix = TableScopedKey::table_prefix(table);
        let start = TableScopedKey::new(table, start_key).encode();
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) =
            (Bound::Included(start.as_slice()), Bound::Unbounded);

        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut rows = Vec::new();
        for entry in self.rows.range(&rtxn, &bounds).map_err(txn_err)? {
            let (key, bytes) = entry.map_err(txn_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            rows.push(Self::decode_row(bytes)?);
            if rows.len() == limit {
                break;
            }
        }
        Ok(rows)
    }

    fn close(&self) -> BindingResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.env
                .force_sync()
                .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;
            tracing::debug!(path = %self.path.display(), "Closed LMDB storage");
        }
        Ok(())
    }
}
