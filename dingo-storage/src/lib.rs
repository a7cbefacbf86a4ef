//! DingoDB YCSB Storage - Storage Client Trait and Implementations
//!
//! Defines the client connection abstraction the binding talks to. Rows
//! cross this boundary in positional shape only; the storage client never
//! looks columns up by name.
//!
//! Two clients ship with the crate:
//! - [`MockStorage`]: in-memory, ordered, for tests and `mem://` endpoints
//! - [`LmdbStorage`]: on-disk via heed, for `lmdb://` endpoints

pub mod lmdb;
pub mod table_key;

pub use lmdb::{LmdbStorage, LmdbStorageError};
pub use table_key::TableScopedKey;

use dingo_core::{
    BindingConfig, BindingResult, ConnectionError, Credentials, Row, StorageError, TableSchema,
    Value,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Endpoint scheme for the in-memory client.
pub const MEM_SCHEME: &str = "mem://";

/// Endpoint scheme for the LMDB client.
pub const LMDB_SCHEME: &str = "lmdb://";

// ============================================================================
// STORAGE CLIENT TRAIT
// ============================================================================

/// Client connection to a column-table store.
///
/// Calls are synchronous and bounded by the client's own timeouts.
pub trait StorageClient: Send + Sync {
    // === Administrative Operations ===

    /// Create a table from a schema.
    fn create_table(&self, schema: &TableSchema) -> BindingResult<()>;

    /// Drop a table and all of its rows. Returns false if it did not exist.
    fn drop_table(&self, table: &str) -> BindingResult<bool>;

    /// Describe a table.
    fn table(&self, table: &str) -> BindingResult<Option<TableSchema>>;

    // === Row Operations ===

    /// Point read by primary key.
    fn get(&self, table: &str, key: &str) -> BindingResult<Option<Row>>;

    /// Insert or overwrite a full positional row. The key is taken from
    /// the primary-key position.
    fn upsert(&self, table: &str, row: Row) -> BindingResult<()>;

    /// Delete by primary key. Returns false if the key was absent.
    fn delete(&self, table: &str, key: &str) -> BindingResult<bool>;

    /// Rows in ascending key order, starting at `start_key` inclusive,
    /// at most `limit` of them.
    fn scan(&self, table: &str, start_key: &str, limit: usize) -> BindingResult<Vec<Row>>;

    // === Lifecycle ===

    /// Release the connection. Later calls fail with `ConnectionError::Closed`.
    fn close(&self) -> BindingResult<()>;
}

/// Opens storage clients.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &BindingConfig) -> BindingResult<Arc<dyn StorageClient>>;
}

/// Validate a row against its schema and return its primary key.
pub fn extract_key<'a>(schema: &TableSchema, row: &'a [Value]) -> BindingResult<&'a str> {
    let key = row.get(schema.primary_index()).and_then(|v| v.as_deref());
    if row.len() != schema.width() {
        return Err(StorageError::WriteFailed {
            table: schema.name().to_string(),
            key: key.unwrap_or_default().to_string(),
            reason: format!("expected {} values, got {}", schema.width(), row.len()),
        }
        .into());
    }
    key.ok_or_else(|| {
        StorageError::WriteFailed {
            table: schema.name().to_string(),
            key: String::new(),
            reason: format!("primary key {} is null", schema.primary_column().name),
        }
        .into()
    })
}

// ============================================================================
// ENDPOINT CONNECTOR
// ============================================================================

/// Connects by endpoint scheme: `mem://<name>` or `lmdb://<path>`.
///
/// A `mem://` connection starts empty and lives as long as the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct EndpointConnector;

impl Connector for EndpointConnector {
    fn connect(&self, config: &BindingConfig) -> BindingResult<Arc<dyn StorageClient>> {
        let endpoint = config.coordinator_host.as_str();
        if config.credentials.is_some() {
            tracing::debug!(endpoint, "Local endpoints ignore credentials");
        }

        if endpoint.starts_with(MEM_SCHEME) {
            Ok(Arc::new(MockStorage::new()))
        } else if let Some(path) = endpoint.strip_prefix(LMDB_SCHEME) {
            if path.is_empty() {
                return Err(ConnectionError::UnsupportedEndpoint {
                    endpoint: endpoint.to_string(),
                }
                .into());
            }
            let storage = LmdbStorage::open(path, config.lmdb_map_size_mb)?;
            tracing::info!(path = %storage.path().display(), "Opened LMDB client");
            Ok(Arc::new(storage))
        } else {
            Err(ConnectionError::UnsupportedEndpoint {
                endpoint: endpoint.to_string(),
            }
            .into())
        }
    }
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

#[derive(Debug)]
struct MockTable {
    schema: TableSchema,
    rows: BTreeMap<String, Row>,
}

/// In-memory storage client. Rows are kept in a `BTreeMap` per table, so
/// scans come back in key order.
#[derive(Debug, Default)]
pub struct MockStorage {
    tables: Arc<RwLock<HashMap<String, MockTable>>>,
    closed: AtomicBool,
    close_count: AtomicUsize,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of tables.
    pub fn table_count(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Get count of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }

    /// Store a row without checking it against the table schema, to
    /// simulate schema drift between writer and reader.
    pub fn put_raw(&self, table: &str, key: &str, row: Row) -> BindingResult<()> {
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        let entry = tables.get_mut(table).ok_or_else(|| StorageError::TableNotFound {
            table: table.to_string(),
        })?;
        entry.rows.insert(key.to_string(), row);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }

    /// Accept operations again after `close`.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Release);
    }

    fn ensure_open(&self) -> BindingResult<()> {
        if self.is_closed() {
            return Err(ConnectionError::Closed.into());
        }
        Ok(())
    }
}

fn table_not_found(table: &str) -> StorageError {
    StorageError::TableNotFound {
        table: table.to_string(),
    }
}

impl StorageClient for MockStorage {
    fn create_table(&self, schema: &TableSchema) -> BindingResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        if tables.contains_key(schema.name()) {
            return Err(StorageError::TableExists {
                table: schema.name().to_string(),
            }
            .into());
        }
        tables.insert(
            schema.name().to_string(),
            MockTable {
                schema: schema.clone(),
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&self, table: &str) -> BindingResult<bool> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tables.remove(table).is_some())
    }

    fn table(&self, table: &str) -> BindingResult<Option<TableSchema>> {
        self.ensure_open()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tables.get(table).map(|t| t.schema.clone()))
    }

    fn get(&self, table: &str, key: &str) -> BindingResult<Option<Row>> {
        self.ensure_open()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        let entry = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(entry.rows.get(key).cloned())
    }

    fn upsert(&self, table: &str, row: Row) -> BindingResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let key = extract_key(&entry.schema, &row)?.to_string();
        entry.rows.insert(key, row);
        Ok(())
    }

    fn delete(&self, table: &str, key: &str) -> BindingResult<bool> {
        self.ensure_open()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        Ok(entry.rows.remove(key).is_some())
    }

    fn scan(&self, table: &str, start_key: &str, limit: usize) -> BindingResult<Vec<Row>> {
        self.ensure_open()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        let entry = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(entry
            .rows
            .range(start_key.to_string()..)
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn close(&self) -> BindingResult<()> {
        self.closed.store(true, Ordering::Release);
        self.close_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ============================================================================
// MOCK CONNECTOR
// ============================================================================

/// Connector handing out one shared [`MockStorage`].
///
/// Can simulate an unreachable coordinator or enforce credentials, and
/// counts successful connects.
#[derive(Debug, Default)]
pub struct MockConnector {
    storage: Arc<MockStorage>,
    required_credentials: Option<Credentials>,
    unreachable: bool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(storage: Arc<MockStorage>) -> Self {
        Self {
            storage,
            ..Default::default()
        }
    }

    /// Reject connections whose credentials differ.
    pub fn with_required_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.required_credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Fail every connection attempt.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn storage(&self) -> &Arc<MockStorage> {
        &self.storage
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

impl Connector for MockConnector {
    fn connect(&self, config: &BindingConfig) -> BindingResult<Arc<dyn StorageClient>> {
        if self.unreachable {
            return Err(ConnectionError::Unreachable {
                endpoint: config.coordinator_host.clone(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        if let Some(required) = &self.required_credentials {
            if config.credentials.as_ref() != Some(required) {
                return Err(ConnectionError::AuthenticationRejected {
                    user: config
                        .credentials
                        .as_ref()
                        .map(|c| c.user.clone())
                        .unwrap_or_default(),
                }
                .into());
            }
        }

        self.storage.reopen();
        self.connects.fetch_add(1, Ordering::AcqRel);
        Ok(self.storage.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dingo_core::{build_schema, BindingError};

    fn row(values: &[&str]) -> Row {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn storage_with_table(name: &str, fields: i64) -> MockStorage {
        let storage = MockStorage::new();
        storage.create_table(&build_schema(name, fields).unwrap()).unwrap();
        storage
    }

    // ========================================================================
    // Table Tests
    // ========================================================================

    #[test]
    fn test_create_table_duplicate() {
        let storage = storage_with_table("usertable", 3);
        let result = storage.create_table(&build_schema("usertable", 3).unwrap());
        assert!(matches!(
            result,
            Err(BindingError::Storage(StorageError::TableExists { .. }))
        ));
        assert_eq!(storage.table_count(), 1);
    }

    #[test]
    fn test_drop_table() {
        let storage = storage_with_table("usertable", 3);
        assert!(storage.drop_table("usertable").unwrap());
        assert!(!storage.drop_table("usertable").unwrap());
        assert!(storage.table("usertable").unwrap().is_none());
    }

    // ========================================================================
    // Row Tests
    // ========================================================================

    #[test]
    fn test_upsert_get() {
        let storage = storage_with_table("t", 2);
        storage.upsert("t", row(&["k1", "a", "b"])).unwrap();

        let retrieved = storage.get("t", "k1").unwrap();
        assert_eq!(retrieved, Some(row(&["k1", "a", "b"])));
        assert_eq!(storage.row_count("t"), 1);
    }

    #[test]
    fn test_upsert_overwrites() {
        let storage = storage_with_table("t", 1);
        storage.upsert("t", row(&["k1", "a"])).unwrap();
        storage.upsert("t", row(&["k1", "b"])).unwrap();
        assert_eq!(storage.get("t", "k1").unwrap(), Some(row(&["k1", "b"])));
        assert_eq!(storage.row_count("t"), 1);
    }

    #[test]
    fn test_upsert_rejects_null_key() {
        let storage = storage_with_table("t", 1);
        let result = storage.upsert("t", vec![None, Some("a".to_string())]);
        assert!(matches!(
            result,
            Err(BindingError::Storage(StorageError::WriteFailed { .. }))
        ));
    }

    #[test]
    fn test_upsert_rejects_wrong_width() {
        let storage = storage_with_table("t", 2);
        let result = storage.upsert("t", row(&["k1", "a"]));
        assert!(matches!(
            result,
            Err(BindingError::Storage(StorageError::WriteFailed { .. }))
        ));
    }

    #[test]
    fn test_unknown_table() {
        let storage = MockStorage::new();
        assert!(matches!(
            storage.get("nope", "k"),
            Err(BindingError::Storage(StorageError::TableNotFound { .. }))
        ));
        assert!(matches!(
            storage.upsert("nope", row(&["k"])),
            Err(BindingError::Storage(StorageError::TableNotFound { .. }))
        ));
    }

    #[test]
    fn test_delete() {
        let storage = storage_with_table("t", 1);
        storage.upsert("t", row(&["k1", "a"])).unwrap();
        assert!(storage.delete("t", "k1").unwrap());
        assert!(!storage.delete("t", "k1").unwrap());
        assert_eq!(storage.get("t", "k1").unwrap(), None);
    }

    #[test]
    fn test_scan_order_and_limit() {
        let storage = storage_with_table("t", 1);
        for key in ["user3", "user1", "user4", "user2"] {
            storage.upsert("t", row(&[key, "v"])).unwrap();
        }

        let rows = storage.scan("t", "user2", 2).unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r[0].as_deref().unwrap()).collect();
        assert_eq!(keys, vec!["user2", "user3"]);

        let between = storage.scan("t", "user15", 10).unwrap();
        assert_eq!(between.len(), 3);
        assert_eq!(between[0][0].as_deref(), Some("user2"));

        assert!(storage.scan("t", "user1", 0).unwrap().is_empty());
        assert!(storage.scan("t", "zzz", 5).unwrap().is_empty());
    }

    #[test]
    fn test_put_raw_bypasses_width_check() {
        let storage = storage_with_table("t", 3);
        storage.put_raw("t", "k1", row(&["k1", "a"])).unwrap();
        assert_eq!(storage.get("t", "k1").unwrap().unwrap().len(), 2);
    }

    // ========================================================================
    // Lifecycle Tests
    // ========================================================================

    #[test]
    fn test_close_rejects_operations() {
        let storage = storage_with_table("t", 1);
        storage.close().unwrap();
        assert!(storage.is_closed());
        assert_eq!(storage.close_count(), 1);
        assert!(matches!(
            storage.get("t", "k"),
            Err(BindingError::Connection(ConnectionError::Closed))
        ));

        storage.reopen();
        assert!(storage.get("t", "k").unwrap().is_none());
    }

    #[test]
    fn test_mock_connector_credentials() {
        let connector = MockConnector::new(Arc::new(MockStorage::new()))
            .with_required_credentials("root", "secret");

        let anonymous = BindingConfig::new("mem://bench");
        assert!(matches!(
            connector.connect(&anonymous),
            Err(BindingError::Connection(ConnectionError::AuthenticationRejected { .. }))
        ));

        let wrong = BindingConfig::new("mem://bench").with_credentials("root", "nope");
        assert!(matches!(
            connector.connect(&wrong),
            Err(BindingError::Connection(ConnectionError::AuthenticationRejected {
                ref user
            })) if user == "root"
        ));

        let right = BindingConfig::new("mem://bench").with_credentials("root", "secret");
        assert!(connector.connect(&right).is_ok());
        assert_eq!(connector.connect_count(), 1);
    }

    #[test]
    fn test_mock_connector_unreachable() {
        let connector = MockConnector::new(Arc::new(MockStorage::new())).unreachable();
        assert!(matches!(
            connector.connect(&BindingConfig::new("mem://bench")),
            Err(BindingError::Connection(ConnectionError::Unreachable { .. }))
        ));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_endpoint_connector_schemes() {
        let mem = EndpointConnector.connect(&BindingConfig::new("mem://bench"));
        assert!(mem.is_ok());

        let dir = tempfile::TempDir::new().unwrap();
        let endpoint = format!("lmdb://{}", dir.path().display());
        let lmdb = EndpointConnector.connect(&BindingConfig::new(endpoint)).unwrap();
        lmdb.create_table(&build_schema("t", 1).unwrap()).unwrap();
        lmdb.close().unwrap();

        for bad in ["tcp://127.0.0.1:22001", "lmdb://"] {
            assert!(matches!(
                EndpointConnector.connect(&BindingConfig::new(bad)),
                Err(BindingError::Connection(ConnectionError::UnsupportedEndpoint { .. }))
            ));
        }
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
