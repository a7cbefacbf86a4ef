//! DingoDB YCSB Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for keys, field maps and schemas
//! - Fixtures for mock storage and common scenarios
//! - Assertions on binding results

// Re-export mock storage from its source crate
pub use dingo_storage::{MockConnector, MockStorage, StorageClient};

// Re-export core types for convenience
pub use dingo_core::{
    build_schema, BindingConfig, BindingError, BindingResult, ConfigError, ConnectionError,
    FieldMap, MappingError, Record, Row, Status, StorageError, TableSchema, Value,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for workload-shaped inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a YCSB-style record key.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "user[0-9]{1,10}"
    }

    /// Generate a valid table name.
    pub fn arb_table_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    /// Generate a field count small enough for fast tests.
    pub fn arb_field_count() -> impl Strategy<Value = i64> {
        0i64..32
    }

    /// Generate a field value.
    pub fn arb_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{0,20}"
    }

    /// Generate the name of field `index` in random casing.
    pub fn arb_field_name(index: usize) -> impl Strategy<Value = String> {
        let lower = format!("field{}", index);
        prop_oneof![
            Just(lower.clone()),
            Just(lower.to_uppercase()),
            Just(format!("Field{}", index)),
        ]
    }

    /// Generate a field map over `FIELD0..FIELD{n-1}` with mixed casing and
    /// at most one spelling per field.
    pub fn arb_field_map(field_count: usize) -> impl Strategy<Value = FieldMap> {
        proptest::collection::btree_set(0..field_count.max(1), 0..=field_count)
            .prop_flat_map(move |indices| {
                indices
                    .into_iter()
                    .filter(|i| *i < field_count)
                    .map(|i| (arb_field_name(i), arb_value()))
                    .collect::<Vec<_>>()
            })
            .prop_map(|entries| entries.into_iter().collect())
    }

    /// Generate a schema from the builder.
    pub fn arb_schema() -> impl Strategy<Value = TableSchema> {
        (arb_table_name(), arb_field_count()).prop_map(|(name, n)| {
            build_schema(&name, n).expect("generated inputs are valid")
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    /// Endpoint used by in-memory fixtures.
    pub const TEST_ENDPOINT: &str = "mem://test";

    /// Configuration pointed at the in-memory endpoint.
    pub fn test_config(table: &str, field_count: i64) -> BindingConfig {
        BindingConfig::new(TEST_ENDPOINT)
            .with_table(table)
            .with_field_count(field_count)
    }

    /// Endpoint for an LMDB directory.
    pub fn lmdb_endpoint(dir: &Path) -> String {
        format!("lmdb://{}", dir.display())
    }

    /// Mock storage holding an empty table built by the schema builder.
    pub fn storage_with_table(table: &str, field_count: i64) -> Arc<MockStorage> {
        let storage = Arc::new(MockStorage::new());
        let schema = build_schema(table, field_count).expect("fixture schema is valid");
        storage
            .create_table(&schema)
            .expect("fixture table is created");
        storage
    }

    /// Connector over [`storage_with_table`].
    pub fn connector_with_table(table: &str, field_count: i64) -> Arc<MockConnector> {
        Arc::new(MockConnector::new(storage_with_table(table, field_count)))
    }

    /// Build a field map from pairs.
    pub fn field_map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// `{field0: a, field1: b, field2: c}`, the three-field scenario input.
    pub fn abc_fields() -> FieldMap {
        field_map(&[("field0", "a"), ("field1", "b"), ("field2", "c")])
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion functions for binding results.

    use super::*;

    /// Assert that a BindingResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &BindingResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a BindingResult is a NotFound storage error for `key`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &BindingResult<T>, key: &str) {
        match result {
            Err(BindingError::Storage(StorageError::NotFound { key: k, .. })) => {
                assert_eq!(k, key, "Wrong key in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", key, other),
        }
    }

    /// Assert that a BindingResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &BindingResult<T>) {
        match result {
            Err(BindingError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a BindingResult is a Connection error.
    #[track_caller]
    pub fn assert_connection_error<T: std::fmt::Debug>(result: &BindingResult<T>) {
        match result {
            Err(BindingError::Connection(_)) => {}
            other => panic!("Expected Connection error, got: {:?}", other),
        }
    }

    /// Assert that a BindingResult is a row shape mismatch.
    #[track_caller]
    pub fn assert_shape_mismatch<T: std::fmt::Debug>(
        result: &BindingResult<T>,
        expected: usize,
        actual: usize,
    ) {
        match result {
            Err(BindingError::Mapping(MappingError::ShapeMismatch {
                expected: e,
                actual: a,
                ..
            })) => {
                assert_eq!(*e, expected, "Wrong expected width");
                assert_eq!(*a, actual, "Wrong actual width");
            }
            other => panic!("Expected ShapeMismatch, got: {:?}", other),
        }
    }

    /// Assert a full record holds `key` and every supplied field.
    #[track_caller]
    pub fn assert_record_matches(record: &Record, key: &str, fields: &FieldMap) {
        assert_eq!(
            record.get("ycsb_key").cloned().flatten().as_deref(),
            Some(key),
            "Wrong key in record"
        );
        for (name, value) in fields {
            assert_eq!(
                record.get(&name.to_lowercase()).cloned().flatten().as_ref(),
                Some(value),
                "Wrong value for field {}",
                name
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
