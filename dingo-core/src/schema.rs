//! Table schema types and the deterministic schema builder.
//!
//! The storage client addresses columns by position only, so a
//! [`TableSchema`] fixes the column order once and keeps a normalized
//! name -> position index for the record mapper.

use std::collections::HashMap;
use std::fmt;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::checked_field_count;
use crate::{
    BindingResult, SchemaError, COLUMN_PREFIX, DEFAULT_COLUMN_TYPE, DEFAULT_VALUE_LEN, PRIMARY_KEY,
};

/// Normalize a column or field name for lookup.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
    pub primary: bool,
    /// Only used when the table is created, never at write time.
    pub default_value: Option<String>,
    pub auto_increment: bool,
}

/// Table-level options passed through to create-table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    pub version: i32,
    pub ttl: i64,
    pub engine: String,
    pub replicas: i32,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            version: 1,
            ttl: 0,
            engine: "ENG_ROCKSDB".to_string(),
            replicas: 3,
        }
    }
}

/// Serialized form of a [`TableSchema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<Column>,
    pub options: TableOptions,
}

/// Validated, immutable table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDefinition", into = "TableDefinition")]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    options: TableOptions,
    primary_index: usize,
    positions: HashMap<String, usize>,
}

impl TableSchema {
    /// Validate a column list and build the lookup index.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        options: TableOptions,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyTableName);
        }
        if columns.is_empty() {
            return Err(SchemaError::NoColumns { table: name });
        }

        let primaries: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary)
            .map(|(i, _)| i)
            .collect();
        let primary_index = match primaries.as_slice() {
            [] => return Err(SchemaError::NoPrimaryKey { table: name }),
            [idx] => *idx,
            many => {
                return Err(SchemaError::MultiplePrimaryKeys {
                    table: name,
                    count: many.len(),
                })
            }
        };

        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (normalize_name(&c.name), i))
            .collect();

        Ok(Self {
            name,
            columns,
            options,
            primary_index,
            positions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Number of columns, which is also the width of every positional row.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn primary_index(&self) -> usize {
        self.primary_index
    }

    pub fn primary_column(&self) -> &Column {
        &self.columns[self.primary_index]
    }

    /// Position of a column by name, ignoring case.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize_name(name)).copied()
    }

    /// Ordered `column name -> type` JSON, as printed by the table command.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ColumnTypes(&self.columns))
    }
}

impl TryFrom<TableDefinition> for TableSchema {
    type Error = SchemaError;

    fn try_from(def: TableDefinition) -> Result<Self, Self::Error> {
        TableSchema::new(def.name, def.columns, def.options)
    }
}

impl From<TableSchema> for TableDefinition {
    fn from(schema: TableSchema) -> Self {
        TableDefinition {
            name: schema.name,
            columns: schema.columns,
            options: schema.options,
        }
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", column.name, column.data_type)?;
            if column.primary {
                write!(f, " PRIMARY KEY")?;
            }
        }
        write!(f, ")")
    }
}

/// Serializes columns as a map while keeping schema order.
struct ColumnTypes<'a>(&'a [Column]);

impl Serialize for ColumnTypes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0 {
            map.serialize_entry(&column.name, &column.data_type)?;
        }
        map.end()
    }
}

// ============================================================================
// SCHEMA BUILDER
// ============================================================================

/// Build the YCSB table schema: `YCSB_KEY` followed by `FIELD0..FIELD{n-1}`.
///
/// Defaults are drawn from an RNG seeded by the table name, so every worker
/// (and every process) builds an identical definition for the same input.
pub fn build_schema(table_name: &str, field_count: i64) -> BindingResult<TableSchema> {
    let field_count = checked_field_count(field_count)?;
    if table_name.is_empty() {
        return Err(SchemaError::EmptyTableName.into());
    }

    let digest = Sha256::digest(table_name.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    let mut rng = StdRng::from_seed(seed);

    let mut columns = Vec::with_capacity(field_count + 1);
    columns.push(Column {
        name: PRIMARY_KEY.to_string(),
        data_type: DEFAULT_COLUMN_TYPE.to_string(),
        precision: -1,
        scale: 1,
        nullable: false,
        primary: true,
        default_value: Some(random_value(&mut rng)),
        auto_increment: false,
    });

    for i in 0..field_count {
        columns.push(Column {
            name: format!("{}{}", COLUMN_PREFIX, i),
            data_type: DEFAULT_COLUMN_TYPE.to_string(),
            precision: -1,
            scale: 1,
            nullable: true,
            primary: false,
            default_value: Some(random_value(&mut rng)),
            auto_increment: false,
        });
    }

    let schema = TableSchema::new(table_name, columns, TableOptions::default())?;
    tracing::debug!(table = table_name, columns = schema.width(), "Built table schema");
    Ok(schema)
}

fn random_value(rng: &mut StdRng) -> String {
    (0..DEFAULT_VALUE_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    fn column(name: &str, primary: bool) -> Column {
        Column {
            name: name.to_string(),
            data_type: DEFAULT_COLUMN_TYPE.to_string(),
            precision: -1,
            scale: 1,
            nullable: !primary,
            primary,
            default_value: None,
            auto_increment: false,
        }
    }

    #[test]
    fn test_build_schema_layout() {
        let schema = build_schema("usertable", 3).unwrap();
        let names: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["YCSB_KEY", "FIELD0", "FIELD1", "FIELD2"]);
        assert_eq!(schema.primary_index(), 0);

        let pk = schema.primary_column();
        assert!(pk.primary);
        assert!(!pk.nullable);
        assert_eq!(pk.precision, -1);
        assert_eq!(pk.scale, 1);

        for col in &schema.columns()[1..] {
            assert!(col.nullable);
            assert!(!col.primary);
            assert_eq!(col.data_type, "varchar");
            assert_eq!(col.default_value.as_ref().map(|v| v.len()), Some(20));
        }
    }

    #[test]
    fn test_build_schema_zero_fields() {
        let schema = build_schema("usertable", 0).unwrap();
        assert_eq!(schema.width(), 1);
        assert!(schema.primary_column().primary);
    }

    #[test]
    fn test_build_schema_negative_field_count() {
        let err = build_schema("usertable", -1).unwrap_err();
        assert!(matches!(
            err,
            crate::BindingError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_build_schema_rejects_oversized_field_count() {
        for count in [crate::MAX_FIELD_COUNT + 1, i64::MAX] {
            let err = build_schema("usertable", count).unwrap_err();
            assert!(matches!(
                err,
                crate::BindingError::Config(ConfigError::InvalidValue { ref field, .. })
                    if field == "fieldcount"
            ));
        }
        let schema = build_schema("usertable", crate::MAX_FIELD_COUNT).unwrap();
        assert_eq!(schema.width(), crate::MAX_FIELD_COUNT as usize + 1);
    }

    #[test]
    fn test_build_schema_empty_table_name() {
        let err = build_schema("", 3).unwrap_err();
        assert_eq!(err, crate::BindingError::Schema(SchemaError::EmptyTableName));
    }

    #[test]
    fn test_build_schema_is_deterministic() {
        let a = build_schema("usertable", 10).unwrap();
        let b = build_schema("usertable", 10).unwrap();
        assert_eq!(a, b);

        let other = build_schema("othertable", 10).unwrap();
        assert_ne!(
            a.primary_column().default_value,
            other.primary_column().default_value
        );
    }

    #[test]
    fn test_position_ignores_case() {
        let schema = build_schema("usertable", 2).unwrap();
        assert_eq!(schema.position("FIELD1"), Some(2));
        assert_eq!(schema.position("field1"), Some(2));
        assert_eq!(schema.position("Field1"), Some(2));
        assert_eq!(schema.position("ycsb_key"), Some(0));
        assert_eq!(schema.position("field9"), None);
    }

    #[test]
    fn test_new_rejects_bad_column_sets() {
        let opts = TableOptions::default();
        assert_eq!(
            TableSchema::new("t", vec![], opts.clone()).unwrap_err(),
            SchemaError::NoColumns {
                table: "t".to_string()
            }
        );
        assert_eq!(
            TableSchema::new("t", vec![column("a", false)], opts.clone()).unwrap_err(),
            SchemaError::NoPrimaryKey {
                table: "t".to_string()
            }
        );
        assert_eq!(
            TableSchema::new("t", vec![column("a", true), column("b", true)], opts).unwrap_err(),
            SchemaError::MultiplePrimaryKeys {
                table: "t".to_string(),
                count: 2
            }
        );
    }

    #[test]
    fn test_to_json_keeps_column_order() {
        let schema = build_schema("usertable", 2).unwrap();
        assert_eq!(
            schema.to_json().unwrap(),
            r#"{"YCSB_KEY":"varchar","FIELD0":"varchar","FIELD1":"varchar"}"#
        );
    }

    #[test]
    fn test_display() {
        let schema = build_schema("t", 1).unwrap();
        assert_eq!(
            schema.to_string(),
            "t(YCSB_KEY varchar PRIMARY KEY, FIELD0 varchar)"
        );
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let schema = build_schema("usertable", 4).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let decoded: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(decoded.position("field3"), Some(4));
    }

    #[test]
    fn test_serde_rejects_invalid_definition() {
        let json = serde_json::json!({
            "name": "t",
            "columns": [],
            "options": {"version": 1, "ttl": 0, "engine": "ENG_ROCKSDB", "replicas": 3}
        });
        assert!(serde_json::from_value::<TableSchema>(json).is_err());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every field count yields n+1 columns with exactly one primary key, first.
        #[test]
        fn prop_schema_has_single_leading_primary(n in 0i64..200) {
            let schema = build_schema("usertable", n).unwrap();
            prop_assert_eq!(schema.width(), n as usize + 1);
            let primaries = schema.columns().iter().filter(|c| c.primary).count();
            prop_assert_eq!(primaries, 1);
            prop_assert!(schema.columns()[0].primary);
            prop_assert_eq!(schema.columns()[0].name.as_str(), PRIMARY_KEY);
        }

        /// Building twice with the same input yields equal column sequences.
        #[test]
        fn prop_build_is_idempotent(name in "[a-z][a-z0-9_]{0,15}", n in 0i64..32) {
            let a = build_schema(&name, n).unwrap();
            let b = build_schema(&name, n).unwrap();
            prop_assert_eq!(a.columns(), b.columns());
        }
    }
}
