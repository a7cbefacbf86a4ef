//! Record mapper: field maps <-> positional rows.
//!
//! Field names from the workload arrive in arbitrary casing. They are
//! lowercased once and matched against the schema's normalized index.

use std::collections::HashMap;

use dingo_core::{
    normalize_name, BindingResult, FieldMap, MappingError, Record, Row, SchemaError, TableSchema,
    Value,
};

/// Normalize inbound field names.
///
/// When two names collide after lowercasing, the one already spelled in
/// lowercase wins; otherwise the smallest original spelling wins.
fn normalize_fields(fields: &FieldMap) -> HashMap<String, &str> {
    let mut chosen: HashMap<String, (&str, &str)> = HashMap::with_capacity(fields.len());
    for (name, value) in fields {
        let lower = normalize_name(name);
        let replace = match chosen.get(&lower) {
            None => true,
            Some((kept, _)) => *kept != lower && (*name == lower || name.as_str() < *kept),
        };
        if replace {
            chosen.insert(lower, (name.as_str(), value.as_str()));
        }
    }
    chosen
        .into_iter()
        .map(|(lower, (_, value))| (lower, value))
        .collect()
}

fn check_shape(schema: &TableSchema, row: &[Value]) -> BindingResult<()> {
    if row.len() != schema.width() {
        return Err(MappingError::ShapeMismatch {
            table: schema.name().to_string(),
            expected: schema.width(),
            actual: row.len(),
        }
        .into());
    }
    Ok(())
}

/// Build the positional row written for `key`.
///
/// The primary-key position always holds `key`, even if `fields` carries a
/// same-named entry. Columns without a supplied field are NULL; fields
/// without a column are dropped.
pub fn to_positional(schema: &TableSchema, key: &str, fields: &FieldMap) -> BindingResult<Row> {
    if schema.width() == 0 {
        return Err(SchemaError::NoColumns {
            table: schema.name().to_string(),
        }
        .into());
    }

    let normalized = normalize_fields(fields);
    let row: Row = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            if i == schema.primary_index() {
                Some(key.to_string())
            } else {
                normalized
                    .get(&normalize_name(&column.name))
                    .map(|v| v.to_string())
            }
        })
        .collect();

    let dropped = normalized
        .keys()
        .filter(|name| schema.position(name).is_none())
        .count();
    if dropped > 0 {
        tracing::trace!(table = schema.name(), key, dropped, "Ignored unknown fields");
    }

    Ok(row)
}

/// Translate a stored row back into a record.
///
/// Without `requested`, every column is returned under its lowercase name.
/// With `requested`, exactly those names are returned as spelled by the
/// caller; names without a column map to `None`.
pub fn to_record(
    schema: &TableSchema,
    row: &[Value],
    requested: Option<&[&str]>,
) -> BindingResult<Record> {
    check_shape(schema, row)?;

    let record = match requested {
        None => schema
            .columns()
            .iter()
            .zip(row)
            .map(|(column, value)| (normalize_name(&column.name), value.clone()))
            .collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                let value = schema.position(name).and_then(|i| row[i].clone());
                (name.to_string(), value)
            })
            .collect(),
    };
    Ok(record)
}

/// Overlay supplied field values onto a stored row in place.
///
/// The primary-key column is never touched and unknown fields are ignored.
/// Returns the number of columns written.
pub fn overlay(schema: &TableSchema, row: &mut Row, fields: &FieldMap) -> BindingResult<usize> {
    check_shape(schema, row)?;

    let mut touched = 0;
    for (name, value) in normalize_fields(fields) {
        match schema.position(&name) {
            Some(i) if i != schema.primary_index() => {
                row[i] = Some(value.to_string());
                touched += 1;
            }
            _ => {}
        }
    }
    Ok(touched)
}
