//! Table-scoped row keys for the LMDB client.
//!
//! All tables share one LMDB database, so every row key carries its table
//! name as a prefix. A row key cannot be built without naming its table.

/// Separator between table name and row key. Never occurs in UTF-8 text,
/// so the prefix is unambiguous and every key of a table sorts contiguously.
const SEPARATOR: u8 = 0xFF;

/// A row key scoped to a table.
///
/// # Binary Format
///
/// `[table name bytes][0xFF][row key bytes]`
///
/// Keys of one table are contiguous and ordered by the row key's bytes,
/// which for UTF-8 is the same as string order. Range scans rely on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableScopedKey {
    table: String,
    key: String,
}

impl TableScopedKey {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Encode for LMDB storage.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Self::table_prefix(&self.table);
        bytes.extend_from_slice(self.key.as_bytes());
        bytes
    }

    /// Prefix shared by every row of a table.
    pub fn table_prefix(table: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(table.len() + 1);
        prefix.extend_from_slice(table.as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }
}
