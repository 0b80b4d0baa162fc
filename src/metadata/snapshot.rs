//! In-memory schema source backed by a JSON snapshot.
//!
//! A snapshot is the output of a one-off inspection of a database, stored as
//! JSON so graphs can be built offline:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "orders",
//!       "columns": [{"name": "id", "data_type": "INTEGER", "nullable": false}],
//!       "primary_key": ["id"],
//!       "foreign_keys": [],
//!       "indexes": [],
//!       "row_count": 1200
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{SchemaSource, SourceError, SourceResult};
use super::types::{ColumnInfo, ForeignKeyInfo, IndexInfo};

/// Serialized form of a whole schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSnapshot>,
}

/// Everything a snapshot records about one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
    /// Missing counts are reported as a source error.
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl TableSnapshot {
    /// Start a table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a column.
    pub fn column(mut self, name: &str, data_type: &str, nullable: bool) -> Self {
        self.columns.push(ColumnInfo::new(name, data_type, nullable));
        self
    }

    /// Set the primary key columns.
    pub fn primary_key<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single-column foreign key.
    pub fn foreign_key(mut self, column: &str, referred_table: &str, referred_column: &str) -> Self {
        let name = format!("fk_{}_{}", self.name, column);
        self.foreign_keys.push(ForeignKeyInfo::new(
            Some(&name),
            [column],
            referred_table,
            [referred_column],
        ));
        self
    }

    /// Append an arbitrary foreign key.
    pub fn foreign_key_info(mut self, fk: ForeignKeyInfo) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Append an index.
    pub fn index(mut self, index: IndexInfo) -> Self {
        self.indexes.push(index);
        self
    }

    /// Set the row count.
    pub fn rows(mut self, count: u64) -> Self {
        self.row_count = Some(count);
        self
    }

    /// Set the table comment.
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// SchemaSource implementation over a [`SchemaSnapshot`].
///
/// `list_tables` reports every table entry in order, duplicates included,
/// so the builder sees exactly what the snapshot recorded. Per-table
/// lookups resolve to the first entry with that name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    tables: Vec<TableSnapshot>,
    by_name: HashMap<String, usize>,
}

impl SnapshotSource {
    /// Create a source from a snapshot.
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        let mut by_name = HashMap::new();
        for (idx, table) in snapshot.tables.iter().enumerate() {
            by_name.entry(table.name.clone()).or_insert(idx);
        }
        Self {
            tables: snapshot.tables,
            by_name,
        }
    }

    /// Create a source from a list of tables.
    pub fn from_tables(tables: Vec<TableSnapshot>) -> Self {
        Self::new(SchemaSnapshot { tables })
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json_str(json: &str) -> SourceResult<Self> {
        let snapshot: SchemaSnapshot = serde_json::from_str(json)?;
        Ok(Self::new(snapshot))
    }

    /// Load a snapshot from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Number of table entries (duplicates included).
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the snapshot has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn table(&self, name: &str) -> SourceResult<&TableSnapshot> {
        self.by_name
            .get(name)
            .map(|&idx| &self.tables[idx])
            .ok_or_else(|| SourceError::TableNotFound(name.to_string()))
    }
}

#[async_trait]
impl SchemaSource for SnapshotSource {
    async fn list_tables(&self) -> SourceResult<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn get_columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn get_primary_key(&self, table: &str) -> SourceResult<Vec<String>> {
        Ok(self.table(table)?.primary_key.clone())
    }

    async fn get_foreign_keys(&self, table: &str) -> SourceResult<Vec<ForeignKeyInfo>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    async fn get_indexes(&self, table: &str) -> SourceResult<Vec<IndexInfo>> {
        Ok(self.table(table)?.indexes.clone())
    }

    async fn get_table_comment(&self, table: &str) -> SourceResult<Option<String>> {
        Ok(self.table(table)?.comment.clone())
    }

    async fn get_row_count(&self, table: &str) -> SourceResult<u64> {
        self.table(table)?
            .row_count
            .ok_or_else(|| SourceError::Query(format!("row count not recorded for {}", table)))
    }
}
