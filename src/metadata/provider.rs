//! SchemaSource trait definition.
//!
//! The SchemaSource trait abstracts over the different ways of fetching
//! schema metadata. Engine adapters (SQL inspectors, catalog APIs) live
//! outside this crate; `SnapshotSource` is the in-tree implementation.

use async_trait::async_trait;

use super::types::{ColumnInfo, ForeignKeyInfo, IndexInfo};

/// Result type for schema source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors a schema source can report.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Metadata query failed: {0}")]
    Query(String),

    #[error("Operation not supported by this source: {0}")]
    Unsupported(&'static str),

    #[error("Failed to read schema snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Trait for fetching schema metadata for one database.
///
/// Implementations are shared across the builder's concurrent fetches.
///
/// # Example
///
/// ```ignore
/// use schemagraph::metadata::SchemaSource;
///
/// async fn describe(source: &impl SchemaSource) -> SourceResult<()> {
///     for table in source.list_tables().await? {
///         let columns = source.get_columns(&table).await?;
///         let fks = source.get_foreign_keys(&table).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SchemaSource: Send + Sync {
    // =========================================================================
    // Structural metadata
    // =========================================================================

    /// List all table names.
    ///
    /// Failure here is fatal for a graph build.
    async fn list_tables(&self) -> SourceResult<Vec<String>>;

    /// Get the columns of a table, in ordinal order.
    async fn get_columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>>;

    /// Get the primary key columns of a table (empty if none).
    async fn get_primary_key(&self, table: &str) -> SourceResult<Vec<String>>;

    /// Get the foreign key constraints declared on a table.
    async fn get_foreign_keys(&self, table: &str) -> SourceResult<Vec<ForeignKeyInfo>>;

    /// Get the indexes defined on a table.
    async fn get_indexes(&self, table: &str) -> SourceResult<Vec<IndexInfo>>;

    /// Get the table comment, if the engine stores one.
    async fn get_table_comment(&self, _table: &str) -> SourceResult<Option<String>> {
        Ok(None)
    }

    // =========================================================================
    // Expensive, best-effort metadata
    // =========================================================================

    /// Count the rows of a table.
    ///
    /// May be a full scan on some engines. Callers treat failure as zero.
    async fn get_row_count(&self, table: &str) -> SourceResult<u64>;
}
