//! Schema source module.
//!
//! This module provides the abstraction the graph builder consumes to learn
//! about a database: table names, columns, primary keys, foreign keys,
//! indexes, and a best-effort row count.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SchemaSource                             │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Structural metadata (cheap)   │  Row counts (expensive)  │  │
//! │  │  - list_tables()               │  - get_row_count()       │  │
//! │  │  - get_columns()               │    (best effort, bounded │  │
//! │  │  - get_primary_key()           │     by a timeout)        │  │
//! │  │  - get_foreign_keys()          │                          │  │
//! │  │  - get_indexes()               │                          │  │
//! │  │  - get_table_comment()         │                          │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!            ┌──────────────┴──────────────┐
//!            ▼                             ▼
//!   SnapshotSource (JSON)         engine-specific adapters
//!                                 (live outside this crate)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use schemagraph::metadata::{SchemaSource, SnapshotSource};
//!
//! let source = SnapshotSource::from_file("./schema.json")?;
//! let tables = source.list_tables().await?;
//! let columns = source.get_columns("orders").await?;
//! ```

mod provider;
mod snapshot;
mod types;

pub use provider::{SchemaSource, SourceError, SourceResult};
pub use snapshot::{SchemaSnapshot, SnapshotSource, TableSnapshot};
pub use types::*;
