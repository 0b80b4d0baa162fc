//! # schemagraph
//!
//! A knowledge graph of relational schema metadata.
//!
//! ## Architecture
//!
//! schemagraph turns what a database reports about itself into a labeled
//! multigraph and answers the questions a documentation generator asks:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              SchemaSource (metadata)                     │
//! │  (tables, columns, keys, foreign keys, indexes, counts)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │          KnowledgeGraph (tables, columns, indexes)       │
//! │          + Categorizer (LOOKUP, JUNCTION, ...)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Query engine: table context, paths, statistics         │
//! │   Exporter: JSON, GraphML                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use schemagraph::metadata::{SnapshotSource, TableSnapshot};
//! use schemagraph::GraphRegistry;
//!
//! let source = SnapshotSource::from_file("warehouse.json")?;
//! let registry = GraphRegistry::default();
//! registry.build_graph("warehouse", &source).await?;
//!
//! let ctx = registry.table_context("warehouse", "orders", Some(2))?;
//! println!("{}", serde_json::to_string_pretty(&ctx)?);
//! ```

pub mod config;
pub mod graph;
pub mod metadata;
pub mod registry;

pub use graph::{Category, ExportFormat, KnowledgeGraph, TableContext};
pub use registry::{GraphRegistry, RegistryError};
