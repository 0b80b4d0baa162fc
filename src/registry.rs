//! Registry of built schema graphs, keyed by database id.
//!
//! Graphs are published as immutable `Arc<KnowledgeGraph>` values. A build
//! runs against a fresh graph and is swapped in with a single insert, so
//! readers holding the previous graph keep a consistent view until they drop
//! it. Reads never block on builds.
//!
//! Every build and delete takes a ticket from a registry-wide counter. A
//! build publishes only if no later build or delete for the same id has
//! already landed, so a slow refresh cannot overwrite a newer graph or
//! resurrect a deleted one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::config::{QuerySettings, Settings};
use crate::graph::export::{self, ExportError, ExportFormat};
use crate::graph::{
    BuildError, Category, GraphBuilder, GraphStatistics, KnowledgeGraph, SkippedEntity,
    TableContext,
};
use crate::metadata::SchemaSource;

/// Errors returned by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Knowledge graph not found for database: {0}")]
    DatabaseNotFound(String),

    #[error("Table {table} not found in database {database_id}")]
    TableNotFound { database_id: String, table: String },

    #[error("Graph build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Graph build for {database_id} timed out after {after:?}")]
    Timeout { database_id: String, after: Duration },

    #[error("Graph build for {0} was superseded by a later build or delete")]
    Superseded(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

// ============================================================================
// Payloads
// ============================================================================

/// What a build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub database_id: String,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_tables: usize,
    pub skipped: Vec<SkippedEntity>,
}

/// One row of a table listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub categories: Vec<Category>,
    pub row_count: u64,
    pub column_count: usize,
}

/// Result of a relationship path lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResult {
    pub source_table: String,
    pub target_table: String,
    pub path_found: bool,
    /// Tables along the path, both ends included.
    pub path: Vec<String>,
    /// Number of tables in `path`.
    pub path_length: usize,
}

// ============================================================================
// Registry
// ============================================================================

/// What is registered under one id: the ticket of the last build or delete
/// that landed, and the graph if it was a build.
#[derive(Debug)]
struct Slot {
    ticket: u64,
    graph: Option<Arc<KnowledgeGraph>>,
}

/// Maps database ids to their published knowledge graph.
#[derive(Debug)]
pub struct GraphRegistry {
    graphs: DashMap<String, Slot>,
    next_ticket: AtomicU64,
    builder: GraphBuilder,
    query: QuerySettings,
    build_timeout: Option<Duration>,
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl GraphRegistry {
    /// Create an empty registry configured from settings.
    pub fn new(settings: &Settings) -> Self {
        let builder = GraphBuilder::new(settings.build.to_build_config())
            .with_categorizer(settings.categories.categorizer());
        Self {
            graphs: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            builder,
            query: settings.query.clone(),
            build_timeout: settings.build.build_timeout(),
        }
    }

    /// Build a graph for `database_id` and publish it, replacing any
    /// previous graph. On failure the previous graph stays published.
    ///
    /// Returns [`RegistryError::Superseded`] without publishing when a build
    /// or delete for the same id that started later has already landed.
    pub async fn build_graph<S>(&self, database_id: &str, source: &S) -> RegistryResult<BuildSummary>
    where
        S: SchemaSource + ?Sized,
    {
        let ticket = self.take_ticket();
        let build = self.builder.build(source);
        let outcome = match self.build_timeout {
            Some(limit) => tokio::time::timeout(limit, build)
                .await
                .map_err(|_| RegistryError::Timeout {
                    database_id: database_id.to_string(),
                    after: limit,
                })??,
            None => build.await?,
        };

        let summary = BuildSummary {
            database_id: database_id.to_string(),
            total_nodes: outcome.graph.node_count(),
            total_edges: outcome.graph.edge_count(),
            total_tables: outcome.stats.tables,
            skipped: outcome.stats.skipped,
        };

        let slot = Slot {
            ticket,
            graph: Some(Arc::new(outcome.graph)),
        };
        match self.graphs.entry(database_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().ticket > ticket {
                    info!("Discarding stale graph build for {}", database_id);
                    return Err(RegistryError::Superseded(database_id.to_string()));
                }
                entry.insert(slot);
            }
            Entry::Vacant(entry) => {
                entry.insert(slot);
            }
        }
        info!(
            "Published graph for {}: {} nodes, {} edges",
            database_id, summary.total_nodes, summary.total_edges
        );

        Ok(summary)
    }

    fn take_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    /// The published graph for a database.
    pub fn graph(&self, database_id: &str) -> RegistryResult<Arc<KnowledgeGraph>> {
        self.graphs
            .get(database_id)
            .and_then(|entry| entry.graph.clone())
            .ok_or_else(|| RegistryError::DatabaseNotFound(database_id.to_string()))
    }

    /// Ids of all databases with a published graph, sorted.
    pub fn database_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graphs
            .iter()
            .filter(|e| e.graph.is_some())
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// All tables of a database in build order.
    pub fn list_tables(&self, database_id: &str) -> RegistryResult<Vec<TableSummary>> {
        let graph = self.graph(database_id)?;
        let tables = graph
            .nodes()
            .iter()
            .filter_map(|node| {
                node.as_table().map(|props| TableSummary {
                    name: node.name.clone(),
                    categories: graph.categories_of(&node.name).into_iter().collect(),
                    row_count: props.row_count,
                    column_count: props.column_count,
                })
            })
            .collect();
        Ok(tables)
    }

    /// Context of one table. `depth` defaults to the configured default and
    /// is clamped to `1..=max_depth`.
    pub fn table_context(
        &self,
        database_id: &str,
        table: &str,
        depth: Option<usize>,
    ) -> RegistryResult<TableContext> {
        let graph = self.graph(database_id)?;
        let depth = self.query.clamp_depth(depth);
        graph
            .table_context(table, depth)
            .ok_or_else(|| RegistryError::TableNotFound {
                database_id: database_id.to_string(),
                table: table.to_string(),
            })
    }

    /// Shortest relationship path between two tables. Unknown tables are
    /// reported as `path_found: false`.
    pub fn find_path(&self, database_id: &str, from: &str, to: &str) -> RegistryResult<PathResult> {
        let graph = self.graph(database_id)?;
        let path = graph.find_path(from, to).unwrap_or_default();
        Ok(PathResult {
            source_table: from.to_string(),
            target_table: to.to_string(),
            path_found: !path.is_empty(),
            path_length: path.len(),
            path,
        })
    }

    pub fn statistics(&self, database_id: &str) -> RegistryResult<GraphStatistics> {
        Ok(self.graph(database_id)?.statistics())
    }

    pub fn export_graph(&self, database_id: &str, format: ExportFormat) -> RegistryResult<String> {
        let graph = self.graph(database_id)?;
        Ok(export::export(&graph, format)?)
    }

    /// Unpublish a graph. Returns whether one was registered. Readers still
    /// holding it keep their copy, and builds already running for this id
    /// will not republish it.
    pub fn delete_graph(&self, database_id: &str) -> bool {
        let ticket = self.take_ticket();
        let tombstone = Slot { ticket, graph: None };
        let removed = match self.graphs.entry(database_id.to_string()) {
            Entry::Occupied(entry) if entry.get().ticket > ticket => false,
            Entry::Occupied(mut entry) => entry.insert(tombstone).graph.is_some(),
            Entry::Vacant(entry) => {
                entry.insert(tombstone);
                false
            }
        };
        if removed {
            info!("Deleted graph for {}", database_id);
        }
        removed
    }
}
