//! Graph construction from a schema source.
//!
//! The builder fetches metadata for every table through a bounded pool of
//! concurrent requests, then populates an empty graph in strictly ordered
//! phases:
//! - Phase 1: TABLE nodes
//! - Phase 2: COLUMN nodes and HAS_COLUMN edges
//! - Phase 3: REFERENCES and FK_REFERENCES edges
//! - Phase 4: INDEX nodes and INDEXES edges
//! - Phase 5: categorization
//!
//! Per-entity failures never abort a build. They are logged, skipped and
//! recorded in [`BuildStats::skipped`]. Only failing to list tables is fatal.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metadata::{ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaSource, SourceError};

use super::categorize::Categorizer;
use super::types::*;
use super::{GraphError, KnowledgeGraph};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort a graph build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to list tables: {0}")]
    ListTables(#[source] SourceError),
}

pub type BuildResult<T> = Result<T, BuildError>;

// ============================================================================
// Configuration and Results
// ============================================================================

/// Builder tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Maximum number of tables whose metadata is fetched at once.
    pub max_concurrency: usize,
    /// Whether to ask the source for row counts at all.
    pub collect_row_counts: bool,
    /// Upper bound on a single row count request.
    pub row_count_timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            collect_row_counts: true,
            row_count_timeout: Duration::from_millis(5000),
        }
    }
}

/// Kind of entity that was skipped during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Column,
    ForeignKey,
    Index,
    RowCount,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Table => "table",
            EntityKind::Column => "column",
            EntityKind::ForeignKey => "foreign key",
            EntityKind::Index => "index",
            EntityKind::RowCount => "row count",
        };
        f.write_str(s)
    }
}

/// An entity the builder could not add to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub kind: EntityKind,
    /// Table the entity belongs to.
    pub table: String,
    /// Column, constraint or index name, when the entity is below table level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub reason: String,
}

impl SkippedEntity {
    fn new(kind: EntityKind, table: &str, name: Option<&str>, reason: impl Into<String>) -> Self {
        let skipped = Self {
            kind,
            table: table.to_string(),
            name: name.map(str::to_string),
            reason: reason.into(),
        };
        warn!("Skipped {}", skipped);
        skipped
    }
}

impl fmt::Display for SkippedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}.{}: {}", self.kind, self.table, name, self.reason),
            None => write!(f, "{} {}: {}", self.kind, self.table, self.reason),
        }
    }
}

/// Counters collected while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub tables: usize,
    pub columns: usize,
    pub foreign_keys: usize,
    pub indexes: usize,
    pub skipped: Vec<SkippedEntity>,
}

/// A finished graph together with what happened while building it.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: KnowledgeGraph,
    pub stats: BuildStats,
}

// ============================================================================
// Fetched metadata
// ============================================================================

/// Everything fetched for one table before the graph is populated.
#[derive(Debug)]
struct TableMetadata {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyInfo>,
    indexes: Vec<IndexInfo>,
    comment: Option<String>,
    row_count: u64,
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a [`KnowledgeGraph`] from a [`SchemaSource`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: BuildConfig,
    categorizer: Categorizer,
}

impl GraphBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            categorizer: Categorizer::new(),
        }
    }

    /// Use a custom categorizer for phase 5.
    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build a graph from scratch.
    pub async fn build<S>(&self, source: &S) -> BuildResult<BuildOutcome>
    where
        S: SchemaSource + ?Sized,
    {
        let started = Instant::now();
        let mut stats = BuildStats::default();

        let listed = source.list_tables().await.map_err(BuildError::ListTables)?;
        info!("Building schema graph for {} tables", listed.len());

        // First occurrence of a name wins
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(listed.len());
        for name in listed {
            if seen.insert(name.clone()) {
                names.push(name);
            } else {
                stats.skipped.push(SkippedEntity::new(
                    EntityKind::Table,
                    &name,
                    None,
                    "duplicate table name",
                ));
            }
        }

        let fetched: Vec<(Option<TableMetadata>, Vec<SkippedEntity>)> = stream::iter(names)
            .map(|name| self.fetch_table(source, name))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut tables = Vec::with_capacity(fetched.len());
        for (metadata, skipped) in fetched {
            stats.skipped.extend(skipped);
            tables.extend(metadata);
        }

        let mut graph = KnowledgeGraph::new();
        self.create_table_nodes(&mut graph, &tables, &mut stats);
        self.create_column_nodes(&mut graph, &tables, &mut stats);
        self.create_foreign_key_edges(&mut graph, &tables, &mut stats);
        self.create_index_nodes(&mut graph, &tables, &mut stats);
        self.categorizer.apply(&mut graph);

        info!(
            "Built schema graph: {} nodes, {} edges, {} tables, {} skipped in {:?}",
            graph.node_count(),
            graph.edge_count(),
            stats.tables,
            stats.skipped.len(),
            started.elapsed()
        );

        Ok(BuildOutcome { graph, stats })
    }

    /// Fetch all metadata for one table.
    ///
    /// A table whose columns or primary key cannot be read is dropped
    /// entirely. Missing foreign keys or indexes only empty that part.
    async fn fetch_table<S>(
        &self,
        source: &S,
        name: String,
    ) -> (Option<TableMetadata>, Vec<SkippedEntity>)
    where
        S: SchemaSource + ?Sized,
    {
        let mut skipped = Vec::new();

        let listed = match source.get_columns(&name).await {
            Ok(columns) => columns,
            Err(e) => {
                skipped.push(SkippedEntity::new(EntityKind::Table, &name, None, e.to_string()));
                return (None, skipped);
            }
        };

        // First occurrence of a column name wins; column_count must equal
        // the HAS_COLUMN edges created in phase 2
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(listed.len());
        for column in listed {
            if seen.insert(column.name.clone()) {
                columns.push(column);
            } else {
                skipped.push(SkippedEntity::new(
                    EntityKind::Column,
                    &name,
                    Some(&column.name),
                    "duplicate column name",
                ));
            }
        }

        let primary_key = match source.get_primary_key(&name).await {
            Ok(pk) => pk,
            Err(e) => {
                skipped.push(SkippedEntity::new(EntityKind::Table, &name, None, e.to_string()));
                return (None, skipped);
            }
        };

        let foreign_keys = source.get_foreign_keys(&name).await.unwrap_or_else(|e| {
            skipped.push(SkippedEntity::new(EntityKind::ForeignKey, &name, None, e.to_string()));
            Vec::new()
        });

        let indexes = source.get_indexes(&name).await.unwrap_or_else(|e| {
            skipped.push(SkippedEntity::new(EntityKind::Index, &name, None, e.to_string()));
            Vec::new()
        });

        let comment = source.get_table_comment(&name).await.unwrap_or_else(|e| {
            debug!("No comment for {}: {}", name, e);
            None
        });

        let row_count = if self.config.collect_row_counts {
            match tokio::time::timeout(self.config.row_count_timeout, source.get_row_count(&name)).await {
                Ok(Ok(count)) => count,
                Ok(Err(e)) => {
                    skipped.push(SkippedEntity::new(EntityKind::RowCount, &name, None, e.to_string()));
                    0
                }
                Err(_) => {
                    skipped.push(SkippedEntity::new(
                        EntityKind::RowCount,
                        &name,
                        None,
                        format!("timed out after {:?}", self.config.row_count_timeout),
                    ));
                    0
                }
            }
        } else {
            0
        };

        debug!(
            "Fetched {}: {} columns, {} foreign keys, {} indexes",
            name,
            columns.len(),
            foreign_keys.len(),
            indexes.len()
        );

        let metadata = TableMetadata {
            name,
            columns,
            primary_key,
            foreign_keys,
            indexes,
            comment,
            row_count,
        };
        (Some(metadata), skipped)
    }
}

// ============================================================================
// Phase 1: Table nodes
// ============================================================================

impl GraphBuilder {
    fn create_table_nodes(&self, graph: &mut KnowledgeGraph, tables: &[TableMetadata], stats: &mut BuildStats) {
        for table in tables {
            let properties = TableProperties {
                row_count: table.row_count,
                column_count: table.columns.len(),
                primary_keys: table.primary_key.clone(),
                comment: table.comment.clone(),
                extra: Extra::new(),
            };

            match graph.add_node(SchemaNode::table(&table.name, properties)) {
                Ok(()) => stats.tables += 1,
                Err(e) => stats
                    .skipped
                    .push(SkippedEntity::new(EntityKind::Table, &table.name, None, e.to_string())),
            }
        }
    }
}

// ============================================================================
// Phase 2: Column nodes + HAS_COLUMN edges
// ============================================================================

impl GraphBuilder {
    fn create_column_nodes(&self, graph: &mut KnowledgeGraph, tables: &[TableMetadata], stats: &mut BuildStats) {
        for table in tables {
            for (position, column) in table.columns.iter().enumerate() {
                let properties = ColumnProperties {
                    table: table.name.clone(),
                    data_type: column.data_type.clone(),
                    nullable: column.nullable,
                    default: column.default.clone(),
                    primary_key: table.primary_key.contains(&column.name),
                    extra: Extra::new(),
                };

                let node = SchemaNode::column(&column.name, properties);
                let column_node = node.node_id.clone();
                if let Err(e) = graph.add_node(node) {
                    stats.skipped.push(SkippedEntity::new(
                        EntityKind::Column,
                        &table.name,
                        Some(&column.name),
                        e.to_string(),
                    ));
                    continue;
                }

                let edge = SchemaEdge::new(
                    table_id(&table.name),
                    column_node,
                    EdgeProperties::HasColumn(HasColumnProperties {
                        position,
                        extra: Extra::new(),
                    }),
                );
                match graph.add_edge(edge) {
                    Ok(()) => stats.columns += 1,
                    Err(e) => stats.skipped.push(SkippedEntity::new(
                        EntityKind::Column,
                        &table.name,
                        Some(&column.name),
                        e.to_string(),
                    )),
                }
            }
        }
    }
}

// ============================================================================
// Phase 3: REFERENCES + FK_REFERENCES edges
// ============================================================================

impl GraphBuilder {
    fn create_foreign_key_edges(
        &self,
        graph: &mut KnowledgeGraph,
        tables: &[TableMetadata],
        stats: &mut BuildStats,
    ) {
        for table in tables {
            for fk in &table.foreign_keys {
                let constraint = fk.constraint_name();

                if !graph.has_table(&fk.referred_table) {
                    stats.skipped.push(SkippedEntity::new(
                        EntityKind::ForeignKey,
                        &table.name,
                        Some(constraint),
                        format!("referred table {} is not in the graph", fk.referred_table),
                    ));
                    continue;
                }

                let edge = SchemaEdge::new(
                    table_id(&table.name),
                    table_id(&fk.referred_table),
                    EdgeProperties::References(ReferencesProperties {
                        constraint_name: constraint.to_string(),
                        columns: fk.constrained_columns.clone(),
                        ref_columns: fk.referred_columns.clone(),
                        extra: Extra::new(),
                    }),
                );
                if let Err(e) = graph.add_edge(edge) {
                    stats.skipped.push(SkippedEntity::new(
                        EntityKind::ForeignKey,
                        &table.name,
                        Some(constraint),
                        e.to_string(),
                    ));
                    continue;
                }
                stats.foreign_keys += 1;

                for (column, referred) in fk.column_pairs() {
                    let edge = SchemaEdge::new(
                        column_id(&table.name, column),
                        column_id(&fk.referred_table, referred),
                        EdgeProperties::FkReferences(FkReferencesProperties {
                            constraint_name: constraint.to_string(),
                            extra: Extra::new(),
                        }),
                    );
                    if let Err(GraphError::DanglingEdge(missing)) = graph.add_edge(edge) {
                        stats.skipped.push(SkippedEntity::new(
                            EntityKind::ForeignKey,
                            &table.name,
                            Some(constraint),
                            format!("column {} is not in the graph", missing),
                        ));
                    }
                }
            }
        }
    }
}

// ============================================================================
// Phase 4: Index nodes + INDEXES edges
// ============================================================================

impl GraphBuilder {
    fn create_index_nodes(&self, graph: &mut KnowledgeGraph, tables: &[TableMetadata], stats: &mut BuildStats) {
        for table in tables {
            for index in &table.indexes {
                let index_name = index.index_name();
                let properties = IndexProperties {
                    table: table.name.clone(),
                    columns: index.columns.clone(),
                    unique: index.unique,
                    extra: Extra::new(),
                };

                let node = SchemaNode::index(index_name, properties);
                let index_node = node.node_id.clone();
                if let Err(e) = graph.add_node(node) {
                    stats.skipped.push(SkippedEntity::new(
                        EntityKind::Index,
                        &table.name,
                        Some(index_name),
                        e.to_string(),
                    ));
                    continue;
                }

                let edge = SchemaEdge::new(
                    index_node,
                    table_id(&table.name),
                    EdgeProperties::Indexes(IndexesProperties {
                        columns: index.columns.clone(),
                        extra: Extra::new(),
                    }),
                );
                match graph.add_edge(edge) {
                    Ok(()) => stats.indexes += 1,
                    Err(e) => stats.skipped.push(SkippedEntity::new(
                        EntityKind::Index,
                        &table.name,
                        Some(index_name),
                        e.to_string(),
                    )),
                }
            }
        }
    }
}
