//! Schema knowledge graph - tables, columns and indexes as one multigraph.
//!
//! # Architecture
//!
//! ```text
//! SchemaSource
//!     │
//!     ├──> GraphBuilder (five ordered phases)
//!     │      ├─ 1. TABLE nodes
//!     │      ├─ 2. COLUMN nodes + HAS_COLUMN edges
//!     │      ├─ 3. REFERENCES / FK_REFERENCES edges
//!     │      ├─ 4. INDEX nodes + INDEXES edges
//!     │      └─ 5. Categorizer (LOOKUP, JUNCTION, ...)
//!     │
//!     ├──> KnowledgeGraph (adjacency-list multigraph)
//!     │      ├─ Nodes: TABLE, COLUMN, INDEX
//!     │      └─ Edges: HAS_COLUMN, REFERENCES, FK_REFERENCES, INDEXES
//!     │
//!     └──> Readers
//!            ├─ Query engine (context, cluster, path, statistics)
//!            └─ Exporter (JSON, GraphML)
//! ```
//!
//! The graph contains three kinds of nodes and four kinds of edges:
//! - HAS_COLUMN: table → column
//! - REFERENCES: table → table (one per FK constraint)
//! - FK_REFERENCES: column → column (one per FK column pair)
//! - INDEXES: index → table
//!
//! Parallel edges are kept. Once built, a graph is never mutated; it is
//! shared between readers behind an `Arc`.

mod builder;
pub mod categorize;
pub mod export;
pub mod query;
pub mod types;

pub use builder::{
    BuildConfig, BuildError, BuildOutcome, BuildResult, BuildStats, EntityKind, GraphBuilder,
    SkippedEntity,
};
pub use categorize::{Category, CategoryRule, Categorizer};
pub use export::{ExportError, ExportFormat};
pub use query::{
    CodeColumn, ColumnSummary, ForeignKeySummary, GraphStatistics, IndexSummary, ReferrerSummary,
    TableContext,
};
pub use types::*;

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Errors raised when assembling a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge endpoint not found: {0}")]
    DanglingEdge(String),

    #[error("Node id {node_id} does not match its name and kind (expected {expected})")]
    MismatchedNodeId { node_id: String, expected: String },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Edge positions touching one node.
#[derive(Debug, Clone, Default)]
struct Adjacency {
    outgoing: Vec<usize>,
    incoming: Vec<usize>,
}

/// The schema knowledge graph.
///
/// Nodes are stored in insertion order with an id index; edges are stored
/// in build order. Forward and reverse adjacency lists hold edge positions
/// so neighbor iteration and reverse lookups never scan the edge list.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    /// Nodes in insertion order
    nodes: Vec<SchemaNode>,

    /// Index: node id → position in `nodes`
    node_index: HashMap<String, usize>,

    /// Index: table name → position in `nodes`
    table_index: HashMap<String, usize>,

    /// Edges in build order
    edges: Vec<SchemaEdge>,

    /// (source, target) node positions per edge, parallel to `edges`
    endpoints: Vec<(usize, usize)>,

    /// Adjacency per node, parallel to `nodes`
    adjacency: Vec<Adjacency>,

    /// Annotation: table name → category tags
    categories: BTreeMap<String, BTreeSet<Category>>,
}

impl KnowledgeGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a node.
    ///
    /// The id must be the one derived from the node's name and properties
    /// (`table:<name>`, `column:<table>.<column>`, `index:<table>.<index>`)
    /// and must be unique. A table name therefore maps to exactly one node.
    pub fn add_node(&mut self, node: SchemaNode) -> GraphResult<()> {
        let expected = match &node.properties {
            NodeProperties::Table(_) => table_id(&node.name),
            NodeProperties::Column(p) => column_id(&p.table, &node.name),
            NodeProperties::Index(p) => index_id(&p.table, &node.name),
        };
        if node.node_id != expected {
            return Err(GraphError::MismatchedNodeId {
                node_id: node.node_id,
                expected,
            });
        }
        if self.node_index.contains_key(&node.node_id) {
            return Err(GraphError::DuplicateNode(node.node_id));
        }

        let pos = self.nodes.len();
        if node.is_table() {
            self.table_index.insert(node.name.clone(), pos);
        }
        self.node_index.insert(node.node_id.clone(), pos);
        self.nodes.push(node);
        self.adjacency.push(Adjacency::default());
        Ok(())
    }

    /// Add an edge. Both endpoints must already exist.
    pub fn add_edge(&mut self, edge: SchemaEdge) -> GraphResult<()> {
        let source = self
            .position(&edge.source)
            .ok_or_else(|| GraphError::DanglingEdge(edge.source.clone()))?;
        let target = self
            .position(&edge.target)
            .ok_or_else(|| GraphError::DanglingEdge(edge.target.clone()))?;

        let pos = self.edges.len();
        self.adjacency[source].outgoing.push(pos);
        self.adjacency[target].incoming.push(pos);
        self.endpoints.push((source, target));
        self.edges.push(edge);
        Ok(())
    }

    /// Replace the category annotation.
    pub(crate) fn set_categories(&mut self, categories: BTreeMap<String, BTreeSet<Category>>) {
        self.categories = categories;
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get a node by id.
    pub fn node(&self, node_id: &str) -> Option<&SchemaNode> {
        self.position(node_id).map(|pos| &self.nodes[pos])
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.node_index.contains_key(node_id)
    }

    /// Get a TABLE node by table name.
    pub fn table(&self, name: &str) -> Option<&SchemaNode> {
        self.table_index.get(name).map(|&pos| &self.nodes[pos])
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table_index.contains_key(name)
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    /// All edges, in build order.
    pub fn edges(&self) -> &[SchemaEdge] {
        &self.edges
    }

    /// Names of all tables, in insertion order.
    pub fn table_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_table())
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Edges leaving a node, in build order.
    pub fn outgoing_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a SchemaEdge> + 'a {
        let positions = self
            .position(node_id)
            .map(|pos| self.adjacency[pos].outgoing.as_slice())
            .unwrap_or(&[]);
        positions.iter().map(move |&e| &self.edges[e])
    }

    /// Edges entering a node, in build order.
    pub fn incoming_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a SchemaEdge> + 'a {
        let positions = self
            .position(node_id)
            .map(|pos| self.adjacency[pos].incoming.as_slice())
            .unwrap_or(&[]);
        positions.iter().map(move |&e| &self.edges[e])
    }

    /// Category tags of a table (empty if the table has none or is unknown).
    pub fn categories_of(&self, table: &str) -> BTreeSet<Category> {
        self.categories.get(table).cloned().unwrap_or_default()
    }

    /// The full category annotation.
    pub fn categories(&self) -> &BTreeMap<String, BTreeSet<Category>> {
        &self.categories
    }

    // ========================================================================
    // Internal traversal helpers
    // ========================================================================

    pub(crate) fn position(&self, node_id: &str) -> Option<usize> {
        self.node_index.get(node_id).copied()
    }

    pub(crate) fn table_position(&self, name: &str) -> Option<usize> {
        self.table_index.get(name).copied()
    }

    pub(crate) fn node_at(&self, pos: usize) -> &SchemaNode {
        &self.nodes[pos]
    }

    /// Neighbors of a node in the undirected projection: successors in
    /// edge order, then predecessors in edge order. Parallel edges yield
    /// repeated neighbors; callers deduplicate with a visited set.
    pub(crate) fn undirected_neighbors(&self, pos: usize) -> impl Iterator<Item = usize> + '_ {
        let adj = &self.adjacency[pos];
        let successors = adj.outgoing.iter().map(move |&e| self.endpoints[e].1);
        let predecessors = adj.incoming.iter().map(move |&e| self.endpoints[e].0);
        successors.chain(predecessors)
    }
}
