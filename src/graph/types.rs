//! Type definitions for the schema knowledge graph.
//!
//! This module defines the node kinds, edge kinds, and the typed property
//! sets attached to each. Properties are a tagged union per kind rather
//! than an open map; every property struct carries an `extra` map for
//! metadata that has no dedicated field.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form string metadata attached to a node or edge.
pub type Extra = BTreeMap<String, String>;

// ============================================================================
// Node ids
// ============================================================================

/// Node id of a table: `table:<name>`.
pub fn table_id(table: &str) -> String {
    format!("table:{}", table)
}

/// Node id of a column: `column:<table>.<column>`.
///
/// `.` and `\` inside either name are backslash-escaped, so a table `a`
/// with column `b.c` and a table `a.b` with column `c` get distinct ids.
pub fn column_id(table: &str, column: &str) -> String {
    format!("column:{}.{}", escape_id_part(table), escape_id_part(column))
}

/// Node id of an index: `index:<table>.<index>`, escaped like [`column_id`].
pub fn index_id(table: &str, index: &str) -> String {
    format!("index:{}.{}", escape_id_part(table), escape_id_part(index))
}

fn escape_id_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c == '.' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Kinds
// ============================================================================

/// Kind of a node in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Table,
    Column,
    Index,
}

impl NodeKind {
    /// All node kinds, in display order.
    pub const ALL: [NodeKind; 3] = [NodeKind::Table, NodeKind::Column, NodeKind::Index];

    /// Upper-case label used in exports and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Table => "TABLE",
            NodeKind::Column => "COLUMN",
            NodeKind::Index => "INDEX",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an edge in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// table → column
    HasColumn,
    /// table → referred table (one per FK constraint)
    References,
    /// column → referred column (one per FK column pair)
    FkReferences,
    /// index → table
    Indexes,
}

impl EdgeKind {
    /// All edge kinds, in display order.
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::HasColumn,
        EdgeKind::References,
        EdgeKind::FkReferences,
        EdgeKind::Indexes,
    ];

    /// Upper-case label used in exports and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasColumn => "HAS_COLUMN",
            EdgeKind::References => "REFERENCES",
            EdgeKind::FkReferences => "FK_REFERENCES",
            EdgeKind::Indexes => "INDEXES",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Node Properties
// ============================================================================

/// Properties of a TABLE node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProperties {
    /// Row count (0 when it could not be collected).
    pub row_count: u64,
    /// Number of columns reported by the source.
    pub column_count: usize,
    /// Primary key columns (ordered).
    pub primary_keys: Vec<String>,
    /// Table comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// Properties of a COLUMN node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProperties {
    /// Owning table name.
    pub table: String,
    /// Source-reported type name.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// Is this column part of the primary key?
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// Properties of an INDEX node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProperties {
    /// Owning table name.
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// Typed node properties; the variant determines the node kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeProperties {
    Table(TableProperties),
    Column(ColumnProperties),
    Index(IndexProperties),
}

impl NodeProperties {
    /// The node kind these properties belong to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeProperties::Table(_) => NodeKind::Table,
            NodeProperties::Column(_) => NodeKind::Column,
            NodeProperties::Index(_) => NodeKind::Index,
        }
    }

    /// The `extra` map of whichever variant this is.
    pub fn extra(&self) -> &Extra {
        match self {
            NodeProperties::Table(p) => &p.extra,
            NodeProperties::Column(p) => &p.extra,
            NodeProperties::Index(p) => &p.extra,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A node in the schema knowledge graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Stable id, namespaced by kind (see [`table_id`], [`column_id`], [`index_id`]).
    pub node_id: String,
    /// Unqualified name (table, column or index name).
    pub name: String,
    pub properties: NodeProperties,
    /// Reserved for semantic similarity; never read by graph algorithms.
    pub embedding: Option<Vec<f32>>,
}

impl SchemaNode {
    /// Create a TABLE node.
    pub fn table(name: &str, properties: TableProperties) -> Self {
        Self {
            node_id: table_id(name),
            name: name.to_string(),
            properties: NodeProperties::Table(properties),
            embedding: None,
        }
    }

    /// Create a COLUMN node; the owning table is taken from the properties.
    pub fn column(name: &str, properties: ColumnProperties) -> Self {
        Self {
            node_id: column_id(&properties.table, name),
            name: name.to_string(),
            properties: NodeProperties::Column(properties),
            embedding: None,
        }
    }

    /// Create an INDEX node; the owning table is taken from the properties.
    pub fn index(name: &str, properties: IndexProperties) -> Self {
        Self {
            node_id: index_id(&properties.table, name),
            name: name.to_string(),
            properties: NodeProperties::Index(properties),
            embedding: None,
        }
    }

    /// The node kind.
    pub fn kind(&self) -> NodeKind {
        self.properties.kind()
    }

    pub fn is_table(&self) -> bool {
        self.kind() == NodeKind::Table
    }

    /// Table properties, if this is a TABLE node.
    pub fn as_table(&self) -> Option<&TableProperties> {
        match &self.properties {
            NodeProperties::Table(p) => Some(p),
            _ => None,
        }
    }

    /// Column properties, if this is a COLUMN node.
    pub fn as_column(&self) -> Option<&ColumnProperties> {
        match &self.properties {
            NodeProperties::Column(p) => Some(p),
            _ => None,
        }
    }

    /// Index properties, if this is an INDEX node.
    pub fn as_index(&self) -> Option<&IndexProperties> {
        match &self.properties {
            NodeProperties::Index(p) => Some(p),
            _ => None,
        }
    }
}

// ============================================================================
// Edge Properties
// ============================================================================

/// HAS_COLUMN edge: table → column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasColumnProperties {
    /// 0-based ordinal position of the column in its table.
    pub position: usize,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// REFERENCES edge: table → referred table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesProperties {
    pub constraint_name: String,
    /// Constrained columns in the source table.
    pub columns: Vec<String>,
    /// Referred columns in the target table.
    pub ref_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// FK_REFERENCES edge: column → referred column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FkReferencesProperties {
    pub constraint_name: String,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// INDEXES edge: index → table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexesProperties {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// Typed edge properties; the variant determines the edge kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeProperties {
    HasColumn(HasColumnProperties),
    References(ReferencesProperties),
    FkReferences(FkReferencesProperties),
    Indexes(IndexesProperties),
}

impl EdgeProperties {
    /// The edge kind these properties belong to.
    pub fn kind(&self) -> EdgeKind {
        match self {
            EdgeProperties::HasColumn(_) => EdgeKind::HasColumn,
            EdgeProperties::References(_) => EdgeKind::References,
            EdgeProperties::FkReferences(_) => EdgeKind::FkReferences,
            EdgeProperties::Indexes(_) => EdgeKind::Indexes,
        }
    }
}

// ============================================================================
// Edges
// ============================================================================

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEdge {
    pub source: String,
    pub target: String,
    pub properties: EdgeProperties,
}

impl SchemaEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, properties: EdgeProperties) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            properties,
        }
    }

    /// The edge kind.
    pub fn kind(&self) -> EdgeKind {
        self.properties.kind()
    }

    /// REFERENCES properties, if this is a REFERENCES edge.
    pub fn as_references(&self) -> Option<&ReferencesProperties> {
        match &self.properties {
            EdgeProperties::References(p) => Some(p),
            _ => None,
        }
    }
}
