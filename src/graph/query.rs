//! Query interface for the schema knowledge graph.
//!
//! This module answers the graph-shaped questions asked while documenting a
//! database:
//! - Table context: columns, keys, references, indexes and the surrounding
//!   cluster of related tables
//! - Relationship paths: shortest chain of tables linking two tables
//! - Statistics: node, edge and category counts
//!
//! Every traversal works on the undirected projection of the graph, so a
//! table is as close to the tables referencing it as to the ones it
//! references.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

use super::categorize::{is_code_column, lookup_table_candidates, Category};
use super::types::*;
use super::KnowledgeGraph;

// ============================================================================
// Context types
// ============================================================================

/// A column of the context table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// A foreign key declared on the context table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeySummary {
    pub constraint_name: String,
    pub references_table: String,
    pub columns: Vec<String>,
    pub ref_columns: Vec<String>,
}

/// A foreign key in another table pointing at the context table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferrerSummary {
    pub from_table: String,
    /// Constrained columns in `from_table`.
    pub columns: Vec<String>,
    /// Referred columns in the context table.
    pub ref_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A coded column and the table most likely to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeColumn {
    pub column: String,
    pub lookup_table: Option<String>,
}

/// Everything known about one table, ready to hand to a documentation
/// generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableContext {
    pub table_name: String,
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub row_count: u64,
    pub columns: Vec<ColumnSummary>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeySummary>,
    pub referenced_by: Vec<ReferrerSummary>,
    /// Distinct FK targets and referrers, first seen first.
    pub related_tables: Vec<String>,
    pub indexes: Vec<IndexSummary>,
    pub code_columns: Vec<CodeColumn>,
    /// Tables within `depth` hops, nearest first. Empty when depth <= 1.
    pub semantic_cluster: Vec<String>,
}

/// Summary counts over a whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_tables: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
}

// ============================================================================
// Queries
// ============================================================================

impl KnowledgeGraph {
    /// Gather the context of a table. Returns `None` for unknown tables.
    ///
    /// `depth` only affects the semantic cluster, which is computed when
    /// `depth > 1`.
    ///
    /// # Example
    /// ```ignore
    /// let ctx = graph.table_context("orders", 2).unwrap();
    /// assert!(ctx.related_tables.contains(&"customers".to_string()));
    /// ```
    pub fn table_context(&self, table: &str, depth: usize) -> Option<TableContext> {
        let node = self.table(table)?;
        let props = node.as_table()?;

        let mut columns: Vec<(usize, &SchemaNode)> = Vec::new();
        let mut foreign_keys = Vec::new();
        for edge in self.outgoing_edges(&node.node_id) {
            match &edge.properties {
                EdgeProperties::HasColumn(p) => {
                    if let Some(column) = self.node(&edge.target) {
                        columns.push((p.position, column));
                    }
                }
                EdgeProperties::References(p) => {
                    if let Some(target) = self.node(&edge.target) {
                        foreign_keys.push(ForeignKeySummary {
                            constraint_name: p.constraint_name.clone(),
                            references_table: target.name.clone(),
                            columns: p.columns.clone(),
                            ref_columns: p.ref_columns.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        columns.sort_by_key(|(position, _)| *position);

        let mut referenced_by = Vec::new();
        let mut indexes = Vec::new();
        for edge in self.incoming_edges(&node.node_id) {
            let Some(source) = self.node(&edge.source) else {
                continue;
            };
            match &edge.properties {
                EdgeProperties::References(p) => referenced_by.push(ReferrerSummary {
                    from_table: source.name.clone(),
                    columns: p.columns.clone(),
                    ref_columns: p.ref_columns.clone(),
                }),
                EdgeProperties::Indexes(_) => {
                    if let Some(index) = source.as_index() {
                        indexes.push(IndexSummary {
                            name: source.name.clone(),
                            columns: index.columns.clone(),
                            unique: index.unique,
                        });
                    }
                }
                _ => {}
            }
        }

        let mut related_tables: Vec<String> = Vec::new();
        let linked = foreign_keys
            .iter()
            .map(|fk| &fk.references_table)
            .chain(referenced_by.iter().map(|r| &r.from_table));
        for name in linked {
            if name != table && !related_tables.contains(name) {
                related_tables.push(name.clone());
            }
        }

        let code_columns = columns
            .iter()
            .filter(|(_, column)| is_code_column(&column.name))
            .map(|(_, column)| CodeColumn {
                column: column.name.clone(),
                lookup_table: self.lookup_table_for(column),
            })
            .collect();

        let semantic_cluster = if depth > 1 {
            self.semantic_cluster(table, depth)
        } else {
            Vec::new()
        };

        Some(TableContext {
            table_name: node.name.clone(),
            categories: self.categories_of(table).into_iter().collect(),
            comment: props.comment.clone(),
            row_count: props.row_count,
            columns: columns
                .iter()
                .filter_map(|(_, column)| {
                    column.as_column().map(|c| ColumnSummary {
                        name: column.name.clone(),
                        data_type: c.data_type.clone(),
                        nullable: c.nullable,
                    })
                })
                .collect(),
            primary_keys: props.primary_keys.clone(),
            foreign_keys,
            referenced_by,
            related_tables,
            indexes,
            code_columns,
            semantic_cluster,
        })
    }

    /// Tables reachable from `table` within `depth` hops, through nodes of
    /// every kind. Ordered by hop distance, then name; the start table is
    /// excluded.
    pub fn semantic_cluster(&self, table: &str, depth: usize) -> Vec<String> {
        let Some(start) = self.table_position(table) else {
            return Vec::new();
        };

        let mut visited = vec![false; self.node_count()];
        visited[start] = true;

        let mut cluster = Vec::new();
        let mut frontier = vec![start];

        for _ in 0..depth {
            let mut next = Vec::new();
            let mut level: Vec<&str> = Vec::new();

            for &pos in &frontier {
                for neighbor in self.undirected_neighbors(pos) {
                    if visited[neighbor] {
                        continue;
                    }
                    visited[neighbor] = true;
                    next.push(neighbor);

                    let node = self.node_at(neighbor);
                    if node.is_table() {
                        level.push(&node.name);
                    }
                }
            }

            level.sort_unstable();
            cluster.extend(level.into_iter().map(str::to_string));

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        cluster
    }

    /// Shortest chain of tables linking `from` to `to`.
    ///
    /// The search runs over the whole graph (columns included) so hops are
    /// counted in nodes, but only TABLE nodes appear in the returned path.
    /// Returns `None` when either table is unknown or they are disconnected.
    ///
    /// # Example
    /// ```ignore
    /// let path = graph.find_path("order_items", "customers").unwrap();
    /// assert_eq!(path, vec!["order_items", "orders", "customers"]);
    /// ```
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let from_pos = self.table_position(from)?;
        let to_pos = self.table_position(to)?;

        if from_pos == to_pos {
            return Some(vec![from.to_string()]);
        }

        // BFS with a parent map
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut visited = vec![false; self.node_count()];
        let mut queue = VecDeque::new();
        visited[from_pos] = true;
        queue.push_back(from_pos);

        while let Some(current) = queue.pop_front() {
            if current == to_pos {
                return Some(self.reconstruct_table_path(from_pos, to_pos, &parent));
            }

            for neighbor in self.undirected_neighbors(current) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    parent.insert(neighbor, current);
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    /// Walk the BFS parent map back from `to_pos`, keeping tables only.
    fn reconstruct_table_path(
        &self,
        from_pos: usize,
        to_pos: usize,
        parent: &HashMap<usize, usize>,
    ) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = to_pos;

        loop {
            let node = self.node_at(current);
            if node.is_table() {
                path.push(node.name.clone());
            }
            if current == from_pos {
                break;
            }
            match parent.get(&current) {
                Some(&prev) => current = prev,
                None => break,
            }
        }

        path.reverse();
        path
    }

    /// Node, edge and category counts.
    pub fn statistics(&self) -> GraphStatistics {
        let mut node_types: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.nodes() {
            *node_types.entry(node.kind().to_string()).or_default() += 1;
        }

        let mut edge_types: BTreeMap<String, usize> = BTreeMap::new();
        for edge in self.edges() {
            *edge_types.entry(edge.kind().to_string()).or_default() += 1;
        }

        let mut category_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for tags in self.categories().values() {
            for tag in tags {
                *category_distribution.entry(tag.to_string()).or_default() += 1;
            }
        }

        GraphStatistics {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            total_tables: node_types.get(NodeKind::Table.as_str()).copied().unwrap_or(0),
            node_types,
            edge_types,
            category_distribution,
        }
    }

    /// Lookup table for a coded column: a FK target tagged LOOKUP, else the
    /// first table named like `lkp_<base>` and friends.
    fn lookup_table_for(&self, column: &SchemaNode) -> Option<String> {
        for edge in self.outgoing_edges(&column.node_id) {
            if edge.kind() != EdgeKind::FkReferences {
                continue;
            }
            let referred_table = self.node(&edge.target).and_then(|n| n.as_column()).map(|c| &c.table);
            if let Some(referred_table) = referred_table {
                if self.categories_of(referred_table).contains(&Category::Lookup) {
                    return Some(referred_table.clone());
                }
            }
        }

        let tables: HashMap<String, &str> = self
            .table_names()
            .into_iter()
            .rev()
            .map(|name| (name.to_lowercase(), name))
            .collect();

        lookup_table_candidates(&column.name)
            .iter()
            .find_map(|candidate| tables.get(candidate).map(|name| name.to_string()))
    }
}
