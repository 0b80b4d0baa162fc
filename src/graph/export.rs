//! Graph export to JSON and GraphML.
//!
//! JSON is lossless: [`import_json`] rebuilds an equal node and edge set.
//! GraphML targets external graph tools; list and map properties are
//! flattened to JSON strings since GraphML only has scalar attributes.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::categorize::Categorizer;
use super::types::*;
use super::{GraphError, KnowledgeGraph};

/// Errors raised by export and import.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0} (expected json or graphml)")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid graph document: {0}")]
    Graph(#[from] GraphError),

    #[error("Failed to write document: {0}")]
    Format(#[from] fmt::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    GraphMl,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "graphml" => Ok(ExportFormat::GraphMl),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::GraphMl => f.write_str("graphml"),
        }
    }
}

/// Serialize a graph in the requested format.
pub fn export(graph: &KnowledgeGraph, format: ExportFormat) -> ExportResult<String> {
    match format {
        ExportFormat::Json => to_json(graph),
        ExportFormat::GraphMl => to_graphml(graph),
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct JsonGraph {
    nodes: Vec<JsonNode>,
    edges: Vec<JsonEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonNode {
    id: String,
    #[serde(rename = "type")]
    node_type: NodeKind,
    name: String,
    properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonEdge {
    source: String,
    target: String,
    #[serde(rename = "type")]
    edge_type: EdgeKind,
    properties: Value,
}

fn node_properties_value(properties: &NodeProperties) -> serde_json::Result<Value> {
    match properties {
        NodeProperties::Table(p) => serde_json::to_value(p),
        NodeProperties::Column(p) => serde_json::to_value(p),
        NodeProperties::Index(p) => serde_json::to_value(p),
    }
}

fn edge_properties_value(properties: &EdgeProperties) -> serde_json::Result<Value> {
    match properties {
        EdgeProperties::HasColumn(p) => serde_json::to_value(p),
        EdgeProperties::References(p) => serde_json::to_value(p),
        EdgeProperties::FkReferences(p) => serde_json::to_value(p),
        EdgeProperties::Indexes(p) => serde_json::to_value(p),
    }
}

fn parse_node_properties(kind: NodeKind, value: Value) -> serde_json::Result<NodeProperties> {
    Ok(match kind {
        NodeKind::Table => NodeProperties::Table(serde_json::from_value(value)?),
        NodeKind::Column => NodeProperties::Column(serde_json::from_value(value)?),
        NodeKind::Index => NodeProperties::Index(serde_json::from_value(value)?),
    })
}

fn parse_edge_properties(kind: EdgeKind, value: Value) -> serde_json::Result<EdgeProperties> {
    Ok(match kind {
        EdgeKind::HasColumn => EdgeProperties::HasColumn(serde_json::from_value(value)?),
        EdgeKind::References => EdgeProperties::References(serde_json::from_value(value)?),
        EdgeKind::FkReferences => EdgeProperties::FkReferences(serde_json::from_value(value)?),
        EdgeKind::Indexes => EdgeProperties::Indexes(serde_json::from_value(value)?),
    })
}

fn json_document(graph: &KnowledgeGraph) -> ExportResult<JsonGraph> {
    let nodes = graph
        .nodes()
        .iter()
        .map(|node| {
            Ok(JsonNode {
                id: node.node_id.clone(),
                node_type: node.kind(),
                name: node.name.clone(),
                properties: node_properties_value(&node.properties)?,
                embedding: node.embedding.clone(),
            })
        })
        .collect::<ExportResult<Vec<_>>>()?;

    let edges = graph
        .edges()
        .iter()
        .map(|edge| {
            Ok(JsonEdge {
                source: edge.source.clone(),
                target: edge.target.clone(),
                edge_type: edge.kind(),
                properties: edge_properties_value(&edge.properties)?,
            })
        })
        .collect::<ExportResult<Vec<_>>>()?;

    Ok(JsonGraph { nodes, edges })
}

/// `{"nodes": [...], "edges": [...]}` in insertion and build order.
pub fn to_json(graph: &KnowledgeGraph) -> ExportResult<String> {
    Ok(serde_json::to_string_pretty(&json_document(graph)?)?)
}

/// Rebuild a graph from [`to_json`] output and re-run the default categorizer.
pub fn import_json(json: &str) -> ExportResult<KnowledgeGraph> {
    import_json_with(json, &Categorizer::new())
}

/// Rebuild a graph from [`to_json`] output with a specific categorizer.
pub fn import_json_with(json: &str, categorizer: &Categorizer) -> ExportResult<KnowledgeGraph> {
    let document: JsonGraph = serde_json::from_str(json)?;
    let mut graph = KnowledgeGraph::new();

    for node in document.nodes {
        graph.add_node(SchemaNode {
            node_id: node.id,
            name: node.name,
            properties: parse_node_properties(node.node_type, node.properties)?,
            embedding: node.embedding,
        })?;
    }

    for edge in document.edges {
        graph.add_edge(SchemaEdge::new(
            edge.source,
            edge.target,
            parse_edge_properties(edge.edge_type, edge.properties)?,
        ))?;
    }

    categorizer.apply(&mut graph);
    Ok(graph)
}

// ============================================================================
// GraphML
// ============================================================================

/// GraphML attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrType {
    Boolean,
    Long,
    Double,
    String,
}

impl AttrType {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(AttrType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(AttrType::Long),
            Value::Number(_) => Some(AttrType::Double),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(AttrType::String),
        }
    }

    /// Type able to hold values of both `self` and `other`.
    fn join(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (AttrType::Long, AttrType::Double) | (AttrType::Double, AttrType::Long) => AttrType::Double,
            _ => AttrType::String,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            AttrType::Boolean => "boolean",
            AttrType::Long => "long",
            AttrType::Double => "double",
            AttrType::String => "string",
        }
    }
}

fn collect_keys<'a>(objects: impl Iterator<Item = &'a Map<String, Value>>) -> BTreeMap<String, AttrType> {
    let mut keys: BTreeMap<String, AttrType> = BTreeMap::new();
    for object in objects {
        for (name, value) in object {
            let Some(ty) = AttrType::of(value) else {
                continue;
            };
            keys.entry(name.clone())
                .and_modify(|existing| *existing = existing.join(ty))
                .or_insert(ty);
        }
    }
    keys
}

/// Characters XML 1.0 cannot carry, even as character references.
fn is_xml_forbidden(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Escape markup characters. Forbidden characters are written as `\uXXXX`
/// text so the document stays well-formed.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_forbidden(c) => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn data_text(value: &Value) -> ExportResult<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other)?,
    })
}

fn write_data(out: &mut String, key: &str, text: &str) -> fmt::Result {
    writeln!(out, "      <data key=\"{}\">{}</data>", key, xml_escape(text))
}

fn write_properties(out: &mut String, prefix: &str, properties: &Value) -> ExportResult<()> {
    let Some(properties) = properties.as_object() else {
        return Ok(());
    };
    for (name, value) in properties {
        if value.is_null() {
            continue;
        }
        write_data(out, &format!("{}_{}", prefix, name), &data_text(value)?)?;
    }
    Ok(())
}

/// GraphML 1.0 document with one `<key>` per property name.
pub fn to_graphml(graph: &KnowledgeGraph) -> ExportResult<String> {
    let document = json_document(graph)?;
    let node_keys = collect_keys(document.nodes.iter().filter_map(|n| n.properties.as_object()));
    let edge_keys = collect_keys(document.edges.iter().filter_map(|e| e.properties.as_object()));

    let mut out = String::new();
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
        out,
        "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
         http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">"
    )?;

    writeln!(out, "  <key id=\"node_type\" for=\"node\" attr.name=\"node_type\" attr.type=\"string\"/>")?;
    writeln!(out, "  <key id=\"name\" for=\"node\" attr.name=\"name\" attr.type=\"string\"/>")?;
    for (name, ty) in &node_keys {
        writeln!(
            out,
            "  <key id=\"n_{0}\" for=\"node\" attr.name=\"{0}\" attr.type=\"{1}\"/>",
            xml_escape(name),
            ty.as_str()
        )?;
    }
    writeln!(out, "  <key id=\"edge_type\" for=\"edge\" attr.name=\"edge_type\" attr.type=\"string\"/>")?;
    for (name, ty) in &edge_keys {
        writeln!(
            out,
            "  <key id=\"e_{0}\" for=\"edge\" attr.name=\"{0}\" attr.type=\"{1}\"/>",
            xml_escape(name),
            ty.as_str()
        )?;
    }

    writeln!(out, "  <graph id=\"G\" edgedefault=\"directed\">")?;

    for node in &document.nodes {
        writeln!(out, "    <node id=\"{}\">", xml_escape(&node.id))?;
        write_data(&mut out, "node_type", node.node_type.as_str())?;
        write_data(&mut out, "name", &node.name)?;
        write_properties(&mut out, "n", &node.properties)?;
        writeln!(out, "    </node>")?;
    }

    for (i, edge) in document.edges.iter().enumerate() {
        writeln!(
            out,
            "    <edge id=\"e{}\" source=\"{}\" target=\"{}\">",
            i,
            xml_escape(&edge.source),
            xml_escape(&edge.target)
        )?;
        write_data(&mut out, "edge_type", edge.edge_type.as_str())?;
        write_properties(&mut out, "e", &edge.properties)?;
        writeln!(out, "    </edge>")?;
    }

    writeln!(out, "  </graph>")?;
    writeln!(out, "</graphml>")?;
    Ok(out)
}
