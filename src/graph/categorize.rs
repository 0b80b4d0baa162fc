//! Table categorization.
//!
//! Tables are tagged with structural roles (LOOKUP, JUNCTION, TRANSACTION,
//! MASTER, AUDIT) by an ordered table of rules. Rules are evaluated
//! independently, so a table can hold several tags or none.
//!
//! Also home to the coded-column helpers used by the query engine to point
//! a column like `status_cd` at the lookup table that decodes it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{EdgeKind, SchemaNode};
use super::KnowledgeGraph;

/// Structural role of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Lookup,
    Junction,
    Transaction,
    Master,
    Audit,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lookup => "LOOKUP",
            Category::Junction => "JUNCTION",
            Category::Transaction => "TRANSACTION",
            Category::Master => "MASTER",
            Category::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Rules
// ============================================================================

/// What a rule looks at.
#[derive(Debug, Clone)]
enum RuleMatcher {
    /// Lower-cased table name contains a keyword, starts with a prefix or
    /// ends with a suffix.
    Name {
        contains: Vec<String>,
        prefixes: Vec<String>,
        suffixes: Vec<String>,
    },
    /// At least `min_references` outgoing REFERENCES edges, and no more than
    /// `max_extra_columns` columns beyond one per REFERENCES edge.
    Junction {
        min_references: usize,
        max_extra_columns: usize,
    },
}

/// A single categorization rule: a category and the predicate that assigns it.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: Category,
    matcher: RuleMatcher,
}

fn lowered(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl CategoryRule {
    /// Match when the lower-cased table name contains any keyword.
    pub fn keywords(category: Category, keywords: &[&str]) -> Self {
        Self::name(category, keywords, &[], &[])
    }

    /// Match on name keywords, prefixes and suffixes (case-insensitive).
    pub fn name(category: Category, contains: &[&str], prefixes: &[&str], suffixes: &[&str]) -> Self {
        Self {
            category,
            matcher: RuleMatcher::Name {
                contains: lowered(contains),
                prefixes: lowered(prefixes),
                suffixes: lowered(suffixes),
            },
        }
    }

    /// Match link tables by their shape rather than their name.
    pub fn junction(min_references: usize, max_extra_columns: usize) -> Self {
        Self {
            category: Category::Junction,
            matcher: RuleMatcher::Junction {
                min_references,
                max_extra_columns,
            },
        }
    }

    /// Evaluate the predicate against one TABLE node.
    pub fn matches(&self, graph: &KnowledgeGraph, table: &SchemaNode) -> bool {
        match &self.matcher {
            RuleMatcher::Name {
                contains,
                prefixes,
                suffixes,
            } => {
                let name = table.name.to_lowercase();
                contains.iter().any(|k| name.contains(k.as_str()))
                    || prefixes.iter().any(|p| name.starts_with(p.as_str()))
                    || suffixes.iter().any(|s| name.ends_with(s.as_str()))
            }
            RuleMatcher::Junction {
                min_references,
                max_extra_columns,
            } => {
                let mut references = 0;
                let mut columns = 0;
                for edge in graph.outgoing_edges(&table.node_id) {
                    match edge.kind() {
                        EdgeKind::References => references += 1,
                        EdgeKind::HasColumn => columns += 1,
                        _ => {}
                    }
                }
                references >= *min_references && columns <= references + max_extra_columns
            }
        }
    }
}

/// Name keywords that mark a lookup table.
pub const LOOKUP_KEYWORDS: &[&str] = &[
    "lookup", "lkp", "ref", "type", "status", "category", "code", "dwl_",
];

/// Enterprise lookup prefixes (Oracle Retail, SAP, Dynamics style).
pub const LOOKUP_PREFIXES: &[&str] = &["dwl_", "lkp_", "lookup_", "ref_", "code_", "lu_"];

pub const LOOKUP_SUFFIXES: &[&str] = &[
    "_lkp", "_lookup", "_ref", "_code", "_type", "_typ", "_ctgry", "_category",
];

pub const TRANSACTION_KEYWORDS: &[&str] = &[
    "transaction",
    "order",
    "payment",
    "invoice",
    "charge",
    "usage",
    "activity",
];

pub const MASTER_KEYWORDS: &[&str] = &[
    "customer",
    "product",
    "account",
    "user",
    "employee",
    "patient",
    "subscription",
];

pub const AUDIT_KEYWORDS: &[&str] = &["audit", "log", "history", "trail"];

/// The default rule table.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::name(Category::Lookup, LOOKUP_KEYWORDS, LOOKUP_PREFIXES, LOOKUP_SUFFIXES),
        CategoryRule::junction(2, 3),
        CategoryRule::keywords(Category::Transaction, TRANSACTION_KEYWORDS),
        CategoryRule::keywords(Category::Master, MASTER_KEYWORDS),
        CategoryRule::keywords(Category::Audit, AUDIT_KEYWORDS),
    ]
}

// ============================================================================
// Categorizer
// ============================================================================

/// Assigns category tags to every table of a graph.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Categorizer {
    /// Create a categorizer with the default rules.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Create a categorizer with custom rules.
    pub fn with_rules(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Append a keyword rule for a category (used for configured keywords).
    pub fn add_keywords(&mut self, category: Category, keywords: &[String]) {
        if keywords.is_empty() {
            return;
        }
        let words: Vec<&str> = keywords.iter().map(String::as_str).collect();
        self.rules.push(CategoryRule::keywords(category, &words));
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Compute the tags of every table. Tables with no tag are omitted.
    pub fn categorize(&self, graph: &KnowledgeGraph) -> BTreeMap<String, BTreeSet<Category>> {
        let mut result = BTreeMap::new();

        for table in graph.nodes().iter().filter(|n| n.is_table()) {
            let tags: BTreeSet<Category> = self
                .rules
                .iter()
                .filter(|rule| rule.matches(graph, table))
                .map(|rule| rule.category)
                .collect();

            if !tags.is_empty() {
                result.insert(table.name.clone(), tags);
            }
        }

        result
    }

    /// Categorize and store the result on the graph.
    pub fn apply(&self, graph: &mut KnowledgeGraph) {
        let categories = self.categorize(graph);
        graph.set_categories(categories);
    }
}

// ============================================================================
// Coded columns
// ============================================================================

/// Name fragments that mark a coded column.
pub const CODE_COLUMN_PATTERNS: &[&str] = &[
    "_cd", "_code", "_typ", "_type", "_stat", "_status", "_ctgry", "_category", "_class", "_flag",
];

/// Short names used as codes on their own.
pub const CODE_COLUMN_NAMES: &[&str] = &["s", "st", "ty", "cd"];

/// Suffixes stripped from a coded column to find the concept it encodes.
const CODE_SUFFIXES: &[&str] = &["_code", "_type", "_cd", "_typ"];

/// Does this column hold a code that a lookup table decodes?
pub fn is_code_column(column: &str) -> bool {
    let name = column.to_lowercase();
    CODE_COLUMN_PATTERNS.iter().any(|p| name.contains(p)) || CODE_COLUMN_NAMES.contains(&name.as_str())
}

/// The concept a coded column encodes: `status_cd` → `status`.
pub fn code_column_base(column: &str) -> String {
    let name = column.to_lowercase();
    CODE_SUFFIXES
        .iter()
        .find_map(|s| name.strip_suffix(s).filter(|base| !base.is_empty()))
        .map(str::to_string)
        .unwrap_or(name)
}

/// Candidate lookup table names for a coded column, most likely first.
pub fn lookup_table_candidates(column: &str) -> Vec<String> {
    let base = code_column_base(column);
    vec![
        format!("dwl_{}", base),
        format!("lkp_{}", base),
        format!("{}_lkp", base),
        format!("{}_lookup", base),
        format!("lookup_{}", base),
    ]
}
