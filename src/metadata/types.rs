//! Metadata types returned by a schema source.
//!
//! These are engine-neutral representations of what an inspector reports
//! for a single table.

use serde::{Deserialize, Serialize};

/// Name used when the source does not report a constraint or index name.
pub const UNNAMED: &str = "unnamed";

fn default_true() -> bool {
    true
}

/// Information about a table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Database-specific type name, as reported by the source.
    pub data_type: String,
    /// Whether NULL values are allowed.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default value expression.
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnInfo {
    /// Create a column with no default value.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
        }
    }

    /// Set the default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Foreign key constraint information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name, if the engine reports one.
    #[serde(default)]
    pub name: Option<String>,
    /// Columns in the owning table (ordered).
    pub constrained_columns: Vec<String>,
    /// Name of the referenced table.
    pub referred_table: String,
    /// Columns in the referenced table (ordered).
    pub referred_columns: Vec<String>,
}

impl ForeignKeyInfo {
    /// Create a foreign key from column lists.
    pub fn new<C, R>(
        name: Option<&str>,
        constrained_columns: C,
        referred_table: impl Into<String>,
        referred_columns: R,
    ) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            name: name.map(str::to_string),
            constrained_columns: constrained_columns.into_iter().map(Into::into).collect(),
            referred_table: referred_table.into(),
            referred_columns: referred_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Constraint name, or `"unnamed"`.
    pub fn constraint_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    /// Pairs of (constrained, referred) columns.
    ///
    /// Lists of different lengths are zipped to the shorter one.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.constrained_columns
            .iter()
            .zip(self.referred_columns.iter())
            .map(|(c, r)| (c.as_str(), r.as_str()))
    }
}

/// Index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name, if the engine reports one.
    #[serde(default)]
    pub name: Option<String>,
    /// Indexed columns (ordered).
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl IndexInfo {
    /// Create a named index.
    pub fn new<C>(name: impl Into<String>, columns: C, unique: bool) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            name: Some(name.into()),
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        }
    }

    /// Index name, or `"unnamed"`.
    pub fn index_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }
}
