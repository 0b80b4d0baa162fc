//! TOML-based configuration for schemagraph.
//!
//! Supports a config file (schemagraph.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [build]
//! max_concurrency = 8
//! collect_row_counts = true
//! row_count_timeout_ms = 5000
//! build_timeout_secs = 300
//!
//! [query]
//! default_depth = 2
//! max_depth = 5
//!
//! [categories]
//! lookup = ["xref"]
//! transaction = ["shipment"]
//!
//! [sources.warehouse]
//! snapshot = "${DATA_DIR}/warehouse.json"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::graph::{BuildConfig, Categorizer, Category};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Graph build configuration.
    pub build: BuildSettings,

    /// Query defaults and limits.
    pub query: QuerySettings,

    /// Extra categorization keywords.
    pub categories: CategorySettings,

    /// Named schema sources.
    pub sources: HashMap<String, SourceSettings>,
}

/// Graph build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Maximum number of tables fetched concurrently.
    pub max_concurrency: usize,

    /// Ask the source for row counts.
    pub collect_row_counts: bool,

    /// Timeout for a single row count, in milliseconds.
    pub row_count_timeout_ms: u64,

    /// Timeout for a whole build, in seconds (unbounded when unset).
    pub build_timeout_secs: Option<u64>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            collect_row_counts: true,
            row_count_timeout_ms: 5000,
            build_timeout_secs: None,
        }
    }
}

impl BuildSettings {
    /// Builder configuration derived from these settings.
    pub fn to_build_config(&self) -> BuildConfig {
        BuildConfig {
            max_concurrency: self.max_concurrency,
            collect_row_counts: self.collect_row_counts,
            row_count_timeout: Duration::from_millis(self.row_count_timeout_ms),
        }
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }
}

/// Query defaults and limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Context depth used when the caller does not pass one.
    pub default_depth: usize,

    /// Largest depth a caller may request.
    pub max_depth: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_depth: 2,
            max_depth: 5,
        }
    }
}

impl QuerySettings {
    /// Resolve a requested depth into `1..=max_depth`.
    pub fn clamp_depth(&self, depth: Option<usize>) -> usize {
        depth
            .unwrap_or(self.default_depth)
            .clamp(1, self.max_depth.max(1))
    }
}

/// Extra name keywords per category, added on top of the built-in rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CategorySettings {
    pub lookup: Vec<String>,
    pub transaction: Vec<String>,
    pub master: Vec<String>,
    pub audit: Vec<String>,
}

impl CategorySettings {
    /// The default categorizer extended with the configured keywords.
    pub fn categorizer(&self) -> Categorizer {
        let mut categorizer = Categorizer::new();
        categorizer.add_keywords(Category::Lookup, &self.lookup);
        categorizer.add_keywords(Category::Transaction, &self.transaction);
        categorizer.add_keywords(Category::Master, &self.master);
        categorizer.add_keywords(Category::Audit, &self.audit);
        categorizer
    }
}

/// A named schema source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceSettings {
    /// Path to a JSON schema snapshot (supports ${ENV_VAR} expansion).
    pub snapshot: String,
}

impl SourceSettings {
    /// Get the snapshot path with environment variables expanded.
    pub fn resolved_snapshot_path(&self) -> Result<PathBuf, SettingsError> {
        expand_env_vars(&self.snapshot).map(PathBuf::from)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SCHEMAGRAPH_CONFIG`
    /// 2. `./schemagraph.toml`
    /// 3. `~/.config/schemagraph/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SCHEMAGRAPH_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("schemagraph.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("schemagraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check value ranges that TOML types alone cannot express.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.build.max_concurrency == 0 {
            return Err(SettingsError::InvalidConfig(
                "build.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.query.max_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_depth must be at least 1".to_string(),
            ));
        }
        if self.query.default_depth > self.query.max_depth {
            return Err(SettingsError::InvalidConfig(format!(
                "query.default_depth ({}) exceeds query.max_depth ({})",
                self.query.default_depth, self.query.max_depth
            )));
        }
        Ok(())
    }

    /// Get a source by name.
    pub fn get_source(&self, name: &str) -> Result<&SourceSettings, SettingsError> {
        self.sources
            .get(name)
            .ok_or_else(|| SettingsError::SourceNotFound(name.to_string()))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            chars.next(); // consume '}'
            name
        } else {
            // $VAR ends at the first non-alphanumeric, non-underscore char
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
