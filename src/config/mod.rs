//! Configuration module for schemagraph.
//!
//! Handles build tuning, query limits, categorization keywords and named
//! schema sources.

mod settings;

pub use settings::{
    expand_env_vars, BuildSettings, CategorySettings, QuerySettings, Settings, SettingsError,
    SourceSettings,
};
