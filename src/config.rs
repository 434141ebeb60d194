//! TOML-based configuration.
//!
//! All of the engine's textual knobs live here, with defaults matching the
//! monitoring system this tool was built against. A config file is optional;
//! every field may be omitted.
//!
//! Example configuration:
//! ```toml
//! [rewrite]
//! separator = "--NEXT_QUERY"
//! lookup_function = "json_build_array"
//! lookup_marker = "get-indicator-value"
//! alias_prefix = "ind"
//! reference_prefix = "i"
//!
//! [inline]
//! year_function = "monitoring.indicator_value_on_year"
//! period_function = "monitoring.indicator_value_on_period"
//!
//! [schema]
//! measure_table = "monitoring.measure"
//! indicator_table = "monitoring.indicator"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Query-rewriter knobs.
    pub rewrite: RewriteSettings,

    /// Direct-inliner knobs.
    pub inline: InlineSettings,

    /// Table names used in generated blocks.
    pub schema: SchemaSettings,
}

/// Knobs for the formula-expanding query rewriter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteSettings {
    /// Token separating query units in the SQL document.
    pub separator: String,

    /// Function head of a lookup call site.
    pub lookup_function: String,

    /// First-argument literal identifying a lookup call.
    pub lookup_marker: String,

    /// Alias prefix for materialized indicator values (`AS ind<code>`).
    pub alias_prefix: String,

    /// Reference prefix inside formulas (`i<code>`).
    pub reference_prefix: String,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            separator: "--NEXT_QUERY".to_string(),
            lookup_function: "json_build_array".to_string(),
            lookup_marker: "get-indicator-value".to_string(),
            alias_prefix: "ind".to_string(),
            reference_prefix: "i".to_string(),
        }
    }
}

/// Knobs for the direct (no-expansion) inliner.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InlineSettings {
    /// Lookup-by-year function replaced in place.
    pub year_function: String,

    /// Lookup-by-period function replaced in place.
    pub period_function: String,
}

impl Default for InlineSettings {
    fn default() -> Self {
        Self {
            year_function: "monitoring.indicator_value_on_year".to_string(),
            period_function: "monitoring.indicator_value_on_period".to_string(),
        }
    }
}

/// Schema-qualified table names referenced by generated blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Stored-measurement table.
    pub measure_table: String,

    /// Indicator dictionary table.
    pub indicator_table: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            measure_table: "monitoring.measure".to_string(),
            indicator_table: "monitoring.indicator".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}
