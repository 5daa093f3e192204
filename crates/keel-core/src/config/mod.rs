//! # Keel Session Configuration
//!
//! [`SessionConfig`] is the declarative side of a bootstrap session: which
//! exclusivity identity to hold, which plugins to skip, how startup failures
//! are treated and per-component metadata overrides. It can be read from
//! JSON, YAML (`yaml-config` feature) or TOML (`toml-config` feature).
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while reading config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for path: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Deserialization from '{format}' failed: {source}")]
    Deserialization {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Serialization to '{format}' failed: {source}")]
    Serialization {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// What a failed awaited startup does to `BootstrapSession::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupFailurePolicy {
    /// Collect failures for the whole phase, then fail `run`.
    #[default]
    Aggregate,
    /// Log failures and let the session reach `Running` anyway.
    LogAndContinue,
}

/// Metadata fields that configuration may override for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOverride {
    pub order: Option<i32>,
    pub await_start: Option<bool>,
    pub shutdown_order: Option<i32>,
    /// Extra dependencies, added to the ones the export declares.
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Exclusivity identity. When set, only one session per identity may be initialized.
    pub identity: Option<String>,
    /// Where lock files live. Defaults to the OS temp directory.
    pub lock_dir: Option<PathBuf>,
    pub startup_failure_policy: StartupFailurePolicy,
    /// Plugins that are known but must not register anything.
    pub disabled_plugins: Vec<String>,
    /// Per-component metadata overrides, keyed by component name.
    pub components: HashMap<String, MetadataOverride>,
    /// Log filter directive used by the logging plugin, e.g. "info" or "keel_core=debug".
    pub log_level: Option<String>,
}

impl SessionConfig {
    /// Load a configuration file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format)
    }

    /// Parse configuration text in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                ConfigError::Deserialization { format: "json", source: Box::new(e) }
            }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                ConfigError::Deserialization { format: "yaml", source: Box::new(e) }
            }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                ConfigError::Deserialization { format: "toml", source: Box::new(e) }
            }),
        }
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| {
                ConfigError::Serialization { format: "json", source: Box::new(e) }
            }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| {
                ConfigError::Serialization { format: "yaml", source: Box::new(e) }
            }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| {
                ConfigError::Serialization { format: "toml", source: Box::new(e) }
            }),
        }
    }

    /// Whether a plugin has been disabled by configuration.
    pub fn is_plugin_disabled(&self, name: &str) -> bool {
        self.disabled_plugins.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests;
