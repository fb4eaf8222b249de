#![deny(unsafe_code)]

//! Configuration loading and validation for lineage.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure: logging, the root of the context
//! hierarchy, and attribute declarations that a registry can install at
//! startup without generated code.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Visibility flags accepted by attribute declarations.
pub const VISIBILITIES: [&str; 4] = ["public", "private", "reader", "writer"];

/// Accessor sets accepted by attribute declarations.
pub const ACCESSORS: [&str; 3] = ["both", "reader", "writer"];

/// Log levels accepted by `[logging] level`.
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Context hierarchy configuration.
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Attribute declarations installed into a registry at startup.
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Context hierarchy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Display name of the root heavyweight context. Threads that existed
    /// before the tracker was created are parented to it.
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_name: default_root_name(),
        }
    }
}

fn default_root_name() -> String {
    "main".to_string()
}

/// A single attribute declaration.
///
/// ## TOML Example
///
/// ```toml
/// [[attributes]]
/// owner = "Settings"
/// name = "locale"
/// inherit = true
/// visibility = "public"
/// accessors = "both"
/// default = "en"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Owner the attribute belongs to (usually a type name). Must not
    /// contain `.`.
    pub owner: String,

    /// Attribute name, unique per owner. Must not contain `.`.
    pub name: String,

    /// Whether reads fall back to ancestor contexts.
    #[serde(default)]
    pub inherit: bool,

    /// Accessor visibility: "public", "private", "reader" or "writer".
    #[serde(default = "default_visibility")]
    pub visibility: String,

    /// Installed accessors: "both", "reader" (read-only) or "writer"
    /// (write-only).
    #[serde(default = "default_accessors")]
    pub accessors: String,

    /// String default used when the (possibly inherited) lookup finds nothing.
    #[serde(default)]
    pub default: Option<String>,

    /// Optional description for operator reference.
    #[serde(default)]
    pub description: String,
}

fn default_visibility() -> String {
    "public".to_string()
}

fn default_accessors() -> String {
    "both".to_string()
}

impl AttributeConfig {
    /// The `owner.name` key this declaration resolves under.
    pub fn key(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            attributes = config.attributes.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.logging.level
            )));
        }
        if self.hierarchy.root_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "hierarchy.root_name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.owner.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "attributes[{i}].owner must not be empty"
                )));
            }
            if attr.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "attributes[{i}].name must not be empty"
                )));
            }
            for (field, value) in [("owner", &attr.owner), ("name", &attr.name)] {
                if value.contains('.') {
                    return Err(ConfigError::Validation(format!(
                        "attributes[{i}].{field} must not contain '.', got {value:?}"
                    )));
                }
            }
            if !VISIBILITIES.contains(&attr.visibility.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "attributes[{i}].visibility must be one of {:?}, got {:?}",
                    VISIBILITIES, attr.visibility
                )));
            }
            if !ACCESSORS.contains(&attr.accessors.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "attributes[{i}].accessors must be one of {:?}, got {:?}",
                    ACCESSORS, attr.accessors
                )));
            }
            if !seen.insert(attr.key()) {
                return Err(ConfigError::Validation(format!(
                    "attributes[{i}] redeclares {:?}",
                    attr.key()
                )));
            }
        }

        Ok(())
    }

    /// Declarations belonging to one owner, in file order.
    pub fn attributes_for<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a AttributeConfig> {
        self.attributes.iter().filter(move |a| a.owner == owner)
    }
}
