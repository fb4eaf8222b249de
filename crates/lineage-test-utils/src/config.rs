//! Configuration builders and temporary config files.

use std::path::{Path, PathBuf};

use lineage_config::{AppConfig, AttributeConfig};
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .root_name("app")
///     .attribute("Settings", "locale", |a| a.inherit = true)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn root_name(mut self, name: &str) -> Self {
        self.config.hierarchy.root_name = name.to_string();
        self
    }

    /// Add a public, non-inheriting attribute without a default, then let
    /// `customize` adjust it.
    pub fn attribute(
        mut self,
        owner: &str,
        name: &str,
        customize: impl FnOnce(&mut AttributeConfig),
    ) -> Self {
        let mut attr = AttributeConfig {
            owner: owner.to_string(),
            name: name.to_string(),
            inherit: false,
            visibility: "public".to_string(),
            accessors: "both".to_string(),
            default: None,
            description: String::new(),
        };
        customize(&mut attr);
        self.config.attributes.push(attr);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TOML config file in a temporary directory, removed on drop.
pub struct TestConfigFile {
    path: PathBuf,
    _dir: TempDir,
}

impl TestConfigFile {
    /// Write `toml` to `lineage.toml` in a fresh temporary directory.
    pub async fn with_toml(toml: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("lineage.toml");
        tokio::fs::write(&path, toml)
            .await
            .expect("failed to write test config");
        Self { path, _dir: dir }
    }

    /// Serialize `config` into a temporary file.
    pub async fn from_config(config: &AppConfig) -> Self {
        let toml = toml_string(config);
        Self::with_toml(&toml).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the file through [`AppConfig::load`].
    pub async fn load(&self) -> AppConfig {
        AppConfig::load(&self.path)
            .await
            .expect("failed to load test config")
    }
}

fn toml_string(config: &AppConfig) -> String {
    toml::to_string_pretty(config).expect("config serializes to TOML")
}
