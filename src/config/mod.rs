//! Configuration management for brainstem
//!
//! Handles loading and validating configuration from TOML files.
//! Every field has a default, so a missing config file is not an error.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::meta::DocType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound FTS5 accepts for a snippet width
const MAX_SNIPPET_TOKENS: usize = 64;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// File classification tables
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Indexing configuration
    #[serde(default)]
    pub index: IndexConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file name inside the brain root
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// External schema script; the built-in schema is used when unset
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// How long a writer waits on a locked database
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

/// File classification tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Files directly under the root, by exact name
    #[serde(default = "default_root_files")]
    pub root_files: BTreeMap<String, DocType>,

    /// Directories whose markdown files all share one type
    #[serde(default = "default_dir_prefixes")]
    pub dir_prefixes: BTreeMap<String, DocType>,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum hits returned by `timeline`
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: usize,

    /// Snippet width in tokens (1-64)
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: usize,

    /// Entities listed under "most connected" in `stats`
    #[serde(default = "default_top_connected")]
    pub top_connected: usize,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Show a progress bar while indexing
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            schema_path: None,
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            root_files: default_root_files(),
            dir_prefixes: default_dir_prefixes(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeline_limit: default_timeline_limit(),
            snippet_tokens: default_snippet_tokens(),
            top_connected: default_top_connected(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            show_progress: default_show_progress(),
        }
    }
}

impl Config {
    /// Get the default base directory for brainstem (~/.config/brainstem)
    pub fn default_base_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("brainstem")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file, else the default file if present, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let default_path = Self::default_config_path();
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Location of the store for a given brain root
    pub fn db_path(&self, root: &Path) -> PathBuf {
        root.join(&self.store.db_name)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.db_name.trim().is_empty() {
            return Err(Error::Config("store.db_name must not be empty".to_string()));
        }

        if self.query.timeline_limit == 0 {
            return Err(Error::Config(
                "query.timeline_limit must be positive".to_string(),
            ));
        }

        if self.query.snippet_tokens == 0 || self.query.snippet_tokens > MAX_SNIPPET_TOKENS {
            return Err(Error::Config(format!(
                "query.snippet_tokens must be between 1 and {}",
                MAX_SNIPPET_TOKENS
            )));
        }

        if self.query.top_connected == 0 {
            return Err(Error::Config(
                "query.top_connected must be positive".to_string(),
            ));
        }

        if let Some(name) = self.classify.root_files.keys().find(|n| n.contains('/')) {
            return Err(Error::Config(format!(
                "classify.root_files entry '{}' must be a bare file name",
                name
            )));
        }

        if self
            .classify
            .dir_prefixes
            .keys()
            .any(|p| p.trim_matches('/').is_empty())
        {
            return Err(Error::Config(
                "classify.dir_prefixes entries must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.db_name, ".brain.db");
        assert_eq!(config.query.timeline_limit, 20);
        assert_eq!(
            config.classify.dir_prefixes.get("archive/meetings"),
            Some(&DocType::Meeting)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.query.timeline_limit = 5;
        config
            .classify
            .root_files
            .insert("inbox.md".to_string(), DocType::Handoff);

        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.query.timeline_limit, 5);
        assert_eq!(loaded.classify.root_files.get("inbox.md"), Some(&DocType::Handoff));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[query]\nsnippet_tokens = 16\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.query.snippet_tokens, 16);
        assert_eq!(loaded.query.top_connected, 10);
        assert_eq!(loaded.classify.root_files.len(), 5);
    }

    #[test]
    fn test_unknown_doc_type_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[classify.dir_prefixes]\nprojects = \"project\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load_or_default(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.query.snippet_tokens = 65;
        assert!(config.validate().is_err());
        config.query.snippet_tokens = 40;

        config.query.timeline_limit = 0;
        assert!(config.validate().is_err());
        config.query.timeline_limit = 20;

        config
            .classify
            .root_files
            .insert("threads/x.md".to_string(), DocType::Thread);
        assert!(config.validate().is_err());
    }
}
