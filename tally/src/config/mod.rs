//! Configuration management for tally
//!
//! Default config location: ~/.tally/config.toml

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Buckets returned by a terms aggregation without an explicit size
    #[serde(default = "default_terms_size")]
    pub default_terms_size: usize,
    /// Collect shards on the rayon pool instead of one after another
    #[serde(default = "default_true")]
    pub parallel_shards: bool,
    /// Upper bound on term buckets created in a single shard pass
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
}

fn default_terms_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_buckets() -> usize {
    65_535
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_terms_size: default_terms_size(),
            parallel_shards: true,
            max_buckets: default_max_buckets(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Default config path (~/.tally/config.toml)
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".tally").join("config.toml"))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_or_default(&default_config_path()?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file path, or fall back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let path = expand_tilde(path)?;
        let path = path.as_path();
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            Self::from_toml_str(&content).with_context(|| format!("Invalid config {:?}", path))
        } else {
            tracing::debug!(?path, "config not found, using defaults");
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.default_terms_size == 0 {
            return Err(anyhow!("engine.default_terms_size must be greater than 0"));
        }
        if self.engine.max_buckets == 0 {
            return Err(anyhow!("engine.max_buckets must be greater than 0"));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(anyhow!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                other
            )),
        }
    }
}
