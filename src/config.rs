use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntakeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub upload_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    /// Number of nearest neighbors kept per probe.
    pub top_k: usize,
    /// Distance threshold below which the nearest neighbor counts as a duplicate.
    pub default_threshold: f64,
    /// Time budget for the embed-and-search step, in seconds.
    pub timeout_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8350,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_intake_dir()
            .join("submissions.db")
            .to_string_lossy()
            .into_owned();
        let upload_dir = default_intake_dir()
            .join("uploads")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            upload_dir,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_intake_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "buffalo-l-r50".into(),
            cache_dir,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            default_threshold: 0.40,
            timeout_secs: 10,
        }
    }
}

/// Returns `~/.intake/`
pub fn default_intake_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".intake")
}

/// Returns the default config file path: `~/.intake/config.toml`
pub fn default_config_path() -> PathBuf {
    default_intake_dir().join("config.toml")
}

impl IntakeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            IntakeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (INTAKE_DB, INTAKE_UPLOADS, INTAKE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("INTAKE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("INTAKE_UPLOADS") {
            self.storage.upload_dir = val;
        }
        if let Ok(val) = std::env::var("INTAKE_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the upload directory, expanding `~` if needed.
    pub fn resolved_upload_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.upload_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
