//! Configuration loading and the profile store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use studytrack_core::engine::EngineConfig;
use studytrack_core::memory::MemoryStore;
use studytrack_core::traits::ProfileStore;

use crate::document::{DocumentStore, RetryPolicy};
use crate::file::FileBackend;

/// Which profile store to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Volatile in-process store; state is lost on exit.
    Memory,
    /// One JSON document per student under `path`.
    Document {
        #[serde(default = "default_data_dir")]
        path: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Document {
            path: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "./studytrack-data".to_string()
}

/// Commit retry settings for the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after a conflicting commit before giving up.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubles on each retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_retries() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Top-level studytrack configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudytrackConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `studytrack.toml` in the current directory
/// 2. `~/.config/studytrack/config.toml`
///
/// Environment variable overrides: `STUDYTRACK_BACKEND`, `STUDYTRACK_DATA_DIR`.
pub fn load_config() -> Result<StudytrackConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<StudytrackConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("studytrack.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<StudytrackConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => StudytrackConfig::default(),
    };

    apply_env_overrides(&mut config)?;

    if let BackendConfig::Document { path } = &mut config.backend {
        *path = resolve_env_vars(path);
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut StudytrackConfig) -> Result<()> {
    if let Ok(kind) = std::env::var("STUDYTRACK_BACKEND") {
        config.backend = match kind.trim().to_lowercase().as_str() {
            "memory" => BackendConfig::Memory,
            "document" => match &config.backend {
                BackendConfig::Document { path } => BackendConfig::Document { path: path.clone() },
                BackendConfig::Memory => BackendConfig::default(),
            },
            other => anyhow::bail!("STUDYTRACK_BACKEND must be 'memory' or 'document', got '{other}'"),
        };
    }

    if let Ok(dir) = std::env::var("STUDYTRACK_DATA_DIR") {
        if let BackendConfig::Document { path } = &mut config.backend {
            *path = dir;
        }
    }

    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("studytrack"))
}

/// Create a profile store from configuration.
pub fn create_store(config: &StudytrackConfig) -> Result<Arc<dyn ProfileStore>> {
    match &config.backend {
        BackendConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        BackendConfig::Document { path } => {
            let backend = FileBackend::open(path)
                .with_context(|| format!("failed to open document store at {path}"))?;
            let retry = RetryPolicy::from(&config.retry);
            Ok(Arc::new(DocumentStore::new(backend, retry)))
        }
    }
}

/// Create the configured store, falling back to the volatile store if the
/// configured backend cannot be opened.
///
/// Intended to be called once at startup.
pub fn create_store_with_fallback(config: &StudytrackConfig) -> Arc<dyn ProfileStore> {
    match create_store(config) {
        Ok(store) => {
            tracing::info!("using '{}' profile store", store.name());
            store
        }
        Err(e) => {
            tracing::warn!("{e:#}; falling back to in-memory profile store (state will not persist)");
            Arc::new(MemoryStore::new())
        }
    }
}
