//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TqhError};

/// Full TQH configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
    pub paths: PathsConfig,
}

/// Sampling loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Seconds between samples.
    pub interval_seconds: u64,
    /// Override the reported hostname (defaults to the OS host name).
    pub hostname_override: Option<String>,
    /// Delay before the single retry after a busy store, in milliseconds.
    pub busy_retry_ms: u64,
}

/// Local LLM endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible endpoint.
    pub base_url: String,
    /// Model name to request.
    pub model: String,
    /// Per-call timeout in seconds. A timed-out call is a recoverable failure.
    pub timeout_seconds: u64,
}

/// Query pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    /// Hard cap on rows collected from a single query.
    pub max_result_rows: usize,
    /// Rows included verbatim in the summarization prompt.
    pub prompt_row_limit: usize,
    /// Delay before the single retry after a busy store, in milliseconds.
    pub busy_retry_ms: u64,
}

/// Filesystem paths used by tqh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub db_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            hostname_override: None,
            busy_retry_ms: 250,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama2:7b".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_result_rows: 10_000,
            prompt_row_limit: 20,
            busy_retry_ms: 100,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[TQH-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("tqh").join("config.toml");
        let data = home_dir.join(".local").join("share").join("tqh");
        Self {
            config_file: cfg,
            db_file: data.join("telemetry.sqlite3"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TqhError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TqhError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|error| TqhError::Serialization {
            context: "toml",
            details: error.to_string(),
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // collector
        set_env_u64(
            "TQH_COLLECTOR_INTERVAL_SECONDS",
            &mut self.collector.interval_seconds,
        )?;
        if let Some(raw) = env_var("TQH_COLLECTOR_HOSTNAME") {
            self.collector.hostname_override = Some(raw);
        }
        set_env_u64(
            "TQH_COLLECTOR_BUSY_RETRY_MS",
            &mut self.collector.busy_retry_ms,
        )?;

        // llm — TQH_LLM_BASE_URL wins, then the conventional OLLAMA_BASE_URL.
        if let Some(raw) = env_var("TQH_LLM_BASE_URL") {
            self.llm.base_url = raw;
        } else if let Some(raw) = env_var("OLLAMA_BASE_URL") {
            self.llm.base_url = raw;
        }
        if let Some(raw) = env_var("TQH_LLM_MODEL") {
            self.llm.model = raw;
        }
        set_env_u64("TQH_LLM_TIMEOUT_SECONDS", &mut self.llm.timeout_seconds)?;

        // query
        set_env_usize("TQH_QUERY_MAX_RESULT_ROWS", &mut self.query.max_result_rows)?;
        set_env_usize(
            "TQH_QUERY_PROMPT_ROW_LIMIT",
            &mut self.query.prompt_row_limit,
        )?;
        set_env_u64("TQH_QUERY_BUSY_RETRY_MS", &mut self.query.busy_retry_ms)?;

        // paths
        if let Some(raw) = env_var("TQH_DB_FILE") {
            self.paths.db_file = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("TQH_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.collector.interval_seconds == 0 {
            return Err(TqhError::InvalidConfig {
                details: "collector.interval_seconds must be >= 1".to_string(),
            });
        }
        if let Some(host) = &self.collector.hostname_override
            && host.trim().is_empty()
        {
            return Err(TqhError::InvalidConfig {
                details: "collector.hostname_override must be non-empty when set".to_string(),
            });
        }

        if self.llm.base_url.trim().is_empty() {
            return Err(TqhError::InvalidConfig {
                details: "llm.base_url must be non-empty".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(TqhError::InvalidConfig {
                details: "llm.model must be non-empty".to_string(),
            });
        }
        if self.llm.timeout_seconds == 0 {
            return Err(TqhError::InvalidConfig {
                details: "llm.timeout_seconds must be >= 1".to_string(),
            });
        }

        if self.query.max_result_rows == 0 {
            return Err(TqhError::InvalidConfig {
                details: "query.max_result_rows must be >= 1".to_string(),
            });
        }
        if self.query.prompt_row_limit == 0 {
            return Err(TqhError::InvalidConfig {
                details: "query.prompt_row_limit must be >= 1".to_string(),
            });
        }
        if self.query.prompt_row_limit > self.query.max_result_rows {
            return Err(TqhError::InvalidConfig {
                details: format!(
                    "query.prompt_row_limit ({}) must be <= query.max_result_rows ({})",
                    self.query.prompt_row_limit, self.query.max_result_rows
                ),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| TqhError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<usize>().map_err(|error| TqhError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}
