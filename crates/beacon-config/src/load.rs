//! Config loading: read, parse, apply environment overrides, validate.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::resolve::{resolve_config_path_with, ConfigSource};
use crate::settings::{AgentConfig, BufferBackend};
use crate::validate::{validate_config, ValidationError};
use crate::CONFIG_SCHEMA_VERSION;

/// Errors from config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

/// Environment variables that override file values.
pub const ENV_OVERRIDES: &[&str] = &[
    "BEACON_ENABLED",
    "BEACON_ENDPOINT",
    "BEACON_API_KEY",
    "BEACON_SIGNING_SECRET",
    "BEACON_BUFFER",
    "BEACON_ENVIRONMENT",
    "BEACON_RELEASE",
    "BEACON_JOURNAL_DIR",
];

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,

    /// Skip `BEACON_*` value overrides.
    pub ignore_env: bool,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AgentConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
    /// SHA-256 hash of the file content (None if using defaults).
    pub hash: Option<String>,
    /// Names of environment variables that changed a value.
    pub env_overrides: Vec<String>,
}

impl ResolvedConfig {
    /// Create a snapshot for diagnostics and `beacon status`.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let cfg = &self.config;
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: cfg.schema_version.clone(),
            path: self.path.clone(),
            source: self.source.as_str().to_string(),
            hash: self.hash.clone(),
            env_overrides: self.env_overrides.clone(),
            enabled: cfg.enabled,
            delivery_configured: cfg.is_delivery_configured(),
            backend: cfg.buffer.backend,
            journal_dir: cfg.buffer.journal.journal_dir(),
            compression: cfg.delivery.compression,
            signing: cfg.delivery.signing.enabled,
            default_rate: cfg.sampling.default_rate,
        }
    }
}

/// Config snapshot for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub timestamp: DateTime<Utc>,
    pub schema_version: String,
    pub path: Option<PathBuf>,
    pub source: String,
    pub hash: Option<String>,
    pub env_overrides: Vec<String>,
    pub enabled: bool,
    pub delivery_configured: bool,
    pub backend: BufferBackend,
    pub journal_dir: PathBuf,
    pub compression: bool,
    pub signing: bool,
    pub default_rate: f64,
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// Load configuration with an injectable environment lookup.
pub fn load_config_with(
    options: &ConfigOptions,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = resolve_config_path_with(
        options.config_path.as_deref(),
        &env,
        dirs::config_dir(),
        Path::new("/etc").join(crate::settings::APP_NAME),
    );

    let (mut config, hash) = match &path {
        Some(path) => {
            let (config, hash) = load_config_file(path)?;
            (config, Some(hash))
        }
        None => (AgentConfig::default(), None),
    };

    let env_overrides = if options.ignore_env {
        Vec::new()
    } else {
        apply_env_overrides(&mut config, &env)?
    };

    validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path,
        source,
        hash,
        env_overrides,
    })
}

/// Read and parse one config file. Returns the config and its content hash.
pub fn load_config_file(path: &Path) -> Result<(AgentConfig, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let hash = compute_hash(&content);

    let config: AgentConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version,
        });
    }

    Ok((config, hash))
}

/// Apply `BEACON_*` overrides. Returns the names of variables that were applied.
pub fn apply_env_overrides(
    config: &mut AgentConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Vec<String>, ConfigError> {
    let mut applied = Vec::new();

    for &var in ENV_OVERRIDES {
        let Some(value) = env(var) else {
            continue;
        };
        match var {
            "BEACON_ENABLED" => {
                config.enabled = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    var: var.to_string(),
                    value: value.clone(),
                })?;
            }
            "BEACON_ENDPOINT" => config.endpoint = non_empty(value),
            "BEACON_API_KEY" => config.api_key = non_empty(value),
            "BEACON_SIGNING_SECRET" => {
                config.delivery.signing.secret = non_empty(value);
                config.delivery.signing.enabled = config.delivery.signing.secret.is_some();
            }
            "BEACON_BUFFER" => {
                config.buffer.backend =
                    value.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: var.to_string(),
                        value: value.clone(),
                    })?;
            }
            "BEACON_ENVIRONMENT" => config.environment = non_empty(value),
            "BEACON_RELEASE" => config.release = non_empty(value),
            "BEACON_JOURNAL_DIR" => config.buffer.journal.dir = non_empty(value).map(PathBuf::from),
            _ => continue,
        }
        applied.push(var.to_string());
    }

    Ok(applied)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
