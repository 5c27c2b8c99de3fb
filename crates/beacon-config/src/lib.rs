//! Beacon configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `beacon.json`
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Environment variable overrides for deploy-time secrets
//! - Semantic validation with stable error codes
//! - Config snapshots for diagnostics

pub mod load;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use load::{
    apply_env_overrides, load_config, load_config_file, load_config_with, ConfigError,
    ConfigOptions, ConfigSnapshot, ResolvedConfig,
};
pub use resolve::{resolve_config_path, resolve_config_path_with, ConfigSource};
pub use settings::{
    default_journal_dir, AgentConfig, BufferBackend, BufferConfig, DeliveryConfig, DrainConfig,
    HttpClientSampling, JournalConfig, SamplingConfig, SharedStoreConfig, SigningConfig,
};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "beacon.json";
