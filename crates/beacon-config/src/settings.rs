//! Typed agent settings as read from `beacon.json`.
//!
//! Every field has a default so that an empty object (or no file at all)
//! yields a working, disabled-by-endpoint agent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use beacon_redact::RedactionPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Application name used for data and config directories.
pub const APP_NAME: &str = "beacon";

/// Top-level agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Master switch. When false, recording is a no-op.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Collector URL events are POSTed to.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with every delivery.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub release: Option<String>,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub redaction: RedactionPolicy,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub drain: DrainConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            enabled: true,
            endpoint: None,
            api_key: None,
            environment: None,
            release: None,
            sampling: SamplingConfig::default(),
            redaction: RedactionPolicy::default(),
            delivery: DeliveryConfig::default(),
            buffer: BufferConfig::default(),
            drain: DrainConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Whether both endpoint and api key are present and non-empty.
    pub fn is_delivery_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.endpoint) && present(&self.api_key)
    }

    /// Secret used for payload signing: the dedicated secret, else the api key.
    pub fn signing_secret(&self) -> Option<&str> {
        self.delivery
            .signing
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.api_key.as_deref().filter(|s| !s.is_empty()))
    }

    /// Copy with credentials replaced by the redaction mask, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = self.redaction.mask.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some(mask.clone());
        }
        if copy.delivery.signing.secret.is_some() {
            copy.delivery.signing.secret = Some(mask);
        }
        copy
    }
}

/// Per-type sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplingConfig {
    /// Rate used for types without an explicit entry.
    #[serde(default = "default_rate")]
    pub default_rate: f64,

    /// Event type → keep probability in [0, 1].
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,

    #[serde(default)]
    pub http_client: HttpClientSampling,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_rate: default_rate(),
            rates: BTreeMap::new(),
            http_client: HttpClientSampling::default(),
        }
    }
}

impl SamplingConfig {
    /// Configured rate for an event type, falling back to the default.
    pub fn rate_for(&self, event_type: &str) -> f64 {
        self.rates
            .get(event_type)
            .copied()
            .unwrap_or(self.default_rate)
    }
}

/// Sampling rules specific to outbound HTTP calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HttpClientSampling {
    /// Event type these rules apply to.
    #[serde(default = "default_http_event_type")]
    pub event_type: String,

    /// Calls at or above this duration are always kept.
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,

    /// Exact host → rate, overriding the type rate.
    #[serde(default)]
    pub host_rates: BTreeMap<String, f64>,
}

impl Default for HttpClientSampling {
    fn default() -> Self {
        Self {
            event_type: default_http_event_type(),
            slow_threshold_ms: default_slow_threshold_ms(),
            host_rates: BTreeMap::new(),
        }
    }
}

/// HTTP delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Gzip request bodies.
    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default)]
    pub signing: SigningConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            compression: true,
            signing: SigningConfig::default(),
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// HMAC signing of delivery bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SigningConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Shared secret. Falls back to the api key when unset.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Which buffer backend the agent uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BufferBackend {
    /// In-process list; overflow and teardown spill to the journal.
    #[default]
    Memory,
    /// Append-only journal file, drained out of band.
    Disk,
    /// Shared key-value list.
    Shared,
}

impl BufferBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferBackend::Memory => "memory",
            BufferBackend::Disk => "disk",
            BufferBackend::Shared => "shared",
        }
    }
}

impl std::fmt::Display for BufferBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BufferBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BufferBackend::Memory),
            "disk" | "journal" => Ok(BufferBackend::Disk),
            "shared" | "redis" => Ok(BufferBackend::Shared),
            other => Err(format!("unknown buffer backend: {}", other)),
        }
    }
}

/// Buffer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BufferConfig {
    #[serde(default)]
    pub backend: BufferBackend,

    /// In-memory events held before overflowing to the journal.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    #[serde(default)]
    pub journal: JournalConfig,

    #[serde(default)]
    pub shared: SharedStoreConfig,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            backend: BufferBackend::default(),
            memory_capacity: default_memory_capacity(),
            journal: JournalConfig::default(),
            shared: SharedStoreConfig::default(),
        }
    }
}

/// Durable journal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JournalConfig {
    /// Directory holding the live and rotated journal files.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Rotate the live file once it reaches this size.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Rotated files older than this are swept.
    #[serde(default = "default_rotated_ttl_secs")]
    pub rotated_ttl_secs: u64,

    /// Chance that an append also runs a sweep.
    #[serde(default = "default_sweep_probability")]
    pub sweep_probability: f64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_file_bytes: default_max_file_bytes(),
            rotated_ttl_secs: default_rotated_ttl_secs(),
            sweep_probability: default_sweep_probability(),
        }
    }
}

impl JournalConfig {
    /// Effective journal directory.
    pub fn journal_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_journal_dir)
    }

    pub fn rotated_ttl(&self) -> Duration {
        Duration::from_secs(self.rotated_ttl_secs)
    }
}

/// Shared list store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SharedStoreConfig {
    /// Store connection URL (e.g. `redis://127.0.0.1/`).
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_shared_key")]
    pub key: String,

    /// List length cap; older entries are trimmed.
    #[serde(default = "default_shared_max_len")]
    pub max_len: usize,

    /// Events popped per flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Key holding the shared throttle deadline.
    #[serde(default = "default_throttle_key")]
    pub throttle_key: String,
}

impl Default for SharedStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: default_shared_key(),
            max_len: default_shared_max_len(),
            batch_size: default_batch_size(),
            throttle_key: default_throttle_key(),
        }
    }
}

/// Out-of-band drain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DrainConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Daemon interval between drain runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl DrainConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Default journal directory: `$XDG_DATA_HOME/beacon/journal`.
pub fn default_journal_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("journal")
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_rate() -> f64 {
    1.0
}

fn default_http_event_type() -> String {
    "http_client".to_string()
}

fn default_slow_threshold_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_memory_capacity() -> usize {
    5000
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_rotated_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_sweep_probability() -> f64 {
    0.01
}

fn default_shared_key() -> String {
    "beacon:events".to_string()
}

fn default_shared_max_len() -> usize {
    10_000
}

fn default_throttle_key() -> String {
    "beacon:rate_limited".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_yields_defaults() {
        let cfg: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AgentConfig::default());
        assert!(cfg.enabled);
        assert_eq!(cfg.delivery.max_attempts, 3);
        assert_eq!(cfg.delivery.initial_backoff_ms, 100);
        assert!(cfg.delivery.compression);
        assert!(!cfg.delivery.signing.enabled);
        assert_eq!(cfg.buffer.backend, BufferBackend::Memory);
        assert_eq!(cfg.buffer.memory_capacity, 5000);
        assert_eq!(cfg.buffer.journal.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.drain.batch_size, 100);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg: AgentConfig = serde_json::from_str(
            r#"{"delivery": {"max_attempts": 5}, "buffer": {"backend": "disk"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.delivery.max_attempts, 5);
        assert_eq!(cfg.delivery.timeout_ms, 5000);
        assert_eq!(cfg.buffer.backend, BufferBackend::Disk);
        assert_eq!(cfg.buffer.memory_capacity, 5000);
    }

    #[test]
    fn test_rate_for_falls_back_to_default() {
        let mut sampling = SamplingConfig {
            default_rate: 0.5,
            ..Default::default()
        };
        sampling.rates.insert("request".to_string(), 0.1);
        assert_eq!(sampling.rate_for("request"), 0.1);
        assert_eq!(sampling.rate_for("job"), 0.5);
    }

    #[test]
    fn test_delivery_configured_requires_both() {
        let mut cfg = AgentConfig::default();
        assert!(!cfg.is_delivery_configured());
        cfg.endpoint = Some("https://collector.example/ingest".to_string());
        assert!(!cfg.is_delivery_configured());
        cfg.api_key = Some("   ".to_string());
        assert!(!cfg.is_delivery_configured());
        cfg.api_key = Some("key".to_string());
        assert!(cfg.is_delivery_configured());
    }

    #[test]
    fn test_signing_secret_falls_back_to_api_key() {
        let mut cfg = AgentConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.signing_secret(), Some("key"));
        cfg.delivery.signing.secret = Some("dedicated".to_string());
        assert_eq!(cfg.signing_secret(), Some("dedicated"));
    }

    #[test]
    fn test_redacted_masks_credentials() {
        let mut cfg = AgentConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        cfg.delivery.signing.secret = Some("s".to_string());
        let shown = cfg.redacted();
        assert_eq!(shown.api_key.as_deref(), Some("********"));
        assert_eq!(shown.delivery.signing.secret.as_deref(), Some("********"));
        assert_eq!(cfg.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Disk".parse::<BufferBackend>(), Ok(BufferBackend::Disk));
        assert_eq!("redis".parse::<BufferBackend>(), Ok(BufferBackend::Shared));
        assert!("tape".parse::<BufferBackend>().is_err());
    }
}
