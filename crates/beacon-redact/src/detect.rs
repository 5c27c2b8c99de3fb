//! Secret detection for payload string values.
//!
//! Used when `scrub_secret_values` is on: values are masked if they look like a
//! credential even though their key is not on the deny-list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Type of detected secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    /// AWS access key (AKIA...)
    AwsAccessKey,
    /// GitHub personal access token
    GitHubToken,
    /// GitLab personal access token
    GitLabToken,
    /// Slack token (xoxb-...)
    SlackToken,
    /// JSON Web Token
    Jwt,
    /// Private key (PEM format)
    PrivateKey,
    /// OpenAI/Anthropic API key
    AiApiKey,
    /// `Bearer <token>` authorization value
    BearerToken,
    /// URL with `user:password@` credentials
    CredentialUrl,
}

/// Detection pattern definition.
struct DetectionPattern {
    secret_type: SecretType,
    pattern: Lazy<Regex>,
}

static PATTERNS: [DetectionPattern; 9] = [
    DetectionPattern {
        secret_type: SecretType::AwsAccessKey,
        pattern: Lazy::new(|| Regex::new(r"AKIA[0-9A-Z]{16}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::GitHubToken,
        pattern: Lazy::new(|| Regex::new(r"gh[pousr]_[A-Za-z0-9_]{36,}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::GitLabToken,
        pattern: Lazy::new(|| Regex::new(r"glpat-[A-Za-z0-9\-_]{20,}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::SlackToken,
        pattern: Lazy::new(|| Regex::new(r"xox[baprs]-[A-Za-z0-9\-]+").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::Jwt,
        pattern: Lazy::new(|| {
            Regex::new(r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").unwrap()
        }),
    },
    DetectionPattern {
        secret_type: SecretType::PrivateKey,
        pattern: Lazy::new(|| Regex::new(r"-----BEGIN[A-Z ]*PRIVATE KEY-----").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::AiApiKey,
        pattern: Lazy::new(|| Regex::new(r"sk-(?:ant-)?[A-Za-z0-9_-]{20,}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::BearerToken,
        pattern: Lazy::new(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]{8,}=*").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::CredentialUrl,
        pattern: Lazy::new(|| {
            Regex::new(r"(?i)\b[a-z][a-z0-9+.\-]*://[^/\s:@]+:[^/\s@]+@").unwrap()
        }),
    },
];

/// Secret detector for credential-shaped string values.
#[derive(Clone, Default)]
pub struct SecretDetector {
    /// Additional patterns registered at runtime.
    custom_patterns: Vec<(Regex, SecretType)>,
}

impl SecretDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom detection pattern.
    pub fn add_pattern(&mut self, pattern: Regex, secret_type: SecretType) {
        self.custom_patterns.push((pattern, secret_type));
    }

    /// Detect if a value contains a secret.
    pub fn detect(&self, value: &str) -> Option<SecretType> {
        for pattern in PATTERNS.iter() {
            if pattern.pattern.is_match(value) {
                return Some(pattern.secret_type);
            }
        }

        self.custom_patterns
            .iter()
            .find(|(re, _)| re.is_match(value))
            .map(|(_, secret_type)| *secret_type)
    }
}
