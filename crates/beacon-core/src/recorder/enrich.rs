//! Enrichment blocks merged into every event.
//!
//! Enrichers are long-lived and read-mostly: whatever they contribute is
//! computed once and cached. An enricher that has nothing to offer returns
//! `None`; one that panics is skipped for that event.

use std::fs;
use std::path::{Path, PathBuf};

use beacon_common::Payload;
use serde_json::Value;

/// Environment variable carrying the deployment hash.
pub const ENV_DEPLOYMENT_HASH: &str = "BEACON_DEPLOYMENT_HASH";

pub trait Enricher: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Keys to merge into `Event::enrichment`.
    fn enrich(&self) -> Option<Payload>;
}

/// A fixed block supplied by the host application.
#[derive(Debug, Clone)]
pub struct StaticEnricher {
    name: String,
    block: Payload,
}

impl StaticEnricher {
    pub fn new(name: impl Into<String>, block: Payload) -> Self {
        StaticEnricher {
            name: name.into(),
            block,
        }
    }
}

impl Enricher for StaticEnricher {
    fn name(&self) -> &str {
        &self.name
    }

    fn enrich(&self) -> Option<Payload> {
        (!self.block.is_empty()).then(|| self.block.clone())
    }
}

/// Deployment correlation: git commit and branch of the checkout, plus the
/// deployment hash from [`ENV_DEPLOYMENT_HASH`].
#[derive(Debug, Clone)]
pub struct DeploymentEnricher {
    block: Payload,
}

impl DeploymentEnricher {
    /// Look for `<root>/.git` and read the deployment hash from the environment.
    pub fn discover(root: &Path) -> Self {
        let hash = std::env::var(ENV_DEPLOYMENT_HASH).ok();
        Self::from_parts(Some(&root.join(".git")), hash)
    }

    pub fn from_parts(git_dir: Option<&Path>, deployment_hash: Option<String>) -> Self {
        let mut block = Payload::new();
        if let Some(hash) = deployment_hash.filter(|h| !h.trim().is_empty()) {
            block.insert("deployment_hash".into(), Value::String(hash.trim().to_string()));
        }
        if let Some(head) = git_dir.and_then(read_git_head) {
            block.insert("git_commit".into(), Value::String(head.commit));
            if let Some(branch) = head.branch {
                block.insert("git_branch".into(), Value::String(branch));
            }
        }
        DeploymentEnricher { block }
    }
}

impl Enricher for DeploymentEnricher {
    fn name(&self) -> &str {
        "deployment"
    }

    fn enrich(&self) -> Option<Payload> {
        (!self.block.is_empty()).then(|| self.block.clone())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct GitHead {
    commit: String,
    branch: Option<String>,
}

/// Resolve `HEAD` to a commit: detached hashes, loose refs, then `packed-refs`.
fn read_git_head(git_dir: &Path) -> Option<GitHead> {
    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:").map(str::trim) else {
        return is_commit_hash(head).then(|| GitHead {
            commit: head.to_string(),
            branch: None,
        });
    };

    let branch = reference
        .strip_prefix("refs/heads/")
        .map(str::to_string);
    let loose: PathBuf = git_dir.join(reference);
    let commit = fs::read_to_string(loose)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| is_commit_hash(s))
        .or_else(|| packed_ref(git_dir, reference))?;
    Some(GitHead { commit, branch })
}

fn packed_ref(git_dir: &Path, reference: &str) -> Option<String> {
    let packed = fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter(|l| !l.starts_with('#') && !l.starts_with('^'))
        .filter_map(|l| l.split_once(' '))
        .find(|(_, name)| name.trim() == reference)
        .map(|(hash, _)| hash.to_string())
        .filter(|h| is_commit_hash(h))
}

fn is_commit_hash(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.chars().all(|c| c.is_ascii_hexdigit())
}
