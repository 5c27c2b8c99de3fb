//! Configuration path discovery.
//!
//! Resolution order: CLI argument → `BEACON_CONFIG` → `BEACON_CONFIG_DIR` →
//! XDG config dir → `/etc/beacon` → built-in defaults.

use std::path::{Path, PathBuf};

use crate::settings::APP_NAME;
use crate::CONFIG_FILENAME;

/// Where the configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/beacon/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::CliArgument => "cli",
            ConfigSource::Environment => "env",
            ConfigSource::XdgConfig => "xdg",
            ConfigSource::SystemConfig => "system",
            ConfigSource::BuiltinDefault => "default",
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable naming the config file directly.
pub const ENV_CONFIG_PATH: &str = "BEACON_CONFIG";
/// Environment variable naming a directory holding `beacon.json`.
pub const ENV_CONFIG_DIR: &str = "BEACON_CONFIG_DIR";

/// Resolve the config path from the process environment.
///
/// An explicit CLI path is returned even if it does not exist so that the
/// loader can report it; every other candidate must exist to be chosen.
pub fn resolve_config_path(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    resolve_config_path_with(
        cli_path,
        |key| std::env::var(key).ok(),
        dirs::config_dir(),
        Path::new("/etc").join(APP_NAME),
    )
}

/// Resolution with injectable environment and directories.
pub fn resolve_config_path_with(
    cli_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    xdg_config_home: Option<PathBuf>,
    system_dir: PathBuf,
) -> (Option<PathBuf>, ConfigSource) {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    // 2. Environment variable (direct path)
    if let Some(env_path) = env(ENV_CONFIG_PATH).filter(|p| !p.is_empty()) {
        return (Some(PathBuf::from(env_path)), ConfigSource::Environment);
    }

    // 3. Environment variable (config dir)
    if let Some(config_dir) = env(ENV_CONFIG_DIR).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 4. XDG config directory
    if let Some(xdg_config) = xdg_config_home {
        let path = xdg_config.join(APP_NAME).join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    // 5. System config
    let system_path = system_dir.join(CONFIG_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_cli_path_wins_even_if_missing() {
        let (path, source) = resolve_config_path_with(
            Some(Path::new("/nonexistent/beacon.json")),
            env_from(&[(ENV_CONFIG_PATH, "/other.json")]),
            None,
            PathBuf::from("/nonexistent-etc"),
        );
        assert_eq!(path, Some(PathBuf::from("/nonexistent/beacon.json")));
        assert_eq!(source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_env_path_before_dirs() {
        let (path, source) = resolve_config_path_with(
            None,
            env_from(&[(ENV_CONFIG_PATH, "/from/env.json")]),
            None,
            PathBuf::from("/nonexistent-etc"),
        );
        assert_eq!(path, Some(PathBuf::from("/from/env.json")));
        assert_eq!(source, ConfigSource::Environment);
    }

    #[test]
    fn test_config_dir_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();

        let (path, source) = resolve_config_path_with(
            None,
            env_from(&[(ENV_CONFIG_DIR, &dir_str)]),
            None,
            PathBuf::from("/nonexistent-etc"),
        );
        assert_eq!(path, None);
        assert_eq!(source, ConfigSource::BuiltinDefault);

        std::fs::write(dir.path().join(CONFIG_FILENAME), "{}").unwrap();
        let (path, source) = resolve_config_path_with(
            None,
            env_from(&[(ENV_CONFIG_DIR, &dir_str)]),
            None,
            PathBuf::from("/nonexistent-etc"),
        );
        assert_eq!(path, Some(dir.path().join(CONFIG_FILENAME)));
        assert_eq!(source, ConfigSource::Environment);
    }

    #[test]
    fn test_xdg_then_system() {
        let xdg = TempDir::new().unwrap();
        let etc = TempDir::new().unwrap();
        std::fs::write(etc.path().join(CONFIG_FILENAME), "{}").unwrap();

        let (path, source) = resolve_config_path_with(
            None,
            env_from(&[]),
            Some(xdg.path().to_path_buf()),
            etc.path().to_path_buf(),
        );
        assert_eq!(source, ConfigSource::SystemConfig);
        assert_eq!(path, Some(etc.path().join(CONFIG_FILENAME)));

        std::fs::create_dir_all(xdg.path().join(APP_NAME)).unwrap();
        std::fs::write(xdg.path().join(APP_NAME).join(CONFIG_FILENAME), "{}").unwrap();
        let (_, source) = resolve_config_path_with(
            None,
            env_from(&[]),
            Some(xdg.path().to_path_buf()),
            etc.path().to_path_buf(),
        );
        assert_eq!(source, ConfigSource::XdgConfig);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(format!("{}", ConfigSource::BuiltinDefault), "builtin default");
        assert_eq!(ConfigSource::XdgConfig.as_str(), "xdg");
    }
}
