//! Configuration file resolution.
//!
//! The file is optional: a missing file means defaults. Flags and
//! environment variables override whatever the file says.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use smartzipper_core::{Config, default_config_path};

use crate::cli::ConfigOverrides;

/// The configuration file to use: `--config` if given, else the default.
pub fn config_path(overrides: &ConfigOverrides) -> PathBuf {
    overrides
        .config
        .clone()
        .unwrap_or_else(default_config_path)
}

/// Load the configuration file at `path`, or defaults if it does not exist.
pub fn load_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Apply command-line overrides to `config`.
pub fn apply_overrides(mut config: Config, overrides: &ConfigOverrides) -> Config {
    if let Some(address) = overrides.address {
        config.link.address = address;
    }
    if let Some(threshold) = overrides.threshold {
        config.monitor.alert_threshold_secs = threshold;
    }
    config
}

/// Load, override and validate the effective configuration.
pub fn resolve(overrides: &ConfigOverrides) -> Result<Config> {
    let path = config_path(overrides);
    let config = apply_overrides(load_file(&path)?, overrides);
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[link]\naddress = \"11:22:33:44:55:66\"\n\n[monitor]\nalert_threshold_secs = 60\n",
        )
        .unwrap();

        let overrides = ConfigOverrides {
            config: Some(path.clone()),
            address: None,
            threshold: Some(10),
        };
        let config = resolve(&overrides).unwrap();
        assert_eq!(config.link.address.to_string(), "11:22:33:44:55:66");
        assert_eq!(config.monitor.alert_threshold_secs, 10);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[monitor]\nopen_value = \"1\"\nclosed_value = \"1\"\n").unwrap();

        let overrides = ConfigOverrides {
            config: Some(path),
            ..Default::default()
        };
        let err = resolve(&overrides).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid configuration"));
    }
}
