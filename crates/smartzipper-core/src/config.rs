//! Monitor configuration.
//!
//! Configuration lives in a TOML file under the platform config directory
//! (see [`default_config_path`]). Every key is optional; missing keys take
//! the defaults of the stock SmartZipper peripheral.
//!
//! ```toml
//! [link]
//! address = "E3:D4:1E:79:7C:16"
//! connect_timeout_secs = 15
//!
//! [monitor]
//! alert_threshold_secs = 360
//! check_interval_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use smartzipper_types::uuids::{
    CLIENT_CHARACTERISTIC_CONFIG, DEFAULT_DEVICE_ADDRESS, HALL_CHARACTERISTIC, HALL_SERVICE,
};
use smartzipper_types::{DeviceAddress, ValueEncoding};

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which peripheral to talk to and how.
    pub link: LinkConfig,
    /// Open-episode tracking and alerting.
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use smartzipper_core::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.link.validate());
        errors.extend(self.monitor.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Minimum connect timeout in seconds.
pub const MIN_CONNECT_TIMEOUT: u64 = 1;
/// Maximum connect timeout in seconds.
pub const MAX_CONNECT_TIMEOUT: u64 = 120;

/// Peripheral identity and GATT layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bluetooth address of the peripheral.
    pub address: DeviceAddress,
    /// Service carrying the hall characteristic.
    pub service_uuid: Uuid,
    /// Hall sensor value characteristic.
    pub characteristic_uuid: Uuid,
    /// Descriptor written to enable notifications.
    pub descriptor_uuid: Uuid,
    /// How long a connect request may take, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_DEVICE_ADDRESS,
            service_uuid: HALL_SERVICE,
            characteristic_uuid: HALL_CHARACTERISTIC,
            descriptor_uuid: CLIENT_CHARACTERISTIC_CONFIG,
            connect_timeout_secs: 15,
        }
    }
}

impl LinkConfig {
    /// The connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate link configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.service_uuid.is_nil() {
            errors.push(ValidationError::new("link.service_uuid", "UUID cannot be nil"));
        }
        if self.characteristic_uuid.is_nil() {
            errors.push(ValidationError::new(
                "link.characteristic_uuid",
                "UUID cannot be nil",
            ));
        }
        if self.descriptor_uuid.is_nil() {
            errors.push(ValidationError::new("link.descriptor_uuid", "UUID cannot be nil"));
        }

        if self.connect_timeout_secs < MIN_CONNECT_TIMEOUT {
            errors.push(ValidationError::new(
                "link.connect_timeout_secs",
                format!(
                    "timeout {} is too short (minimum {} second)",
                    self.connect_timeout_secs, MIN_CONNECT_TIMEOUT
                ),
            ));
        } else if self.connect_timeout_secs > MAX_CONNECT_TIMEOUT {
            errors.push(ValidationError::new(
                "link.connect_timeout_secs",
                format!(
                    "timeout {} is too long (maximum {} seconds)",
                    self.connect_timeout_secs, MAX_CONNECT_TIMEOUT
                ),
            ));
        }

        errors
    }
}

/// Value mapping and alert timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Raw values and their labels.
    #[serde(flatten)]
    pub encoding: ValueEncoding,
    /// How often an open episode is checked against the threshold, in seconds.
    pub check_interval_secs: u64,
    /// How long the sensor may stay open before alerting, in seconds.
    pub alert_threshold_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            encoding: ValueEncoding::default(),
            check_interval_secs: 5,
            alert_threshold_secs: 360,
        }
    }
}

impl MonitorConfig {
    /// The periodic check interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// The alert threshold as a [`Duration`].
    pub fn alert_threshold(&self) -> Duration {
        Duration::from_secs(self.alert_threshold_secs)
    }

    /// Validate monitor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let encoding = &self.encoding;

        if encoding.open_value.trim().is_empty() {
            errors.push(ValidationError::new("monitor.open_value", "value cannot be empty"));
        }
        if encoding.closed_value.trim().is_empty() {
            errors.push(ValidationError::new(
                "monitor.closed_value",
                "value cannot be empty",
            ));
        }
        if encoding.open_value.trim() == encoding.closed_value.trim() {
            errors.push(ValidationError::new(
                "monitor.closed_value",
                format!(
                    "closed value '{}' must differ from the open value",
                    encoding.closed_value
                ),
            ));
        }
        // Raw payloads are trimmed before comparison, so padded values could never match.
        if encoding.open_value != encoding.open_value.trim() {
            errors.push(ValidationError::new(
                "monitor.open_value",
                "value cannot have surrounding whitespace",
            ));
        }
        if encoding.closed_value != encoding.closed_value.trim() {
            errors.push(ValidationError::new(
                "monitor.closed_value",
                "value cannot have surrounding whitespace",
            ));
        }

        if self.check_interval_secs == 0 {
            errors.push(ValidationError::new(
                "monitor.check_interval_secs",
                "check interval must be at least 1 second",
            ));
        }
        if self.alert_threshold_secs == 0 {
            errors.push(ValidationError::new(
                "monitor.alert_threshold_secs",
                "alert threshold must be at least 1 second",
            ));
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `link.connect_timeout_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smartzipper")
        .join("config.toml")
}
