//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`/etc/exposure/config.toml` on Linux)
//! 3. Environment variables prefixed with `EXPOSURE__`, using `__` between
//!    sections, e.g. `EXPOSURE__SCAN__TARGET_ADDRESS=64:E8:CE:FF:34:4E`
//!
//! The scan target is the "infected" device address the proximity scanner
//! looks for. It is configuration, never a constant in code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "EXPOSURE";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "EXPOSURE_CONFIG";

/// Default statistics API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.covid19api.com";

/// Default scan target.
pub const DEFAULT_TARGET_ADDRESS: &str = "64:E8:CE:FF:34:4E";

/// Default scan window in milliseconds.
pub const DEFAULT_SCAN_DURATION_MS: u64 = 5000;

const MIN_SCAN_DURATION_MS: u64 = 100;
const MAX_SCAN_DURATION_MS: u64 = 60_000;
const MAX_API_TIMEOUT_SECS: u64 = 300;

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("MAC address regex is valid")
});

/// Errors from loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// Target path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A single field is invalid.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Returns `true` if `address` looks like `XX:XX:XX:XX:XX:XX`.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address.trim())
}

/// Statistics API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the time-series API.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Proximity scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// MAC address to scan for.
    pub target_address: String,

    /// Scan window in milliseconds.
    pub duration_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_address: DEFAULT_TARGET_ADDRESS.to_string(),
            duration_ms: DEFAULT_SCAN_DURATION_MS,
        }
    }
}

impl ScanConfig {
    /// Scan window as a [`Duration`].
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_address: String,

    /// TCP port.
    pub port: u16,

    /// Use production logging (JSON files + compact stdout).
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            production: false,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Statistics API.
    pub api: ApiConfig,

    /// Proximity scanning.
    pub scan: ScanConfig,

    /// HTTP server.
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from `path` (if it exists) and the environment.
    ///
    /// A missing file is not an error; defaults and environment overrides apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the result is invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let write_error = |source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)?;
        Ok(())
    }

    /// Check every field and report all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a single problem or
    /// [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: String| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message,
            });
        };

        match url::Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => invalid(
                "api.base_url",
                format!("unsupported scheme '{}', expected http or https", url.scheme()),
            ),
            Err(e) => invalid("api.base_url", format!("not a valid URL: {e}")),
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > MAX_API_TIMEOUT_SECS {
            invalid(
                "api.timeout_secs",
                format!("must be between 1 and {MAX_API_TIMEOUT_SECS}"),
            );
        }

        if !is_valid_mac_address(&self.scan.target_address) {
            invalid(
                "scan.target_address",
                format!(
                    "'{}' is not a MAC address (XX:XX:XX:XX:XX:XX)",
                    self.scan.target_address
                ),
            );
        }

        if !(MIN_SCAN_DURATION_MS..=MAX_SCAN_DURATION_MS).contains(&self.scan.duration_ms) {
            invalid(
                "scan.duration_ms",
                format!("must be between {MIN_SCAN_DURATION_MS} and {MAX_SCAN_DURATION_MS}"),
            );
        }

        if self.server.port == 0 {
            invalid("server.port", "must not be 0".to_string());
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Location of the configuration file.
///
/// `EXPOSURE_CONFIG` wins when set. Otherwise `/etc/exposure/config.toml` on
/// Linux and the platform config directory elsewhere.
#[must_use]
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/exposure/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "exposure")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan.duration(), Duration::from_secs(5));
        assert_eq!(config.scan.target_address, DEFAULT_TARGET_ADDRESS);
    }

    #[test]
    fn test_mac_address_validation() {
        assert!(is_valid_mac_address("64:E8:CE:FF:34:4E"));
        assert!(is_valid_mac_address("aa:bb:cc:dd:ee:ff"));
        assert!(!is_valid_mac_address("64-E8-CE-FF-34-4E"));
        assert!(!is_valid_mac_address("64:E8:CE:FF:34"));
        assert!(!is_valid_mac_address("GG:E8:CE:FF:34:4E"));
        assert!(!is_valid_mac_address(""));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.scan.duration_ms, DEFAULT_SCAN_DURATION_MS);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[scan]\ntarget_address = \"AA:BB:CC:DD:EE:FF\"\nduration_ms = 2500\n",
        )
        .unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.scan.target_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.scan.duration_ms, 2500);
        assert_eq!(config.api.timeout_secs, 15);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan]\ntarget_address = \"nearby\"\n").unwrap();

        let result = Config::load_or_default(&path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError { ref field, .. }) if field == "scan.target_address"
        ));
    }

    #[test]
    fn test_multiple_validation_errors_are_collected() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".into();
        config.scan.duration_ms = 10;
        config.server.port = 0;

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scan.target_address = "11:22:33:44:55:66".into();
        config.api.timeout_secs = 30;
        config.save(&path).unwrap();

        let loaded = Config::load_or_default(&path).unwrap();
        assert_eq!(loaded.scan.target_address, "11:22:33:44:55:66");
        assert_eq!(loaded.api.timeout_secs, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbind_address = \"127.0.0.1\"\n").unwrap();

        std::env::set_var("EXPOSURE__SERVER__BIND_ADDRESS", "10.0.0.5");
        let config = Config::load_or_default(&path);
        std::env::remove_var("EXPOSURE__SERVER__BIND_ADDRESS");

        assert_eq!(config.unwrap().server.bind_address, "10.0.0.5");
    }
}
