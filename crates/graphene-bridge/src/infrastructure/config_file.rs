//! TOML config file loading.
//!
//! ```toml
//! [bridge]
//! request_timeout_ms = 10000   # 0 waits forever
//! receiver_name = "__grapheneBridgeReceiveFromJava"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take `some_fn()` when absent, so an empty
//! file (or no file at all) yields [`BridgeConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    BridgeConfig, DEFAULT_LOG_LEVEL, DEFAULT_RECEIVER_NAME, DEFAULT_REQUEST_TIMEOUT,
};

/// Error type for config file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk shape of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeSection {
    /// Content-issued request timeout in milliseconds; `0` disables it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Host-visible name of the inbound receiver.
    #[serde(default = "default_receiver_name")]
    pub receiver_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSection {
    /// `tracing` filter: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            receiver_name: default_receiver_name(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}
fn default_receiver_name() -> String {
    DEFAULT_RECEIVER_NAME.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Converts a millisecond count into an optional timeout; `0` means none.
pub fn timeout_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl ConfigFile {
    pub fn into_bridge_config(self) -> BridgeConfig {
        BridgeConfig {
            request_timeout: timeout_from_millis(self.bridge.request_timeout_ms),
            receiver_name: self.bridge.receiver_name,
            log_level: self.logging.level,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(text: &str) -> Result<BridgeConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(text)?;
    Ok(file.into_bridge_config())
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(BridgeConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_defaults() {
        // Arrange / Act
        let cfg = parse_config("").unwrap();
        // Assert
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_partial_bridge_section_overrides_only_given_fields() {
        let cfg = parse_config("[bridge]\nrequest_timeout_ms = 2500\n").unwrap();
        assert_eq!(cfg.request_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(cfg.receiver_name, DEFAULT_RECEIVER_NAME);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let cfg = parse_config("[bridge]\nrequest_timeout_ms = 0\n").unwrap();
        assert_eq!(cfg.request_timeout, None);
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            [bridge]
            request_timeout_ms = 500
            receiver_name = "__customReceiver"

            [logging]
            level = "debug"
        "#;
        let cfg = parse_config(text).unwrap();
        assert_eq!(cfg.receiver_name, "__customReceiver");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[bridge\nrequest_timeout_ms = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        assert!(parse_config("[bridge]\nrequest_timeout_ms = \"soon\"\n").is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("graphene-missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(load_config(&path).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("graphene-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        // Act
        let cfg = load_config(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(cfg.unwrap().log_level, "warn");
    }

    #[test]
    fn test_directory_path_is_io_error() {
        let err = load_config(&std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_timeout_from_millis() {
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(1), Some(Duration::from_millis(1)));
    }
}
