use crate::error::ConfigError;
use crate::listener::ConnectionKind;
use crate::{STATUS_HOST, STATUS_PORT};

use common::ErrorLocation;

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "hotreload.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCTS
// ============================================

/// What the listener is told about the connection in `on_connected` and
/// `on_disconnected`. Display only; nothing is bound to this address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub kind: ConnectionKind,
    #[serde(default = "default_status_host")]
    pub host: String,
    #[serde(default = "default_status_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            kind: ConnectionKind::default(),
            host: default_status_host(),
            port: default_status_port(),
        }
    }
}

/// Policy for frames that fail to decode.
///
/// With `max_consecutive_failures` unset every malformed frame is logged and
/// skipped. With a limit set, that many failures in a row end the session,
/// which usually means the two sides speak different protocol versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotReloadConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub decode: DecodeConfig,

    /// Answer pings from the development host with a pong.
    #[serde(default = "default_reply_to_ping")]
    pub reply_to_ping: bool,

    /// Device serial stamped into outbound command headers.
    #[serde(default)]
    pub serial: String,

    /// `ip:port` of the development host, used by hosts that open the socket themselves.
    #[serde(default)]
    pub host_address: Option<String>,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            status: StatusConfig::default(),
            decode: DecodeConfig::default(),
            reply_to_ping: default_reply_to_ping(),
            serial: String::new(),
            host_address: None,
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_status_host() -> String {
    STATUS_HOST.to_string()
}
fn default_status_port() -> u16 {
    STATUS_PORT
}
fn default_reply_to_ping() -> bool {
    true
}

// ============================================
// IMPLEMENTATION
// ============================================

impl HotReloadConfig {
    /// Load config from `{config_dir}/hotreload.json`.
    ///
    /// A missing file is not an error and yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::Read {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: HotReloadConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::Parse {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                line: e.line(),
                column: e.column(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/hotreload.json` through a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization or any filesystem step fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
            location: ErrorLocation::caller(),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::caller(),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::Write {
            location: ErrorLocation::caller(),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Write {
            location: ErrorLocation::caller(),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::Validation {
                location: ErrorLocation::caller(),
                field: "version",
                reason: format!("must be 1-{CONFIG_VERSION}, got {}", self.version),
            });
        }

        if self.status.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                location: ErrorLocation::caller(),
                field: "status.host",
                reason: "cannot be empty".to_string(),
            });
        }

        if self.status.port == 0 {
            return Err(ConfigError::Validation {
                location: ErrorLocation::caller(),
                field: "status.port",
                reason: "cannot be 0".to_string(),
            });
        }

        if self.decode.max_consecutive_failures == Some(0) {
            return Err(ConfigError::Validation {
                location: ErrorLocation::caller(),
                field: "decode.max_consecutive_failures",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        if let Some(ref address) = self.host_address {
            if !address.contains(':') {
                return Err(ConfigError::Validation {
                    location: ErrorLocation::caller(),
                    field: "host_address",
                    reason: format!("expected ip:port, got {address:?}"),
                });
            }
        }

        Ok(())
    }
}
