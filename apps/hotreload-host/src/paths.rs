//! Where the host finds its config and which development host it dials.
//!
//! # Config directory precedence
//! 1. `HOTRELOAD_CONFIG_DIR`
//! 2. `dirs::config_dir()/hotreload`
//! 3. `./.hotreload` when the platform has no config directory
//!
//! # Development host address precedence
//! 1. `HOTRELOAD_ADDRESS`
//! 2. `host_address` from `hotreload.json`
//! 3. [`STATUS_ADDRESS`]

use hotreload_core::STATUS_ADDRESS;
use hotreload_core::config::HotReloadConfig;

use std::env;
use std::path::PathBuf;

use log::{debug, info, warn};

pub const CONFIG_DIR_ENV: &str = "HOTRELOAD_CONFIG_DIR";
pub const ADDRESS_ENV: &str = "HOTRELOAD_ADDRESS";

const CONFIG_DIR_NAME: &str = "hotreload";
const FALLBACK_CONFIG_DIR: &str = ".hotreload";

/// How a path or address was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    EnvVar,
    ConfigFile,
    PlatformDefault,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir {
    pub path: PathBuf,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub address: String,
    pub source: Source,
}

/// Load `.env` from the working directory if there is one.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded .env from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!("Ignoring unreadable .env: {e}");
            None
        }
    }
}

/// Config directory from the environment and platform.
pub fn detect_config_dir() -> ConfigDir {
    resolve_config_dir(env::var(CONFIG_DIR_ENV).ok(), dirs::config_dir())
}

/// Config directory from an explicit override and platform directory.
pub fn resolve_config_dir(
    override_dir: Option<String>,
    platform_dir: Option<PathBuf>,
) -> ConfigDir {
    if let Some(dir) = override_dir.filter(|dir| !dir.trim().is_empty()) {
        info!("Using {CONFIG_DIR_ENV} override: {dir}");
        return ConfigDir {
            path: PathBuf::from(dir),
            source: Source::EnvVar,
        };
    }

    if let Some(dir) = platform_dir {
        let path = dir.join(CONFIG_DIR_NAME);
        debug!("Platform config dir: {}", path.display());
        return ConfigDir {
            path,
            source: Source::PlatformDefault,
        };
    }

    warn!("No platform config directory, falling back to {FALLBACK_CONFIG_DIR}");
    ConfigDir {
        path: PathBuf::from(FALLBACK_CONFIG_DIR),
        source: Source::Fallback,
    }
}

/// Development host address from the environment and `config`.
pub fn detect_host_address(config: &HotReloadConfig) -> HostAddress {
    resolve_host_address(env::var(ADDRESS_ENV).ok(), config)
}

pub fn resolve_host_address(
    override_address: Option<String>,
    config: &HotReloadConfig,
) -> HostAddress {
    if let Some(address) = override_address.filter(|address| !address.trim().is_empty()) {
        return HostAddress {
            address,
            source: Source::EnvVar,
        };
    }

    if let Some(address) = config.host_address.clone() {
        return HostAddress {
            address,
            source: Source::ConfigFile,
        };
    }

    HostAddress {
        address: STATUS_ADDRESS.to_string(),
        source: Source::Fallback,
    }
}
