use hotreload_core::error::{ConfigError, CoreError, TransportError};

use common::ErrorLocation;

use std::path::PathBuf;

use thiserror::Error;

/// Errors of the host binary.
#[derive(Debug, Error)]
pub enum HostError {
    /// Startup and environment failures of this app
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Error from hotreload-core (config, transport, ...)
    #[error("Core Error: {source}")]
    Core {
        #[from]
        source: CoreError,
    },

    /// A file event could not be applied to the mirror directory
    #[error("Mirror Error: {path}: {message} {location}")]
    Mirror {
        path: PathBuf,
        message: String,
        location: ErrorLocation,
    },

    /// A relative path from the development host points outside the mirror root
    #[error("Path Escape Error: {relative_path:?} leaves the mirror root {location}")]
    PathEscape {
        relative_path: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for HostError {
    fn from(error: ConfigError) -> Self {
        HostError::Core {
            source: CoreError::from(error),
        }
    }
}

impl From<TransportError> for HostError {
    fn from(error: TransportError) -> Self {
        HostError::Core {
            source: CoreError::from(error),
        }
    }
}
