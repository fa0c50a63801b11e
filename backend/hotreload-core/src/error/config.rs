use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Failures loading, saving or validating `hotreload.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Parse Error: {path}:{line}:{column}: {reason} {location}")]
    Parse {
        location: ErrorLocation,
        path: PathBuf,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("Config Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Serialization Error: {reason} {location}")]
    Serialize {
        location: ErrorLocation,
        reason: String,
    },

    #[error("Config Validation Error: `{field}` {reason} {location}")]
    Validation {
        location: ErrorLocation,
        field: &'static str,
        reason: String,
    },
}
