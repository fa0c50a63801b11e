use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure reported by a [`HotReloadListener`](crate::listener::HotReloadListener) callback.
#[derive(Debug, ThisError)]
#[error("Listener Error: {message} {location}")]
pub struct ListenerError {
    pub message: String,
    pub location: ErrorLocation,
}

impl ListenerError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("Dispatch Error: {command}: {source}")]
    Listener {
        command: &'static str,
        #[source]
        source: ListenerError,
    },

    #[error("Dispatch Panic Error: {command}: {message} {location}")]
    Panicked {
        command: &'static str,
        message: String,
        location: ErrorLocation,
    },
}
