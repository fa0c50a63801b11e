//! The host-side observer of connection and file events.
//!
//! A listener is handed to [`HotReloadServer::new`](crate::hotreload::HotReloadServer::new)
//! and kept for the lifetime of the server. All file callbacks for one
//! connection run on the worker, one at a time, in frame order.

use crate::error::ListenerError;

use std::fmt::{Display, Formatter, Result as FormatResult};

use log::debug;
use prost::bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub type ListenerResult = Result<(), ListenerError>;

/// How the device is linked to the development host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    #[default]
    Net,
    Usb,
}

impl Display for ConnectionKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            ConnectionKind::Net => formatter.write_str("net"),
            ConnectionKind::Usb => formatter.write_str("usb"),
        }
    }
}

pub trait HotReloadListener: Send + Sync {
    fn on_connected(&self, kind: ConnectionKind, host: &str, port: u16);

    fn on_disconnected(&self, kind: ConnectionKind, host: &str, port: u16, reason: &str);

    fn on_file_update(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult;

    fn on_file_create(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult;

    fn on_file_delete(&self, path: &str, relative_path: &str) -> ListenerResult;

    fn on_file_rename(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult;

    fn on_file_move(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult;

    /// `params` already carries the `hotReload_SerialNum` of the reload request.
    fn on_reload(&self, entry_path: &str, relative_entry_path: &str, params: &str)
    -> ListenerResult;

    fn on_ip_changed(&self, address: &str) -> ListenerResult;
}

/// Listener callbacks as values, for hosts that prefer to consume a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotReloadEvent {
    Connected {
        kind: ConnectionKind,
        host: String,
        port: u16,
    },
    Disconnected {
        kind: ConnectionKind,
        host: String,
        port: u16,
        reason: String,
    },
    FileUpdated {
        path: String,
        relative_path: String,
        content: Bytes,
    },
    FileCreated {
        path: String,
        relative_path: String,
        content: Bytes,
    },
    FileDeleted {
        path: String,
        relative_path: String,
    },
    FileRenamed {
        old_path: String,
        old_relative_path: String,
        new_path: String,
        new_relative_path: String,
    },
    FileMoved {
        old_path: String,
        old_relative_path: String,
        new_path: String,
        new_relative_path: String,
    },
    Reload {
        entry_path: String,
        relative_entry_path: String,
        params: String,
    },
    IpChanged {
        address: String,
    },
}

/// Forwards every callback into an unbounded channel as a [`HotReloadEvent`].
///
/// File callbacks fail with [`ListenerError`] once the receiver is dropped;
/// connection callbacks cannot fail and are dropped silently instead.
pub struct EventChannelListener {
    events: mpsc::UnboundedSender<HotReloadEvent>,
}

impl EventChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HotReloadEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }

    fn forward(&self, event: HotReloadEvent) -> ListenerResult {
        self.events
            .send(event)
            .map_err(|_| ListenerError::new("event receiver dropped"))
    }
}

impl HotReloadListener for EventChannelListener {
    fn on_connected(&self, kind: ConnectionKind, host: &str, port: u16) {
        let event = HotReloadEvent::Connected {
            kind,
            host: host.to_string(),
            port,
        };
        if self.forward(event).is_err() {
            debug!("Connected event dropped, no receiver");
        }
    }

    fn on_disconnected(&self, kind: ConnectionKind, host: &str, port: u16, reason: &str) {
        let event = HotReloadEvent::Disconnected {
            kind,
            host: host.to_string(),
            port,
            reason: reason.to_string(),
        };
        if self.forward(event).is_err() {
            debug!("Disconnected event dropped, no receiver");
        }
    }

    fn on_file_update(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        self.forward(HotReloadEvent::FileUpdated {
            path: path.to_string(),
            relative_path: relative_path.to_string(),
            content,
        })
    }

    fn on_file_create(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        self.forward(HotReloadEvent::FileCreated {
            path: path.to_string(),
            relative_path: relative_path.to_string(),
            content,
        })
    }

    fn on_file_delete(&self, path: &str, relative_path: &str) -> ListenerResult {
        self.forward(HotReloadEvent::FileDeleted {
            path: path.to_string(),
            relative_path: relative_path.to_string(),
        })
    }

    fn on_file_rename(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.forward(HotReloadEvent::FileRenamed {
            old_path: old_path.to_string(),
            old_relative_path: old_relative_path.to_string(),
            new_path: new_path.to_string(),
            new_relative_path: new_relative_path.to_string(),
        })
    }

    fn on_file_move(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.forward(HotReloadEvent::FileMoved {
            old_path: old_path.to_string(),
            old_relative_path: old_relative_path.to_string(),
            new_path: new_path.to_string(),
            new_relative_path: new_relative_path.to_string(),
        })
    }

    fn on_reload(
        &self,
        entry_path: &str,
        relative_entry_path: &str,
        params: &str,
    ) -> ListenerResult {
        self.forward(HotReloadEvent::Reload {
            entry_path: entry_path.to_string(),
            relative_entry_path: relative_entry_path.to_string(),
            params: params.to_string(),
        })
    }

    fn on_ip_changed(&self, address: &str) -> ListenerResult {
        self.forward(HotReloadEvent::IpChanged {
            address: address.to_string(),
        })
    }
}
