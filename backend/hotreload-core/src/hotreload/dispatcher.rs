use crate::command::{Command, EntryDescriptor};
use crate::error::{DispatchError, ListenerError};
use crate::listener::HotReloadListener;

use common::ErrorLocation;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};

/// Query parameter appended to the entry params on every reload.
pub const RELOAD_SERIAL_PARAM: &str = "hotReload_SerialNum";

/// What happened to a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A listener callback ran, or the entry descriptor was updated.
    Delivered,
    /// Nothing to do for this command.
    Ignored,
    /// The command must be answered on the outbound path.
    Reply(Command),
}

/// Routes decoded commands to listener callbacks and owns the entry descriptor.
pub struct Dispatcher {
    listener: Arc<dyn HotReloadListener>,
    entry: RwLock<Option<EntryDescriptor>>,
    reply_to_ping: bool,
}

impl Dispatcher {
    pub fn new(listener: Arc<dyn HotReloadListener>, reply_to_ping: bool) -> Self {
        Self {
            listener,
            entry: RwLock::new(None),
            reply_to_ping,
        }
    }

    pub fn listener(&self) -> &Arc<dyn HotReloadListener> {
        &self.listener
    }

    /// Most recent entry file, if one has been received.
    pub fn entry(&self) -> Option<EntryDescriptor> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route one command.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the listener callback failed or panicked.
    /// Neither affects later commands.
    pub fn dispatch(&self, command: Command) -> Result<Dispatched, DispatchError> {
        let name = command.name();

        match catch_unwind(AssertUnwindSafe(|| self.route(command))) {
            Ok(Ok(dispatched)) => Ok(dispatched),
            Ok(Err(source)) => Err(DispatchError::Listener {
                command: name,
                source,
            }),
            Err(payload) => Err(DispatchError::Panicked {
                command: name,
                message: panic_message(payload.as_ref()),
                location: ErrorLocation::caller(),
            }),
        }
    }

    fn route(&self, command: Command) -> Result<Dispatched, ListenerError> {
        let listener = self.listener.as_ref();

        match command {
            Command::FileUpdate { file, data } => {
                listener.on_file_update(&file.absolute, &file.relative, data)?;
            }
            Command::FileCreate { file, data } => {
                listener.on_file_create(&file.absolute, &file.relative, data)?;
            }
            Command::FileRemove { file } => {
                listener.on_file_delete(&file.absolute, &file.relative)?;
            }
            Command::FileRename { from, to } => {
                listener.on_file_rename(&from.absolute, &from.relative, &to.absolute, &to.relative)?;
            }
            Command::FileMove { from, to } => {
                listener.on_file_move(&from.absolute, &from.relative, &to.absolute, &to.relative)?;
            }
            Command::EntryFile(entry) => {
                info!(
                    "Entry file set to {} ({})",
                    entry.entry.relative, entry.entry.absolute
                );
                *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
            }
            Command::Reload { serial_num } => {
                let entry = self.entry().unwrap_or_else(|| {
                    warn!("Reload #{serial_num} received before any entry file");
                    EntryDescriptor::default()
                });
                let params = reload_params(&entry.params, serial_num);
                listener.on_reload(&entry.entry.absolute, &entry.entry.relative, &params)?;
            }
            Command::IpAddressChanged { address } => {
                listener.on_ip_changed(&address)?;
            }
            Command::Ping if self.reply_to_ping => return Ok(Dispatched::Reply(Command::Pong)),
            other => {
                debug!("No listener mapping for {}, ignoring", other.name());
                return Ok(Dispatched::Ignored);
            }
        }

        Ok(Dispatched::Delivered)
    }
}

/// Launch params for a reload: the entry params plus the reload serial.
///
/// The separator is always written, so empty params give `&hotReload_SerialNum=<n>`.
pub fn reload_params(params: &str, serial_num: u64) -> String {
    format!("{params}&{RELOAD_SERIAL_PARAM}={serial_num}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
