pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod hotreload;
pub mod listener;
pub mod transport;

#[cfg(test)]
mod tests;

/// Host reported to the listener for connection status display.
pub const STATUS_HOST: &str = "127.0.0.1";

/// Port reported to the listener for connection status display. Nothing binds it.
pub const STATUS_PORT: u16 = 8176;

pub const STATUS_ADDRESS: &str = const_format::concatcp!(STATUS_HOST, ":", STATUS_PORT);
