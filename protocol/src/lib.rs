//! Wire payloads for the hot-reload protocol.
//!
//! These are plain prost messages with no behavior attached. Every command
//! message starts with a [`BaseCommand`] header at field 1, which lets a
//! receiver peek at the [`Instruction`] with [`MessageHeader`] before picking
//! the concrete message type to decode.
//!
//! ## Frame tags
//!
//! A frame on the transport is a one-byte tag plus the encoded message. Ping
//! and pong use their own tags; every other command travels under
//! [`MAGIC_MESSAGE`].

pub mod messages;

pub use messages::*;

/// Frame tag for keep-alive pings.
pub const MAGIC_PING: u8 = 0x01;

/// Frame tag for keep-alive pongs.
pub const MAGIC_PONG: u8 = 0x02;

/// Frame tag shared by every non-control command.
pub const MAGIC_MESSAGE: u8 = 0x03;

/// Version stamped into every outbound [`BaseCommand`].
pub const PROTOCOL_VERSION: u32 = 1;
