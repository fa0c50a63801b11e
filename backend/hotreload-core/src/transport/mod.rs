//! The bidirectional channel between this process and the development host.
//!
//! The core never opens connections itself. Whoever owns the physical link
//! (a socket, a USB bridge, an in-process queue in tests) implements
//! [`Transport`] and hands it to
//! [`HotReloadServer::set_transport`](crate::hotreload::HotReloadServer::set_transport).
//!
//! # Contract
//!
//! - [`Transport::send`] must not block the caller. Queue the frame and return.
//! - [`Transport::take`] resolves with the next inbound frame in receipt order,
//!   with `Ok(None)` once the channel is permanently closed, or with an error
//!   when the link fails.
//! - The future returned by `take` must be cancel safe: the worker drops it when
//!   the connection is stopped, and a frame that was partly read at that point
//!   must still be delivered by the next `take`.

mod channel;
mod tcp;

pub use channel::{ChannelPeer, ChannelTransport, channel_transport};
pub use tcp::{MAX_FRAME_LENGTH, TcpTransport, encode_frame};

pub(crate) use tcp::parse_frame;

use crate::error::TransportError;

use futures_util::future::BoxFuture;
use prost::bytes::Bytes;

/// One unit on the wire: a magic tag byte plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }
}

pub trait Transport: Send + Sync {
    /// Queue a frame for the development host. Fire and forget.
    fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Wait for the next inbound frame.
    fn take(&self) -> BoxFuture<'_, Result<Option<Frame>, TransportError>>;
}
