//! In-process transport backed by unbounded tokio channels.
//!
//! Useful when the development host bridge lives in the same process, and as
//! the transport of choice in tests: the [`ChannelPeer`] plays the host side.

use crate::codec;
use crate::command::Command;
use crate::error::{CoreError, TransportError};
use crate::transport::{Frame, Transport};

use common::ErrorLocation;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};

/// Device side of an in-process link.
pub struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    outbound: mpsc::UnboundedSender<Frame>,
}

/// Host side of an in-process link.
pub struct ChannelPeer {
    inbound: Option<mpsc::UnboundedSender<Frame>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

/// Create a connected transport/peer pair.
pub fn channel_transport() -> (ChannelTransport, ChannelPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let transport = ChannelTransport {
        inbound: Mutex::new(inbound_rx),
        outbound: outbound_tx,
    };
    let peer = ChannelPeer {
        inbound: Some(inbound_tx),
        outbound: outbound_rx,
    };

    (transport, peer)
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed {
            message: "peer dropped the outbound receiver".to_string(),
            location: ErrorLocation::caller(),
        })
    }

    fn take(&self) -> BoxFuture<'_, Result<Option<Frame>, TransportError>> {
        async move { Ok::<_, TransportError>(self.inbound.lock().await.recv().await) }.boxed()
    }
}

impl ChannelPeer {
    /// Deliver a raw frame to the device side.
    pub fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        let sender = self.inbound.as_ref().ok_or_else(|| TransportError::Closed {
            message: "peer already closed".to_string(),
            location: ErrorLocation::caller(),
        })?;

        sender.send(frame).map_err(|_| TransportError::Closed {
            message: "transport dropped the inbound receiver".to_string(),
            location: ErrorLocation::caller(),
        })
    }

    /// Encode and deliver a command to the device side.
    pub fn send_command(&self, command: &Command) -> Result<(), CoreError> {
        let frame = codec::encode(command, "")?;
        self.send_frame(frame)?;
        Ok(())
    }

    /// Next frame the device side sent, or `None` once the transport is gone.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Close the inbound direction. Pending frames are still delivered, then
    /// `take` reports closure.
    pub fn close(&mut self) {
        self.inbound = None;
    }
}
