//! Frames over a TCP stream to the development host.
//!
//! Wire layout of one frame: `tag: u8 | length: u32 big endian | payload`.
//!
//! Reads go through a persistent buffer so that a `take` cancelled in the
//! middle of a frame loses nothing. Writes are handed to a dedicated writer
//! task, which keeps [`Transport::send`] non-blocking.

use crate::error::TransportError;
use crate::transport::{Frame, Transport};

use common::ErrorLocation;

use std::net::SocketAddr;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, error, info};
use prost::bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const HEADER_LENGTH: usize = 5;
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

pub struct TcpTransport {
    reader: Mutex<FrameReader>,
    outbound: mpsc::UnboundedSender<Frame>,
    peer: SocketAddr,
}

struct FrameReader {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

impl TcpTransport {
    /// Connect to the development host at `address` (`ip:port`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the connection cannot be established.
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address).await?;
        info!("Connected to development host at {}", address);
        Self::from_stream(stream)
    }

    /// Wrap an already connected stream.
    ///
    /// Spawns the writer task, so this must run inside a tokio runtime.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_frames(write_half, outbound_rx, peer));

        Ok(Self {
            reader: Mutex::new(FrameReader {
                half: read_half,
                buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            }),
            outbound,
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed {
            message: format!("writer for {} has stopped", self.peer),
            location: ErrorLocation::caller(),
        })
    }

    fn take(&self) -> BoxFuture<'_, Result<Option<Frame>, TransportError>> {
        async move { self.reader.lock().await.next_frame().await }.boxed()
    }
}

impl FrameReader {
    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            if let Some(frame) = parse_frame(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if self.half.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::Truncated {
                    buffered: self.buffer.len(),
                    location: ErrorLocation::caller(),
                });
            }
        }
    }
}

async fn write_frames(
    mut half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    peer: SocketAddr,
) {
    while let Some(frame) = outbound.recv().await {
        let written = match encode_frame(&frame) {
            Ok(bytes) => half.write_all(&bytes).await.map_err(TransportError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            error!("Failed to write frame to {}: {}", peer, e);
            break;
        }
    }

    debug!("Frame writer for {} finished", peer);
}

/// Serialize a frame with its five byte header.
///
/// # Errors
///
/// Returns [`TransportError::FrameTooLarge`] if the payload exceeds [`MAX_FRAME_LENGTH`].
pub fn encode_frame(frame: &Frame) -> Result<BytesMut, TransportError> {
    let length = frame.payload.len();
    if length > MAX_FRAME_LENGTH {
        return Err(TransportError::FrameTooLarge {
            length,
            limit: MAX_FRAME_LENGTH,
            location: ErrorLocation::caller(),
        });
    }

    let mut bytes = BytesMut::with_capacity(HEADER_LENGTH + length);
    bytes.put_u8(frame.tag);
    bytes.put_u32(length as u32);
    bytes.put_slice(&frame.payload);
    Ok(bytes)
}

/// Split one complete frame off the front of `buffer`, if one is there.
pub(crate) fn parse_frame(buffer: &mut BytesMut) -> Result<Option<Frame>, TransportError> {
    if buffer.len() < HEADER_LENGTH {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]) as usize;
    if length > MAX_FRAME_LENGTH {
        return Err(TransportError::FrameTooLarge {
            length,
            limit: MAX_FRAME_LENGTH,
            location: ErrorLocation::caller(),
        });
    }

    let total = HEADER_LENGTH + length;
    if buffer.len() < total {
        buffer.reserve(total - buffer.len());
        return Ok(None);
    }

    let tag = buffer.get_u8();
    buffer.advance(HEADER_LENGTH - 1);
    let payload = buffer.split_to(length).freeze();

    Ok(Some(Frame { tag, payload }))
}
