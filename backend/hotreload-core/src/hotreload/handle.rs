//! What the server keeps about its running worker.

use std::fmt::{Display, Formatter, Result as FormatResult};

use tokio::sync::oneshot;

/// Why a worker session ended. Its `Display` text is the `reason` passed to
/// `on_disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// `stop()` or `shutdown()` interrupted the worker.
    Stopped,
    /// The transport reported permanent closure.
    Closed,
    /// No transport was attached when the worker looked for one.
    NoTransport,
    /// The transport failed while waiting for a frame.
    TransportFailed(String),
    /// Too many consecutive frames failed to decode.
    DecodeFailures(u32),
    /// The worker was torn down without finishing, by a panic or runtime shutdown.
    Aborted,
}

impl Display for LoopExit {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            LoopExit::Stopped => formatter.write_str("stopped"),
            LoopExit::Closed => formatter.write_str("transport closed"),
            LoopExit::NoTransport => formatter.write_str("no transport attached"),
            LoopExit::TransportFailed(message) => write!(formatter, "transport failed: {message}"),
            LoopExit::DecodeFailures(count) => {
                write!(formatter, "{count} consecutive frames failed to decode")
            }
            LoopExit::Aborted => formatter.write_str("worker aborted"),
        }
    }
}

pub(crate) struct WorkerHandle {
    pub(crate) generation: u64,
    shutdown: oneshot::Sender<()>,
    finished: oneshot::Receiver<LoopExit>,
}

impl WorkerHandle {
    pub(crate) fn new(
        generation: u64,
        shutdown: oneshot::Sender<()>,
        finished: oneshot::Receiver<LoopExit>,
    ) -> Self {
        Self {
            generation,
            shutdown,
            finished,
        }
    }

    /// Signal the worker and hand back its completion channel.
    pub(crate) fn interrupt(self) -> oneshot::Receiver<LoopExit> {
        // Fails only if the worker has already finished.
        let _ = self.shutdown.send(());
        self.finished
    }
}
