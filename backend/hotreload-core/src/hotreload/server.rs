use crate::codec;
use crate::command::{Command, EntryDescriptor};
use crate::config::{HotReloadConfig, StatusConfig};
use crate::hotreload::StateCell;
use crate::hotreload::connection_state::ConnectionState;
use crate::hotreload::dispatcher::{Dispatched, Dispatcher};
use crate::hotreload::handle::{LoopExit, WorkerHandle};
use crate::listener::{ConnectionKind, HotReloadListener};
use crate::transport::Transport;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The hot-reload connection controller.
///
/// Construct one at application start and pass clones to whoever needs it;
/// all clones share the same state. Every method is callable from any thread.
///
/// # Examples
///
/// ```no_run
/// use hotreload_core::config::HotReloadConfig;
/// use hotreload_core::hotreload::HotReloadServer;
/// use hotreload_core::listener::EventChannelListener;
/// use hotreload_core::transport::channel_transport;
///
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let (listener, mut events) = EventChannelListener::new();
///     let server = HotReloadServer::new(
///         tokio::runtime::Handle::current(),
///         Arc::new(listener),
///         &HotReloadConfig::default(),
///     );
///
///     let (transport, _peer) = channel_transport();
///     server.set_transport(Some(Arc::new(transport)));
///     server.start();
///
///     while let Some(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// }
/// ```
#[derive(Clone)]
pub struct HotReloadServer {
    inner: Arc<Inner>,
}

struct Inner {
    state: StateCell,
    runtime: Handle,
    dispatcher: Dispatcher,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    worker: Mutex<Option<WorkerHandle>>,
    serial: RwLock<String>,
    status: StatusConfig,
    max_consecutive_failures: Option<u32>,
}

impl HotReloadServer {
    /// Create an idle server. Workers are spawned on `runtime`.
    pub fn new(
        runtime: Handle,
        listener: Arc<dyn HotReloadListener>,
        config: &HotReloadConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: StateCell::new(),
                runtime,
                dispatcher: Dispatcher::new(listener, config.reply_to_ping),
                transport: RwLock::new(None),
                worker: Mutex::new(None),
                serial: RwLock::new(config.serial.clone()),
                status: config.status.clone(),
                max_consecutive_failures: config.decode.max_consecutive_failures,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Attach, replace or (with `None`) detach the transport.
    ///
    /// A running worker picks up the change before its next `take`.
    pub fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        let attached = transport.is_some();
        *self
            .inner
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transport;
        info!(
            "Transport {}",
            if attached { "attached" } else { "detached" }
        );
    }

    pub fn has_transport(&self) -> bool {
        self.inner.transport().is_some()
    }

    /// Start the worker if the connection is idle.
    ///
    /// Returns `false` without side effects in any other state.
    pub fn start(&self) -> bool {
        let Some(generation) = self.inner.state.begin_start() else {
            debug!("Start ignored, connection is {:?}", self.inner.state.get());
            return false;
        };

        let session = Uuid::new_v4();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();

        // Store the handle BEFORE spawning so a stop can always find it
        *self.inner.worker_slot() = Some(WorkerHandle::new(generation, shutdown_tx, finished_rx));

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let exit = run_session(inner, generation, session, shutdown_rx).await;
            let _ = finished_tx.send(exit);
        });

        info!("[{session}] Hot reload worker spawned");
        true
    }

    /// Interrupt the worker if the connection is running.
    ///
    /// Returns immediately. The worker reports `on_disconnected` and returns the
    /// connection to `Idle` on its own. Returns `false` in any other state.
    pub fn stop(&self) -> bool {
        let Some(generation) = self.inner.state.begin_stop() else {
            debug!("Stop ignored, connection is {:?}", self.inner.state.get());
            return false;
        };

        info!("Stopping hot reload connection");
        if let Some(handle) = self.inner.take_worker(generation) {
            handle.interrupt();
        }
        true
    }

    /// Stop the running worker and wait until it has finished.
    ///
    /// Returns why the session ended, or `None` if nothing was running.
    pub async fn shutdown(&self) -> Option<LoopExit> {
        let generation = self.inner.state.begin_stop()?;
        let handle = self.inner.take_worker(generation)?;
        Some(handle.interrupt().await.unwrap_or(LoopExit::Aborted))
    }

    /// Send a log line to the development host. No-op without a transport.
    pub fn log(&self, text: impl Into<String>) {
        self.inner.write_command(&Command::Log { text: text.into() });
    }

    /// Send an error line to the development host. No-op without a transport.
    pub fn error(&self, text: impl Into<String>) {
        self.inner
            .write_command(&Command::Error { text: text.into() });
    }

    /// Report the real network endpoint of the development host to the listener.
    pub fn start_net_client(&self, host: &str, port: u16) {
        if !self.has_transport() {
            debug!("Net client {host}:{port} not reported, no transport attached");
            return;
        }
        self.inner
            .dispatcher
            .listener()
            .on_connected(ConnectionKind::Net, host, port);
    }

    pub fn set_serial(&self, serial: impl Into<String>) {
        *self
            .inner
            .serial
            .write()
            .unwrap_or_else(PoisonError::into_inner) = serial.into();
    }

    pub fn serial(&self) -> String {
        self.inner.serial()
    }

    pub fn entry(&self) -> Option<EntryDescriptor> {
        self.inner.dispatcher.entry()
    }

    pub fn entry_file_path(&self) -> Option<String> {
        self.entry().map(|entry| entry.entry.absolute)
    }

    pub fn relative_entry_file_path(&self) -> Option<String> {
        self.entry().map(|entry| entry.entry.relative)
    }

    pub fn params(&self) -> Option<String> {
        self.entry().map(|entry| entry.params)
    }
}

impl Inner {
    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn serial(&self) -> String {
        self.serial
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the worker handle, but only if it belongs to `generation`.
    fn take_worker(&self, generation: u64) -> Option<WorkerHandle> {
        let mut slot = self.worker_slot();
        if slot
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
        {
            slot.take()
        } else {
            None
        }
    }

    fn write_command(&self, command: &Command) {
        let Some(transport) = self.transport() else {
            debug!("No transport attached, dropping {}", command.name());
            return;
        };

        let frame = match codec::encode(command, &self.serial()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Not sending {}: {}", command.name(), e);
                return;
            }
        };
        if let Err(e) = transport.send(frame) {
            warn!("Failed to send {}: {}", command.name(), e);
        }
    }
}

/// Notifies `on_disconnected` and returns the state to `Idle` when dropped, so
/// both happen exactly once even if the session panics or is cancelled.
struct SessionGuard {
    inner: Arc<Inner>,
    generation: u64,
    session: Uuid,
    exit: Option<LoopExit>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let exit = self.exit.take().unwrap_or(LoopExit::Aborted);
        let reason = exit.to_string();
        let status = &self.inner.status;
        let listener = self.inner.dispatcher.listener();

        let notified = catch_unwind(AssertUnwindSafe(|| {
            listener.on_disconnected(status.kind, &status.host, status.port, &reason)
        }));
        if notified.is_err() {
            error!("[{}] Listener panicked in on_disconnected", self.session);
        }

        drop(self.inner.take_worker(self.generation));
        self.inner.state.finish(self.generation);
        info!("[{}] Hot reload connection idle: {}", self.session, reason);
    }
}

async fn run_session(
    inner: Arc<Inner>,
    generation: u64,
    session: Uuid,
    shutdown: oneshot::Receiver<()>,
) -> LoopExit {
    let mut guard = SessionGuard {
        inner: Arc::clone(&inner),
        generation,
        session,
        exit: None,
    };

    if !inner.state.mark_running(generation) {
        warn!("[{session}] Connection left Starting before the worker ran");
    }

    let status = &inner.status;
    info!(
        "[{session}] Hot reload connection running ({} {}:{})",
        status.kind, status.host, status.port
    );
    inner
        .dispatcher
        .listener()
        .on_connected(status.kind, &status.host, status.port);

    let exit = receive_loop(&inner, session, shutdown).await;
    guard.exit = Some(exit.clone());
    exit
}

async fn receive_loop(
    inner: &Inner,
    session: Uuid,
    mut shutdown: oneshot::Receiver<()>,
) -> LoopExit {
    let mut decode_failures: u32 = 0;

    loop {
        let Some(transport) = inner.transport() else {
            warn!("[{session}] No transport attached, leaving receive loop");
            return LoopExit::NoTransport;
        };

        let taken = tokio::select! {
            biased;
            _ = &mut shutdown => return LoopExit::Stopped,
            taken = transport.take() => taken,
        };

        let frame = match taken {
            Ok(Some(frame)) => frame,
            Ok(None) => return LoopExit::Closed,
            Err(e) => {
                error!("[{session}] Transport failed: {e}");
                return LoopExit::TransportFailed(e.to_string());
            }
        };

        let command = match codec::decode(&frame) {
            Ok(command) => {
                decode_failures = 0;
                command
            }
            Err(e) => {
                decode_failures += 1;
                warn!("[{session}] Dropping malformed frame ({decode_failures} in a row): {e}");
                if inner
                    .max_consecutive_failures
                    .is_some_and(|limit| decode_failures >= limit)
                {
                    return LoopExit::DecodeFailures(decode_failures);
                }
                continue;
            }
        };

        debug!("[{session}] Dispatching {}", command.name());
        match inner.dispatcher.dispatch(command) {
            Ok(Dispatched::Reply(reply)) => inner.write_command(&reply),
            Ok(Dispatched::Delivered | Dispatched::Ignored) => {}
            Err(e) => error!("[{session}] {e}"),
        }
    }
}
