//! Connection lifecycle and command dispatch.
//!
//! [`HotReloadServer`] owns the `Idle -> Starting -> Running -> Stopping -> Idle`
//! cycle. Each successful [`HotReloadServer::start`] spawns one worker task that
//! pulls frames from the attached [`Transport`](crate::transport::Transport),
//! decodes them, and hands them to the [`Dispatcher`], which calls the
//! listener. Outbound `log`/`error` commands bypass the worker and go straight
//! to the transport.
//!
//! # Guarantees
//!
//! - At most one worker exists at a time; concurrent `start` calls have a single winner.
//! - Listener callbacks from one connection never overlap and follow frame order.
//! - Every `on_connected` is followed by exactly one `on_disconnected`, whatever ended
//!   the session, and before the next session can report `on_connected`.
//! - A malformed frame or a failing listener callback is logged and skipped.

mod connection_state;
mod dispatcher;
mod handle;
mod server;

pub use connection_state::ConnectionState;
pub use dispatcher::{Dispatched, Dispatcher, RELOAD_SERIAL_PARAM, reload_params};
pub use handle::LoopExit;
pub use server::HotReloadServer;

pub(crate) use connection_state::StateCell;
