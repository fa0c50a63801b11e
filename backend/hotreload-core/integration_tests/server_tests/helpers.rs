//! Test helpers for server integration tests.
//!
//! Every test drives a real [`HotReloadServer`] over an in-process channel
//! transport, with the [`ChannelPeer`] playing the development host and an
//! [`EventChannelListener`] recording what the application would see.

use hotreload_core::config::HotReloadConfig;
use hotreload_core::hotreload::{ConnectionState, HotReloadServer};
use hotreload_core::listener::{EventChannelListener, HotReloadEvent};
use hotreload_core::transport::{ChannelPeer, channel_transport};

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, sleep, timeout};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

pub struct TestSession {
    pub server: HotReloadServer,
    pub peer: ChannelPeer,
    pub events: UnboundedReceiver<HotReloadEvent>,
}

/// Test helper: Build a server with a channel transport attached, not yet started.
pub fn attached_server(config: &HotReloadConfig) -> TestSession {
    let (listener, events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        config,
    );
    let (transport, peer) = channel_transport();
    server.set_transport(Some(Arc::new(transport)));

    TestSession {
        server,
        peer,
        events,
    }
}

/// Test helper: Build, start and wait for the `Connected` event.
pub async fn running_server(config: &HotReloadConfig) -> TestSession {
    let mut session = attached_server(config);
    assert!(session.server.start(), "Start from Idle should succeed");

    let event = next_event(&mut session.events).await;
    assert!(
        matches!(event, HotReloadEvent::Connected { .. }),
        "Expected Connected, got {event:?}"
    );
    wait_for_state(&session.server, ConnectionState::Running).await;
    session
}

/// Test helper: Next listener event, failing the test after [`EVENT_TIMEOUT`].
pub async fn next_event(events: &mut UnboundedReceiver<HotReloadEvent>) -> HotReloadEvent {
    timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("Timed out waiting for listener event")
        .expect("Listener event channel closed")
}

/// Test helper: Assert that no event arrives within [`QUIET_PERIOD`].
pub async fn assert_no_event(events: &mut UnboundedReceiver<HotReloadEvent>) {
    if let Ok(Some(event)) = timeout(QUIET_PERIOD, events.recv()).await {
        panic!("Expected no event, got {event:?}");
    }
}

/// Test helper: Poll until the server reaches `state`.
pub async fn wait_for_state(server: &HotReloadServer, state: ConnectionState) {
    timeout(EVENT_TIMEOUT, async {
        while server.state() != state {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Server never reached {state:?}, stuck in {:?}", server.state()));
}

/// Test helper: The disconnect reason of an event, panicking on anything else.
pub fn disconnect_reason(event: HotReloadEvent) -> String {
    match event {
        HotReloadEvent::Disconnected { reason, .. } => reason,
        other => panic!("Expected Disconnected, got {other:?}"),
    }
}
