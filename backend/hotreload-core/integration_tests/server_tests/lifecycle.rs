use crate::server_tests::helpers::{
    assert_no_event, attached_server, disconnect_reason, next_event, running_server,
    wait_for_state,
};

use hotreload_core::config::{DecodeConfig, HotReloadConfig};
use hotreload_core::hotreload::{ConnectionState, HotReloadServer, LoopExit};
use hotreload_core::listener::{ConnectionKind, EventChannelListener, HotReloadEvent};
use hotreload_core::transport::Frame;

use std::sync::Arc;

/// **VALUE**: Verifies that racing `start` calls produce exactly one worker.
///
/// **WHY THIS MATTERS**: Two workers would pull frames from the same transport and deliver
/// file events out of order, or twice.
///
/// **BUG THIS CATCHES**: Would catch a check-then-set on the state instead of a single
/// compare-and-swap.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_idle_server_when_started_concurrently_then_one_connection() {
    // GIVEN: An idle server with a transport
    let mut session = attached_server(&HotReloadConfig::default());

    // WHEN: Eight tasks call start at once
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let server = session.server.clone();
            tokio::spawn(async move { server.start() })
        })
        .collect();
    let mut winners = 0;
    for task in tasks {
        if task.await.expect("start task panicked") {
            winners += 1;
        }
    }

    // THEN: One winner and one Connected event
    assert_eq!(winners, 1, "Exactly one start should win");
    let event = next_event(&mut session.events).await;
    assert!(matches!(event, HotReloadEvent::Connected { .. }));
    assert_no_event(&mut session.events).await;
    assert_eq!(session.server.state(), ConnectionState::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_server_when_started_again_then_rejected() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    assert!(!session.server.start());
    assert_no_event(&mut session.events).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_idle_server_when_stopped_then_noop() {
    let mut session = attached_server(&HotReloadConfig::default());

    assert!(!session.server.stop());
    assert!(session.server.shutdown().await.is_none());

    assert_eq!(session.server.state(), ConnectionState::Idle);
    assert_no_event(&mut session.events).await;
}

/// **VALUE**: Verifies that the configured status endpoint reaches both connection callbacks.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_server_when_stopped_then_disconnected_once_with_status_endpoint() {
    // GIVEN: The default status endpoint
    let mut session = attached_server(&HotReloadConfig::default());
    assert!(session.server.start());
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::Connected {
            kind: ConnectionKind::Net,
            host: "127.0.0.1".to_string(),
            port: 8176,
        }
    );
    wait_for_state(&session.server, ConnectionState::Running).await;

    // WHEN: Stopped
    assert!(session.server.stop());

    // THEN: One Disconnected, then Idle
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::Disconnected {
            kind: ConnectionKind::Net,
            host: "127.0.0.1".to_string(),
            port: 8176,
            reason: "stopped".to_string(),
        }
    );
    wait_for_state(&session.server, ConnectionState::Idle).await;
    assert_no_event(&mut session.events).await;
}

/// **VALUE**: Verifies that a second stop while the first is in flight does nothing.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_stopping_server_when_stopped_again_then_single_disconnect() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    let first = session.server.stop();
    let second = session.server.stop();

    assert!(first);
    assert!(!second);
    assert_eq!(disconnect_reason(next_event(&mut session.events).await), "stopped");
    wait_for_state(&session.server, ConnectionState::Idle).await;
    assert_no_event(&mut session.events).await;
}

/// **VALUE**: Verifies that `shutdown` waits for the worker and reports why it ended.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_server_when_shutdown_then_returns_stopped_after_idle() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    let exit = session.server.shutdown().await;

    assert_eq!(exit, Some(LoopExit::Stopped));
    assert_eq!(session.server.state(), ConnectionState::Idle);
    assert_eq!(disconnect_reason(next_event(&mut session.events).await), "stopped");
}

/// **VALUE**: Verifies that the peer closing the link ends the session cleanly.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_server_when_peer_closes_then_disconnected_and_idle() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    session.peer.close();

    assert_eq!(
        disconnect_reason(next_event(&mut session.events).await),
        "transport closed"
    );
    wait_for_state(&session.server, ConnectionState::Idle).await;
    assert!(!session.server.stop(), "Nothing left to stop");
}

/// **VALUE**: Verifies the full cycle can repeat after returning to Idle.
///
/// **BUG THIS CATCHES**: Would catch a stale worker handle or a state stuck in Stopping that
/// blocks every later start.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_stopped_server_when_started_again_then_new_session_runs() {
    let mut session = running_server(&HotReloadConfig::default()).await;
    assert_eq!(session.server.shutdown().await, Some(LoopExit::Stopped));
    assert_eq!(disconnect_reason(next_event(&mut session.events).await), "stopped");

    // WHEN: Restarted
    assert!(session.server.start());

    // THEN: A fresh Connected, and the worker still takes frames
    assert!(matches!(
        next_event(&mut session.events).await,
        HotReloadEvent::Connected { .. }
    ));
    wait_for_state(&session.server, ConnectionState::Running).await;
    session
        .peer
        .send_command(&hotreload_core::command::Command::IpAddressChanged {
            address: "10.1.1.1".to_string(),
        })
        .unwrap();
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::IpChanged {
            address: "10.1.1.1".to_string()
        }
    );
}

/// **VALUE**: Verifies that starting without a transport still pairs Connected with
/// Disconnected and returns to Idle.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_no_transport_when_started_then_session_ends_immediately() {
    // GIVEN: A server with nothing attached
    let (listener, mut events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        &HotReloadConfig::default(),
    );
    assert!(!server.has_transport());

    // WHEN: Started
    assert!(server.start());

    // THEN: Connected, then Disconnected with the reason
    assert!(matches!(
        next_event(&mut events).await,
        HotReloadEvent::Connected { .. }
    ));
    assert_eq!(
        disconnect_reason(next_event(&mut events).await),
        "no transport attached"
    );
    wait_for_state(&server, ConnectionState::Idle).await;
}

/// **VALUE**: Verifies the configured decode-failure limit ends a session that only receives
/// garbage, and that a good frame resets the count.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_failure_limit_when_consecutive_bad_frames_then_session_ends() {
    // GIVEN: A limit of two consecutive failures
    let config = HotReloadConfig {
        decode: DecodeConfig {
            max_consecutive_failures: Some(2),
        },
        ..HotReloadConfig::default()
    };
    let mut session = running_server(&config).await;

    // WHEN: bad, good, bad, bad
    session.peer.send_frame(Frame::new(0x7f, vec![1, 2])).unwrap();
    session
        .peer
        .send_command(&hotreload_core::command::Command::IpAddressChanged {
            address: "10.0.0.9".to_string(),
        })
        .unwrap();
    session.peer.send_frame(Frame::new(0x7f, vec![3])).unwrap();
    session.peer.send_frame(Frame::new(0x7f, vec![4])).unwrap();

    // THEN: The good frame is delivered, the second run of failures ends the session
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::IpChanged {
            address: "10.0.0.9".to_string()
        }
    );
    assert_eq!(
        disconnect_reason(next_event(&mut session.events).await),
        "2 consecutive frames failed to decode"
    );
    wait_for_state(&session.server, ConnectionState::Idle).await;
}

/// **VALUE**: Verifies that detaching the transport mid-session ends the worker once it
/// next looks for a frame.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_server_when_transport_detached_and_frame_pending_then_session_ends() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    // WHEN: Detached, then the old link delivers one last frame
    session.server.set_transport(None);
    session
        .peer
        .send_command(&hotreload_core::command::Command::Log {
            text: "late".to_string(),
        })
        .unwrap();

    // THEN: The worker leaves after that take
    assert_eq!(
        disconnect_reason(next_event(&mut session.events).await),
        "no transport attached"
    );
    wait_for_state(&session.server, ConnectionState::Idle).await;
}
