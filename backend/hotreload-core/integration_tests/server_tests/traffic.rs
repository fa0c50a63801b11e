use crate::server_tests::helpers::{
    EVENT_TIMEOUT, QUIET_PERIOD, assert_no_event, attached_server, next_event, running_server,
    wait_for_state,
};

use hotreload_core::codec;
use hotreload_core::command::{Command, EntryDescriptor, FilePath};
use hotreload_core::config::HotReloadConfig;
use hotreload_core::error::ListenerError;
use hotreload_core::hotreload::{ConnectionState, HotReloadServer};
use hotreload_core::listener::{
    ConnectionKind, EventChannelListener, HotReloadEvent, HotReloadListener, ListenerResult,
};
use hotreload_core::transport::{ChannelPeer, Frame, channel_transport};

use protocol::{Instruction, MAGIC_MESSAGE, MAGIC_PONG, MessageHeader};

use std::sync::Arc;

use prost::Message as ProstMessage;
use prost::bytes::Bytes;
use tokio::time::timeout;

fn update(relative: &str, data: &'static [u8]) -> Command {
    Command::FileUpdate {
        file: FilePath::new(format!("/project/{relative}"), relative),
        data: Bytes::from_static(data),
    }
}

async fn next_outbound(peer: &mut ChannelPeer) -> Frame {
    timeout(EVENT_TIMEOUT, peer.recv_frame())
        .await
        .expect("Timed out waiting for outbound frame")
        .expect("Outbound channel closed")
}

/// **VALUE**: Verifies that file events arrive in frame order and a malformed frame in the
/// middle is skipped without ending the session.
///
/// **WHY THIS MATTERS**: A save, rename and save of the same file must land on the device in
/// that order or the running script sees stale code.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_frames_with_garbage_between_when_received_then_delivered_in_order() {
    // GIVEN: A running session
    let mut session = running_server(&HotReloadConfig::default()).await;

    // WHEN: F1, garbage, F2, truncated protobuf, F3
    session.peer.send_command(&update("a.lua", b"1")).unwrap();
    session
        .peer
        .send_frame(Frame::new(0x42, Bytes::from_static(b"noise")))
        .unwrap();
    session.peer.send_command(&update("b.lua", b"2")).unwrap();
    session
        .peer
        .send_frame(Frame::new(MAGIC_MESSAGE, vec![0x0a, 0x10, 0x08]))
        .unwrap();
    session.peer.send_command(&update("c.lua", b"3")).unwrap();

    // THEN: Exactly F1, F2, F3 and the session is still up
    for (relative, data) in [("a.lua", "1"), ("b.lua", "2"), ("c.lua", "3")] {
        assert_eq!(
            next_event(&mut session.events).await,
            HotReloadEvent::FileUpdated {
                path: format!("/project/{relative}"),
                relative_path: relative.to_string(),
                content: Bytes::from(data.to_string()),
            }
        );
    }
    assert_no_event(&mut session.events).await;
    assert!(session.server.stop());
}

/// **VALUE**: Verifies the entry file and reload exchange end to end, including the stored
/// entry accessors.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_entry_file_when_reload_received_then_on_reload_has_serial_params() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    // WHEN: Entry file then reload #7
    session
        .peer
        .send_command(&Command::EntryFile(EntryDescriptor::new(
            "/a/main.lua",
            "main.lua",
            "x=1",
        )))
        .unwrap();
    session
        .peer
        .send_command(&Command::Reload { serial_num: 7 })
        .unwrap();

    // THEN: on_reload with the serial appended, and the accessors reflect the entry
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::Reload {
            entry_path: "/a/main.lua".to_string(),
            relative_entry_path: "main.lua".to_string(),
            params: "x=1&hotReload_SerialNum=7".to_string(),
        }
    );
    assert_eq!(session.server.entry_file_path().as_deref(), Some("/a/main.lua"));
    assert_eq!(
        session.server.relative_entry_file_path().as_deref(),
        Some("main.lua")
    );
    assert_eq!(session.server.params().as_deref(), Some("x=1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_rename_and_move_when_received_then_each_fires_once() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    session
        .peer
        .send_command(&Command::FileRename {
            from: FilePath::new("/a/b.lua", "b.lua"),
            to: FilePath::new("/a/c.lua", "c.lua"),
        })
        .unwrap();
    session
        .peer
        .send_command(&Command::FileMove {
            from: FilePath::new("/a/c.lua", "c.lua"),
            to: FilePath::new("/a/lib/c.lua", "lib/c.lua"),
        })
        .unwrap();

    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::FileRenamed {
            old_path: "/a/b.lua".to_string(),
            old_relative_path: "b.lua".to_string(),
            new_path: "/a/c.lua".to_string(),
            new_relative_path: "c.lua".to_string(),
        }
    );
    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::FileMoved {
            old_path: "/a/c.lua".to_string(),
            old_relative_path: "c.lua".to_string(),
            new_path: "/a/lib/c.lua".to_string(),
            new_relative_path: "lib/c.lua".to_string(),
        }
    );
    assert_no_event(&mut session.events).await;
}

/// **VALUE**: Verifies that outbound log and error lines carry the configured serial.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_serial_when_logging_then_outbound_frames_carry_it() {
    // GIVEN: A server with a serial, not even started
    let config = HotReloadConfig {
        serial: "dev-1".to_string(),
        ..HotReloadConfig::default()
    };
    let mut session = attached_server(&config);

    // WHEN: Log, then the serial changes, then error
    session.server.log("hello");
    session.server.set_serial("dev-2");
    session.server.error("boom");

    // THEN: Both frames go out in order with the serial of the moment
    let log = next_outbound(&mut session.peer).await;
    let error = next_outbound(&mut session.peer).await;

    assert_eq!(
        codec::decode(&log).unwrap(),
        Command::Log {
            text: "hello".to_string()
        }
    );
    assert_eq!(
        codec::decode(&error).unwrap(),
        Command::Error {
            text: "boom".to_string()
        }
    );

    let log_header = MessageHeader::decode(log.payload.clone()).unwrap();
    let error_header = MessageHeader::decode(error.payload.clone()).unwrap();
    let log_base = log_header.basecommand.unwrap();
    let error_base = error_header.basecommand.unwrap();
    assert_eq!(log_base.serial_number, "dev-1");
    assert_eq!(log_base.instruction, Instruction::Log as i32);
    assert_eq!(error_base.serial_number, "dev-2");
    assert_eq!(session.server.serial(), "dev-2");
}

/// **VALUE**: Verifies that logging without a transport is a silent no-op.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_no_transport_when_logging_then_nothing_happens() {
    let (listener, mut events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        &HotReloadConfig::default(),
    );

    server.log("dropped");
    server.error("dropped");
    server.start_net_client("10.0.0.2", 9000);

    assert_no_event(&mut events).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_ping_when_received_then_pong_sent_back() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    session.peer.send_command(&Command::Ping).unwrap();

    let reply = next_outbound(&mut session.peer).await;
    assert_eq!(reply.tag, MAGIC_PONG);
    assert_eq!(codec::decode(&reply).unwrap(), Command::Pong);
    assert_no_event(&mut session.events).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_ping_replies_disabled_when_ping_received_then_silent() {
    let config = HotReloadConfig {
        reply_to_ping: false,
        ..HotReloadConfig::default()
    };
    let mut session = running_server(&config).await;

    session.peer.send_command(&Command::Ping).unwrap();
    session
        .peer
        .send_command(&Command::IpAddressChanged {
            address: "1.2.3.4".to_string(),
        })
        .unwrap();

    // The ip event proves the ping was processed first
    assert!(matches!(
        next_event(&mut session.events).await,
        HotReloadEvent::IpChanged { .. }
    ));
    assert!(
        timeout(QUIET_PERIOD, session.peer.recv_frame())
            .await
            .is_err(),
        "No pong expected"
    );
}

/// **VALUE**: Verifies that instruction codes from a newer host are skipped quietly.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_unknown_instruction_when_received_then_ignored_and_session_continues() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    session
        .peer
        .send_command(&Command::Unsupported { instruction: 4242 })
        .unwrap();
    session
        .peer
        .send_command(&Command::FileRemove {
            file: FilePath::new("/a/x.lua", "x.lua"),
        })
        .unwrap();

    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::FileDeleted {
            path: "/a/x.lua".to_string(),
            relative_path: "x.lua".to_string(),
        }
    );
}

/// **VALUE**: Verifies that `start_net_client` reports the real endpoint to the listener.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_transport_when_net_client_started_then_connected_with_real_endpoint() {
    let mut session = attached_server(&HotReloadConfig::default());

    session.server.start_net_client("192.168.0.10", 8176);

    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::Connected {
            kind: ConnectionKind::Net,
            host: "192.168.0.10".to_string(),
            port: 8176,
        }
    );
}

/// Forwards to an [`EventChannelListener`], except that updates to `broken.lua` fail and
/// updates to `explode.lua` panic.
struct FlakyListener {
    inner: EventChannelListener,
}

impl HotReloadListener for FlakyListener {
    fn on_connected(&self, kind: ConnectionKind, host: &str, port: u16) {
        self.inner.on_connected(kind, host, port);
    }

    fn on_disconnected(&self, kind: ConnectionKind, host: &str, port: u16, reason: &str) {
        self.inner.on_disconnected(kind, host, port, reason);
    }

    fn on_file_update(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        match relative_path {
            "broken.lua" => Err(ListenerError::new("disk full")),
            "explode.lua" => panic!("listener exploded on {relative_path}"),
            _ => self.inner.on_file_update(path, relative_path, content),
        }
    }

    fn on_file_create(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        self.inner.on_file_create(path, relative_path, content)
    }

    fn on_file_delete(&self, path: &str, relative_path: &str) -> ListenerResult {
        self.inner.on_file_delete(path, relative_path)
    }

    fn on_file_rename(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.inner
            .on_file_rename(old_path, old_relative_path, new_path, new_relative_path)
    }

    fn on_file_move(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.inner
            .on_file_move(old_path, old_relative_path, new_path, new_relative_path)
    }

    fn on_reload(
        &self,
        entry_path: &str,
        relative_entry_path: &str,
        params: &str,
    ) -> ListenerResult {
        self.inner.on_reload(entry_path, relative_entry_path, params)
    }

    fn on_ip_changed(&self, address: &str) -> ListenerResult {
        self.inner.on_ip_changed(address)
    }
}

/// **VALUE**: Verifies that a listener which fails or panics on one file does not stop the
/// worker from delivering the next frame.
///
/// **WHY THIS MATTERS**: The application's file handling is outside this crate's control. One
/// bad write on the device must not end hot reload for the rest of the session.
///
/// **BUG THIS CATCHES**: Would catch a worker that lets a listener error or panic escape the
/// read loop, which ends the session with a disconnect instead of logging and moving on.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_listener_failing_on_one_file_when_frames_follow_then_next_frame_delivered() {
    // GIVEN: A running session whose listener rejects some files
    let (inner, mut events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(FlakyListener { inner }),
        &HotReloadConfig::default(),
    );
    let (transport, peer) = channel_transport();
    server.set_transport(Some(Arc::new(transport)));
    assert!(server.start());
    assert!(matches!(
        next_event(&mut events).await,
        HotReloadEvent::Connected { .. }
    ));

    // WHEN: A failing update, a panicking update, then a good one
    peer.send_command(&update("broken.lua", b"x")).unwrap();
    peer.send_command(&update("explode.lua", b"y")).unwrap();
    peer.send_command(&update("good.lua", b"z")).unwrap();

    // THEN: Only the good update arrives and the session stays up
    assert_eq!(
        next_event(&mut events).await,
        HotReloadEvent::FileUpdated {
            path: "/project/good.lua".to_string(),
            relative_path: "good.lua".to_string(),
            content: Bytes::from_static(b"z"),
        }
    );
    assert_no_event(&mut events).await;
    wait_for_state(&server, ConnectionState::Running).await;
    assert!(server.stop());
}

/// **VALUE**: Verifies that a reload before any entry file still reaches the listener with
/// empty entry paths and the serial as params.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_no_entry_file_when_reload_received_then_listener_gets_serial_only() {
    let mut session = running_server(&HotReloadConfig::default()).await;

    session
        .peer
        .send_command(&Command::Reload { serial_num: 2 })
        .unwrap();

    assert_eq!(
        next_event(&mut session.events).await,
        HotReloadEvent::Reload {
            entry_path: String::new(),
            relative_entry_path: String::new(),
            params: "&hotReload_SerialNum=2".to_string(),
        }
    );
    assert_eq!(session.server.entry(), None);
}
