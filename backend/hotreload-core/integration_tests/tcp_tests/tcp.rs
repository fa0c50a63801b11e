//! The TCP transport against a fake development host on a loopback socket.

use hotreload_core::codec;
use hotreload_core::command::{Command, FilePath};
use hotreload_core::config::HotReloadConfig;
use hotreload_core::hotreload::{ConnectionState, HotReloadServer};
use hotreload_core::listener::{EventChannelListener, HotReloadEvent};
use hotreload_core::transport::{Frame, TcpTransport, Transport, encode_frame};

use protocol::MAGIC_MESSAGE;

use std::sync::Arc;

use prost::bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, sleep, timeout};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Test helper: Bind a fake host and connect a transport to it.
async fn connected_pair() -> (TcpTransport, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake host");
    let address = listener.local_addr().unwrap().to_string();

    let (transport, accepted) = tokio::join!(TcpTransport::connect(&address), listener.accept());
    let transport = transport.expect("Failed to connect transport");
    let (host_side, _) = accepted.expect("Failed to accept");

    (transport, host_side)
}

/// Test helper: Read one frame off the host side of the socket.
async fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await.unwrap();
    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await.unwrap();
    Frame::new(header[0], payload)
}

async fn next_event(events: &mut UnboundedReceiver<HotReloadEvent>) -> HotReloadEvent {
    timeout(TIMEOUT, events.recv())
        .await
        .expect("Timed out waiting for listener event")
        .expect("Listener event channel closed")
}

/// **VALUE**: Verifies that a frame written one byte at a time is reassembled.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_frame_dribbled_bytewise_when_taken_then_whole_frame_returned() {
    let (transport, mut host) = connected_pair().await;
    let frame = Frame::new(MAGIC_MESSAGE, Bytes::from_static(b"payload bytes"));
    let wire = encode_frame(&frame).unwrap();

    let writer = tokio::spawn(async move {
        for byte in wire.iter() {
            host.write_all(&[*byte]).await.unwrap();
            host.flush().await.unwrap();
            sleep(Duration::from_millis(1)).await;
        }
        host
    });

    let taken = timeout(TIMEOUT, transport.take()).await.unwrap().unwrap();
    assert_eq!(taken, Some(frame));
    drop(writer.await.unwrap());
}

/// **VALUE**: Verifies that cancelling a `take` halfway through a frame loses nothing.
///
/// **BUG THIS CATCHES**: Would catch a reader that keeps partial frames on the stack of the
/// cancelled future, which would desynchronize the stream after every stop.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_take_cancelled_mid_frame_when_taken_again_then_frame_intact() {
    let (transport, mut host) = connected_pair().await;
    let frame = Frame::new(MAGIC_MESSAGE, vec![7u8; 64]);
    let wire = encode_frame(&frame).unwrap();

    // GIVEN: Half the frame on the wire, and a take that gives up
    host.write_all(&wire[..20]).await.unwrap();
    let cancelled = timeout(Duration::from_millis(50), transport.take()).await;
    assert!(cancelled.is_err(), "Half a frame must not complete a take");

    // WHEN: The rest arrives
    host.write_all(&wire[20..]).await.unwrap();

    // THEN: The next take returns the whole frame
    let taken = timeout(TIMEOUT, transport.take()).await.unwrap().unwrap();
    assert_eq!(taken, Some(frame));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_host_closes_cleanly_when_taken_then_none() {
    let (transport, host) = connected_pair().await;

    drop(host);

    let taken = timeout(TIMEOUT, transport.take()).await.unwrap();
    assert!(matches!(taken, Ok(None)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_host_closes_mid_frame_when_taken_then_truncated_error() {
    let (transport, mut host) = connected_pair().await;
    host.write_all(&[MAGIC_MESSAGE, 0, 0, 0, 10, 1, 2]).await.unwrap();

    drop(host);

    let taken = timeout(TIMEOUT, transport.take()).await.unwrap();
    assert!(taken.is_err(), "Expected truncation error, got {taken:?}");
}

/// **VALUE**: Verifies the whole stack over a real socket: inbound file events, outbound log
/// lines, and a clean disconnect when the host goes away.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_server_over_tcp_when_host_talks_then_events_and_logs_flow() {
    // GIVEN: A server running on a TCP transport
    let (transport, mut host) = connected_pair().await;
    let (listener, mut events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        &HotReloadConfig::default(),
    );
    server.set_transport(Some(Arc::new(transport)));
    assert!(server.start());
    assert!(matches!(
        next_event(&mut events).await,
        HotReloadEvent::Connected { .. }
    ));

    // WHEN: The host sends a file create
    let create = Command::FileCreate {
        file: FilePath::new("/p/new.lua", "new.lua"),
        data: Bytes::from_static(b"return 1"),
    };
    let wire = encode_frame(&codec::encode(&create, "").unwrap()).unwrap();
    host.write_all(&wire).await.unwrap();

    // THEN: The listener sees it
    assert_eq!(
        next_event(&mut events).await,
        HotReloadEvent::FileCreated {
            path: "/p/new.lua".to_string(),
            relative_path: "new.lua".to_string(),
            content: Bytes::from_static(b"return 1"),
        }
    );

    // WHEN: The device logs
    server.log("ready");

    // THEN: The host reads a log frame
    let frame = timeout(TIMEOUT, read_frame(&mut host)).await.unwrap();
    assert_eq!(
        codec::decode(&frame).unwrap(),
        Command::Log {
            text: "ready".to_string()
        }
    );

    // WHEN: The host disconnects
    drop(host);

    // THEN: Disconnected, then Idle
    match next_event(&mut events).await {
        HotReloadEvent::Disconnected { reason, .. } => assert_eq!(reason, "transport closed"),
        other => panic!("Expected Disconnected, got {other:?}"),
    }
    timeout(TIMEOUT, async {
        while server.state() != ConnectionState::Idle {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Server never returned to Idle");
}
