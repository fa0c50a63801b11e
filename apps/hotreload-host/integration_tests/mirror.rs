use hotreload_host::mirror::{self, WorkspaceMirror};

use hotreload_core::command::{Command, EntryDescriptor, FilePath};
use hotreload_core::config::HotReloadConfig;
use hotreload_core::hotreload::HotReloadServer;
use hotreload_core::listener::EventChannelListener;
use hotreload_core::transport::channel_transport;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::time::{Duration, timeout};

// ============================================================================
// Integration tests for the mirror fed by a live hot reload connection
// ============================================================================

/// **VALUE**: Verifies the whole device-side path: frames in, listener events, files on disk.
///
/// **WHY THIS MATTERS**: This is what the host binary does in production, minus the socket.
///
/// **BUG THIS CATCHES**: Would catch a mismatch between the event payloads produced by the
/// core and what the mirror expects, such as absolute paths being used instead of relative ones.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_connection_when_host_edits_files_then_mirror_follows() {
    // GIVEN: A server wired to a mirror task
    let dir = TempDir::new().unwrap();
    let (listener, events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        &HotReloadConfig::default(),
    );
    let (transport, mut peer) = channel_transport();
    server.set_transport(Some(Arc::new(transport)));
    let mirror_task = tokio::spawn(mirror::run(WorkspaceMirror::new(dir.path()), events));
    assert!(server.start());

    // WHEN: The host creates, updates and renames files, then reloads
    let commands = [
        Command::FileCreate {
            file: FilePath::new("/host/p/main.lua", "main.lua"),
            data: "print(1)".into(),
        },
        Command::FileCreate {
            file: FilePath::new("/host/p/lib/util.lua", "lib/util.lua"),
            data: "return {}".into(),
        },
        Command::FileUpdate {
            file: FilePath::new("/host/p/main.lua", "main.lua"),
            data: "print(2)".into(),
        },
        Command::FileRename {
            from: FilePath::new("/host/p/lib/util.lua", "lib/util.lua"),
            to: FilePath::new("/host/p/lib/helpers.lua", "lib/helpers.lua"),
        },
        Command::FileCreate {
            file: FilePath::new("/etc/evil", "../evil"),
            data: "x".into(),
        },
        Command::EntryFile(EntryDescriptor::new("/host/p/main.lua", "main.lua", "")),
        Command::Reload { serial_num: 1 },
    ];
    for command in &commands {
        peer.send_command(command).unwrap();
    }

    // AND: A ping round trip proves every earlier frame was dispatched
    peer.send_command(&Command::Ping).unwrap();
    let pong = timeout(Duration::from_secs(2), peer.recv_frame())
        .await
        .expect("No pong from the device")
        .expect("Outbound channel closed");
    assert_eq!(hotreload_core::codec::decode(&pong).unwrap(), Command::Pong);

    // AND: The session ends
    assert_eq!(
        server.shutdown().await,
        Some(hotreload_core::hotreload::LoopExit::Stopped)
    );

    // THEN: The mirror saw everything up to the disconnect
    let summary = timeout(Duration::from_secs(2), mirror_task)
        .await
        .expect("Mirror task did not finish")
        .expect("Mirror task panicked");

    assert_eq!(summary.disconnect_reason.as_deref(), Some("stopped"));
    assert_eq!(summary.failed, 1, "The escaping path must be refused");
    assert_eq!(summary.applied, 4);
    assert_eq!(fs::read_to_string(dir.path().join("main.lua")).unwrap(), "print(2)");
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/helpers.lua")).unwrap(),
        "return {}"
    );
    assert!(!dir.path().join("lib/util.lua").exists());
    assert!(!dir.path().parent().unwrap().join("evil").exists());
}
