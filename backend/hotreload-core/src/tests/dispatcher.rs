// Unit tests for command routing and the entry descriptor.

use crate::command::{Command, EntryDescriptor, FilePath};
use crate::error::{DispatchError, ListenerError};
use crate::hotreload::{Dispatched, Dispatcher, reload_params};
use crate::listener::{ConnectionKind, HotReloadListener, ListenerResult};

use std::sync::{Arc, Mutex};

use prost::bytes::Bytes;

/// Records every callback as a line of text. Fails or panics on request.
#[derive(Default)]
struct RecordingListener {
    calls: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
}

impl RecordingListener {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> ListenerResult {
        if self.panic_on.is_some_and(|path| call.contains(path)) {
            panic!("listener exploded on {call}");
        }
        if self.fail_on.is_some_and(|path| call.contains(path)) {
            return Err(ListenerError::new(format!("refused {call}")));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl HotReloadListener for RecordingListener {
    fn on_connected(&self, kind: ConnectionKind, host: &str, port: u16) {
        let _ = self.record(format!("connected {kind} {host}:{port}"));
    }

    fn on_disconnected(&self, kind: ConnectionKind, host: &str, port: u16, reason: &str) {
        let _ = self.record(format!("disconnected {kind} {host}:{port} {reason}"));
    }

    fn on_file_update(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        self.record(format!("update {path} {relative_path} {}", content.len()))
    }

    fn on_file_create(&self, path: &str, relative_path: &str, content: Bytes) -> ListenerResult {
        self.record(format!("create {path} {relative_path} {}", content.len()))
    }

    fn on_file_delete(&self, path: &str, relative_path: &str) -> ListenerResult {
        self.record(format!("delete {path} {relative_path}"))
    }

    fn on_file_rename(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.record(format!(
            "rename {old_path} {old_relative_path} {new_path} {new_relative_path}"
        ))
    }

    fn on_file_move(
        &self,
        old_path: &str,
        old_relative_path: &str,
        new_path: &str,
        new_relative_path: &str,
    ) -> ListenerResult {
        self.record(format!(
            "move {old_path} {old_relative_path} {new_path} {new_relative_path}"
        ))
    }

    fn on_reload(
        &self,
        entry_path: &str,
        relative_entry_path: &str,
        params: &str,
    ) -> ListenerResult {
        self.record(format!("reload {entry_path} {relative_entry_path} {params}"))
    }

    fn on_ip_changed(&self, address: &str) -> ListenerResult {
        self.record(format!("ip {address}"))
    }
}

fn dispatcher_with(listener: RecordingListener) -> (Dispatcher, Arc<RecordingListener>) {
    let listener = Arc::new(listener);
    let dispatcher = Dispatcher::new(listener.clone(), true);
    (dispatcher, listener)
}

/// **VALUE**: Verifies the reload scenario: the entry file is remembered and the reload carries
/// its path plus the reload serial appended to the params.
///
/// **WHY THIS MATTERS**: The reload command itself carries only a serial. Without the stored
/// entry descriptor the device would not know which script to relaunch.
#[test]
fn given_entry_file_when_reload_dispatched_then_listener_gets_entry_and_serial_params() {
    // GIVEN: A dispatcher that has seen an entry file
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());
    let entry = Command::EntryFile(EntryDescriptor::new("/a/main.lua", "main.lua", "x=1"));
    assert_eq!(dispatcher.dispatch(entry).unwrap(), Dispatched::Delivered);

    // WHEN: A reload arrives
    let result = dispatcher.dispatch(Command::Reload { serial_num: 7 });

    // THEN: on_reload receives the stored entry with the serial appended
    assert_eq!(result.unwrap(), Dispatched::Delivered);
    assert_eq!(
        listener.calls(),
        vec!["reload /a/main.lua main.lua x=1&hotReload_SerialNum=7".to_string()]
    );
}

/// **VALUE**: Verifies that a newer entry file replaces the older one.
#[test]
fn given_two_entry_files_when_reload_dispatched_then_latest_entry_is_used() {
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());
    dispatcher
        .dispatch(Command::EntryFile(EntryDescriptor::new("/a/old.lua", "old.lua", "a=1")))
        .unwrap();
    dispatcher
        .dispatch(Command::EntryFile(EntryDescriptor::new("/a/new.lua", "new.lua", "")))
        .unwrap();

    dispatcher.dispatch(Command::Reload { serial_num: 3 }).unwrap();

    assert_eq!(
        dispatcher.entry(),
        Some(EntryDescriptor::new("/a/new.lua", "new.lua", ""))
    );
    assert_eq!(
        listener.calls(),
        vec!["reload /a/new.lua new.lua &hotReload_SerialNum=3".to_string()]
    );
}

/// **VALUE**: Verifies that a reload with no entry file on record still reaches the listener,
/// with empty entry paths and only the reload serial as params.
///
/// **WHY THIS MATTERS**: The device may restart its script before the host has re-sent the
/// entry file. Dropping the reload there leaves the device running stale code.
#[test]
fn given_no_entry_file_when_reload_dispatched_then_listener_gets_empty_entry() {
    // GIVEN: A dispatcher that has never seen an entry file
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());

    // WHEN: A reload arrives
    let result = dispatcher.dispatch(Command::Reload { serial_num: 1 });

    // THEN: on_reload runs with the default entry and the entry is still unset
    assert_eq!(result.unwrap(), Dispatched::Delivered);
    assert_eq!(
        listener.calls(),
        vec!["reload   &hotReload_SerialNum=1".to_string()]
    );
    assert_eq!(dispatcher.entry(), None);
}

/// **VALUE**: Verifies the rename scenario delivers both path pairs exactly once.
#[test]
fn given_rename_when_dispatched_then_listener_gets_old_and_new_paths_once() {
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());

    dispatcher
        .dispatch(Command::FileRename {
            from: FilePath::new("/a/b.lua", "b.lua"),
            to: FilePath::new("/a/c.lua", "c.lua"),
        })
        .unwrap();

    assert_eq!(
        listener.calls(),
        vec!["rename /a/b.lua b.lua /a/c.lua c.lua".to_string()]
    );
}

/// **VALUE**: Verifies the one-to-one mapping of file commands to callbacks.
#[test]
fn given_file_commands_when_dispatched_then_each_maps_to_its_callback() {
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());

    let commands = vec![
        Command::FileUpdate {
            file: FilePath::new("/a/u.lua", "u.lua"),
            data: Bytes::from_static(b"abc"),
        },
        Command::FileCreate {
            file: FilePath::new("/a/n.lua", "n.lua"),
            data: Bytes::new(),
        },
        Command::FileRemove {
            file: FilePath::new("/a/d.lua", "d.lua"),
        },
        Command::FileMove {
            from: FilePath::new("/a/m.lua", "m.lua"),
            to: FilePath::new("/a/x/m.lua", "x/m.lua"),
        },
        Command::IpAddressChanged {
            address: "10.0.0.2".to_string(),
        },
    ];
    for command in commands {
        assert_eq!(dispatcher.dispatch(command).unwrap(), Dispatched::Delivered);
    }

    assert_eq!(
        listener.calls(),
        vec![
            "update /a/u.lua u.lua 3".to_string(),
            "create /a/n.lua n.lua 0".to_string(),
            "delete /a/d.lua d.lua".to_string(),
            "move /a/m.lua m.lua /a/x/m.lua x/m.lua".to_string(),
            "ip 10.0.0.2".to_string(),
        ]
    );
}

/// **VALUE**: Verifies that commands without a listener mapping are ignored, and that a ping
/// asks for a pong reply.
#[test]
fn given_unmapped_commands_when_dispatched_then_ignored_or_answered() {
    let (dispatcher, listener) = dispatcher_with(RecordingListener::default());

    assert_eq!(
        dispatcher.dispatch(Command::Ping).unwrap(),
        Dispatched::Reply(Command::Pong)
    );
    for command in [
        Command::Pong,
        Command::Log { text: "x".into() },
        Command::Error { text: "y".into() },
        Command::Unsupported { instruction: 77 },
    ] {
        assert_eq!(dispatcher.dispatch(command).unwrap(), Dispatched::Ignored);
    }
    assert!(listener.calls().is_empty());
}

/// **VALUE**: Verifies that pings are ignored when replies are disabled.
#[test]
fn given_ping_replies_disabled_when_ping_dispatched_then_ignored() {
    let dispatcher = Dispatcher::new(Arc::new(RecordingListener::default()), false);

    assert_eq!(
        dispatcher.dispatch(Command::Ping).unwrap(),
        Dispatched::Ignored
    );
}

/// **VALUE**: Verifies that a listener error is reported with the command name and does not
/// poison the dispatcher.
#[test]
fn given_failing_listener_when_dispatching_then_error_names_command_and_next_succeeds() {
    let (dispatcher, listener) = dispatcher_with(RecordingListener {
        fail_on: Some("/bad.lua"),
        ..Default::default()
    });

    let failed = dispatcher.dispatch(Command::FileRemove {
        file: FilePath::new("/bad.lua", "bad.lua"),
    });
    let ok = dispatcher.dispatch(Command::FileRemove {
        file: FilePath::new("/good.lua", "good.lua"),
    });

    match failed {
        Err(DispatchError::Listener { command, .. }) => assert_eq!(command, "FileRemove"),
        other => panic!("Expected listener error, got {other:?}"),
    }
    assert_eq!(ok.unwrap(), Dispatched::Delivered);
    assert_eq!(listener.calls(), vec!["delete /good.lua good.lua".to_string()]);
}

/// **VALUE**: Verifies that a panicking listener is contained and reported.
///
/// **BUG THIS CATCHES**: Would catch a missing `catch_unwind`, which lets one bad file event
/// take down the worker and end the whole session.
#[test]
fn given_panicking_listener_when_dispatching_then_panic_becomes_error() {
    let (dispatcher, _listener) = dispatcher_with(RecordingListener {
        panic_on: Some("/boom.lua"),
        ..Default::default()
    });

    let result = dispatcher.dispatch(Command::FileUpdate {
        file: FilePath::new("/boom.lua", "boom.lua"),
        data: Bytes::new(),
    });

    match result {
        Err(DispatchError::Panicked { command, message, .. }) => {
            assert_eq!(command, "FileUpdate");
            assert!(message.contains("listener exploded"), "got {message}");
        }
        other => panic!("Expected panic error, got {other:?}"),
    }
}

#[test]
fn given_params_when_building_reload_params_then_serial_is_appended() {
    assert_eq!(reload_params("x=1", 7), "x=1&hotReload_SerialNum=7");
    assert_eq!(reload_params("", 9), "&hotReload_SerialNum=9");
}
