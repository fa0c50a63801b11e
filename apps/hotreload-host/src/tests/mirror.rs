// Unit tests for the workspace mirror.

use crate::error::HostError;
use crate::mirror::{MirrorChange, ReloadRequest, WorkspaceMirror};

use hotreload_core::listener::HotReloadEvent::{
    FileCreated, FileDeleted, FileMoved, FileRenamed, FileUpdated,
};
use hotreload_core::listener::{ConnectionKind, HotReloadEvent};

use std::fs;

use tempfile::TempDir;

fn created(relative: &str, content: &'static str) -> HotReloadEvent {
    FileCreated {
        path: format!("/host/project/{relative}"),
        relative_path: relative.to_string(),
        content: content.as_bytes().to_vec().into(),
    }
}

/// **VALUE**: Verifies that hostile relative paths never resolve outside the root.
///
/// **WHY THIS MATTERS**: Paths come straight off the network. Without this check a
/// compromised or buggy host could overwrite any file the device process can reach.
#[test]
fn given_escaping_paths_when_resolving_then_rejected() {
    let dir = TempDir::new().unwrap();
    let mirror = WorkspaceMirror::new(dir.path());

    for hostile in ["", ".", "../x.lua", "a/../../x.lua", "/etc/passwd", "..\\x.lua"] {
        let result = mirror.resolve(hostile);
        assert!(
            matches!(result, Err(HostError::PathEscape { .. })),
            "{hostile:?} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn given_nested_paths_when_resolving_then_joined_under_root() {
    let dir = TempDir::new().unwrap();
    let mirror = WorkspaceMirror::new(dir.path());

    assert_eq!(
        mirror.resolve("ui/list.lua").unwrap(),
        dir.path().join("ui").join("list.lua")
    );
    assert_eq!(
        mirror.resolve("./ui\\list.lua").unwrap(),
        dir.path().join("ui").join("list.lua")
    );
}

/// **VALUE**: Verifies create, update, rename, move and delete against a real directory.
#[tokio::test]
async fn given_file_events_when_applied_then_directory_matches_host() {
    // GIVEN: An empty mirror
    let dir = TempDir::new().unwrap();
    let mut mirror = WorkspaceMirror::new(dir.path());

    // WHEN: A file is created in a new subdirectory, then updated
    mirror.apply(&created("ui/a.lua", "v1")).await.unwrap();
    let change = mirror
        .apply(&FileUpdated {
            path: "/host/project/ui/a.lua".to_string(),
            relative_path: "ui/a.lua".to_string(),
            content: "v2".as_bytes().to_vec().into(),
        })
        .await
        .unwrap();

    // THEN: Latest content is on disk
    assert_eq!(change, MirrorChange::Written(dir.path().join("ui/a.lua")));
    assert_eq!(fs::read_to_string(dir.path().join("ui/a.lua")).unwrap(), "v2");

    // WHEN: Renamed, then moved into another directory
    mirror
        .apply(&FileRenamed {
            old_path: String::new(),
            old_relative_path: "ui/a.lua".to_string(),
            new_path: String::new(),
            new_relative_path: "ui/b.lua".to_string(),
        })
        .await
        .unwrap();
    mirror
        .apply(&FileMoved {
            old_path: String::new(),
            old_relative_path: "ui/b.lua".to_string(),
            new_path: String::new(),
            new_relative_path: "lib/b.lua".to_string(),
        })
        .await
        .unwrap();

    // THEN: Only the final location exists
    assert!(!dir.path().join("ui/a.lua").exists());
    assert!(!dir.path().join("ui/b.lua").exists());
    assert_eq!(fs::read_to_string(dir.path().join("lib/b.lua")).unwrap(), "v2");

    // WHEN: Deleted, twice
    let first = mirror
        .apply(&FileDeleted {
            path: String::new(),
            relative_path: "lib/b.lua".to_string(),
        })
        .await;
    let second = mirror
        .apply(&FileDeleted {
            path: String::new(),
            relative_path: "lib/b.lua".to_string(),
        })
        .await;

    // THEN: Gone, and the repeat is not an error
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert!(!dir.path().join("lib/b.lua").exists());
}

#[tokio::test]
async fn given_rename_of_missing_file_when_applied_then_mirror_error() {
    let dir = TempDir::new().unwrap();
    let mut mirror = WorkspaceMirror::new(dir.path());

    let result = mirror
        .apply(&FileRenamed {
            old_path: String::new(),
            old_relative_path: "nope.lua".to_string(),
            new_path: String::new(),
            new_relative_path: "still-nope.lua".to_string(),
        })
        .await;

    assert!(matches!(result, Err(HostError::Mirror { .. })));
}

#[tokio::test]
async fn given_non_file_events_when_applied_then_noted_and_reload_remembered() {
    let dir = TempDir::new().unwrap();
    let mut mirror = WorkspaceMirror::new(dir.path());

    let events = [
        HotReloadEvent::Connected {
            kind: ConnectionKind::Net,
            host: "127.0.0.1".to_string(),
            port: 8176,
        },
        HotReloadEvent::IpChanged {
            address: "10.0.0.1".to_string(),
        },
        HotReloadEvent::Reload {
            entry_path: "/host/project/main.lua".to_string(),
            relative_entry_path: "main.lua".to_string(),
            params: "&hotReload_SerialNum=3".to_string(),
        },
    ];
    for event in &events {
        assert_eq!(mirror.apply(event).await.unwrap(), MirrorChange::Noted);
    }

    assert_eq!(
        mirror.last_reload(),
        Some(&ReloadRequest {
            relative_entry_path: "main.lua".to_string(),
            params: "&hotReload_SerialNum=3".to_string(),
        })
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// **VALUE**: Verifies that a symlink inside the root pointing elsewhere cannot be used to
/// write, delete or move files outside the root.
///
/// **BUG THIS CATCHES**: Would catch a mirror that only checks the path text. `link/x.lua`
/// looks harmless but lands in whatever directory `link` points to.
#[cfg(unix)]
#[tokio::test]
async fn given_symlink_to_outside_dir_when_applying_through_it_then_path_escape() {
    // GIVEN: A mirror root holding a link to a directory outside it
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("keep.lua"), "outside").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
    let mut mirror = WorkspaceMirror::new(dir.path());

    // WHEN: Events address files through the link
    let write = mirror.apply(&created("link/x.lua", "v1")).await;
    let delete = mirror
        .apply(&FileDeleted {
            path: String::new(),
            relative_path: "link/keep.lua".to_string(),
        })
        .await;
    let relocate = mirror
        .apply(&FileMoved {
            old_path: String::new(),
            old_relative_path: "link/keep.lua".to_string(),
            new_path: String::new(),
            new_relative_path: "stolen.lua".to_string(),
        })
        .await;

    // THEN: Each is refused and the outside directory is untouched
    for result in [write, delete, relocate] {
        assert!(
            matches!(result, Err(HostError::PathEscape { .. })),
            "Expected PathEscape, got {result:?}"
        );
    }
    assert!(!outside.path().join("x.lua").exists());
    assert_eq!(
        fs::read_to_string(outside.path().join("keep.lua")).unwrap(),
        "outside"
    );
    assert!(!dir.path().join("stolen.lua").exists());
}

/// **VALUE**: Verifies that writing onto a dangling symlink is refused.
///
/// **BUG THIS CATCHES**: Would catch a check that skips paths which do not exist yet. The
/// link itself does not resolve, but writing through it creates its target outside the root.
#[cfg(unix)]
#[tokio::test]
async fn given_dangling_symlink_when_written_then_path_escape() {
    // GIVEN: A link in the root to a file that does not exist yet
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let victim = outside.path().join("victim.lua");
    std::os::unix::fs::symlink(&victim, dir.path().join("main.lua")).unwrap();
    let mut mirror = WorkspaceMirror::new(dir.path());

    // WHEN: The host updates that file
    let result = mirror.apply(&created("main.lua", "v1")).await;

    // THEN: Refused, and nothing appeared outside
    assert!(
        matches!(result, Err(HostError::PathEscape { .. })),
        "Expected PathEscape, got {result:?}"
    );
    assert!(!victim.exists());
}

/// **VALUE**: Verifies that symlinks which stay inside the root keep working, and that a
/// missing root is created on first write.
#[cfg(unix)]
#[tokio::test]
async fn given_symlink_within_root_when_written_then_applied() {
    // GIVEN: A root that does not exist yet, then gets an internal link
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("mirror");
    let mut mirror = WorkspaceMirror::new(&root);
    mirror.apply(&created("real/a.lua", "v1")).await.unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

    // WHEN: Writing through the internal link
    let change = mirror.apply(&created("alias/b.lua", "v2")).await.unwrap();

    // THEN: The file lands in the linked directory
    assert_eq!(change, MirrorChange::Written(root.join("alias").join("b.lua")));
    assert_eq!(fs::read_to_string(root.join("real/b.lua")).unwrap(), "v2");
}
