//! Applies file events from the development host to a local directory.
//!
//! Only relative paths are used. The absolute paths in each event belong to the
//! host machine and mean nothing here. Every path is checked twice: lexically
//! against `..` and absolute forms, then against symlinks already on disk.

use crate::error::HostError;

use hotreload_core::listener::HotReloadEvent;

use common::ErrorLocation;

use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, error, info, warn};
use tokio::fs;
use tokio::sync::mpsc::UnboundedReceiver;

/// What applying one event did to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorChange {
    Written(PathBuf),
    Removed(PathBuf),
    Relocated { from: PathBuf, to: PathBuf },
    /// The event touches no files.
    Noted,
}

/// Last reload request seen by the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRequest {
    pub relative_entry_path: String,
    pub params: String,
}

pub struct WorkspaceMirror {
    root: PathBuf,
    last_reload: Option<ReloadRequest>,
}

impl WorkspaceMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_reload: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn last_reload(&self) -> Option<&ReloadRequest> {
        self.last_reload.as_ref()
    }

    /// Map a host relative path into the mirror root.
    ///
    /// Both `/` and `\` are accepted as separators.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::PathEscape`] for empty or absolute paths and for any
    /// path containing `..`.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, HostError> {
        let normalized = relative_path.replace('\\', "/");
        let escape = || HostError::PathEscape {
            relative_path: relative_path.to_string(),
            location: ErrorLocation::caller(),
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape());
                }
            }
        }

        if depth == 0 {
            return Err(escape());
        }
        Ok(resolved)
    }

    /// [`resolve`](Self::resolve) `relative_path`, then follow whatever already
    /// exists on disk along it and require the result to stay under the root.
    ///
    /// Creates the root if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::PathEscape`] when a symlink inside the root leads
    /// outside it, including a dangling one, and [`HostError::Mirror`] when the
    /// filesystem cannot be inspected.
    pub async fn contain(&self, relative_path: &str) -> Result<PathBuf, HostError> {
        let target = self.resolve(relative_path)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| mirror_error(&self.root, e))?;
        let root = fs::canonicalize(&self.root)
            .await
            .map_err(|e| mirror_error(&self.root, e))?;

        let mut existing = target.as_path();
        let canonical = loop {
            match fs::canonicalize(existing).await {
                Ok(path) => break Some(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if fs::symlink_metadata(existing).await.is_ok() {
                        break None;
                    }
                    match existing.parent() {
                        Some(parent) => existing = parent,
                        None => return Err(mirror_error(&target, e)),
                    }
                }
                Err(e) => return Err(mirror_error(existing, e)),
            }
        };

        match canonical {
            Some(path) if path.starts_with(&root) => Ok(target),
            other => {
                warn!(
                    "Refusing {relative_path}: {} leads to {:?}, outside {}",
                    existing.display(),
                    other,
                    root.display()
                );
                Err(HostError::PathEscape {
                    relative_path: relative_path.to_string(),
                    location: ErrorLocation::caller(),
                })
            }
        }
    }

    /// Apply one event.
    ///
    /// Deleting a file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::PathEscape`] for hostile paths and [`HostError::Mirror`]
    /// when the filesystem operation fails.
    pub async fn apply(&mut self, event: &HotReloadEvent) -> Result<MirrorChange, HostError> {
        match event {
            HotReloadEvent::FileUpdated {
                relative_path,
                content,
                ..
            }
            | HotReloadEvent::FileCreated {
                relative_path,
                content,
                ..
            } => {
                let target = self.contain(relative_path).await?;
                create_parent(&target).await?;
                fs::write(&target, content)
                    .await
                    .map_err(|e| mirror_error(&target, e))?;
                Ok(MirrorChange::Written(target))
            }
            HotReloadEvent::FileDeleted { relative_path, .. } => {
                let target = self.contain(relative_path).await?;
                let removed = match fs::symlink_metadata(&target).await {
                    Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&target).await,
                    Ok(_) => fs::remove_file(&target).await,
                    Err(e) => Err(e),
                };
                match removed {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!("Delete of missing {}, nothing to do", target.display());
                    }
                    Err(e) => return Err(mirror_error(&target, e)),
                }
                Ok(MirrorChange::Removed(target))
            }
            HotReloadEvent::FileRenamed {
                old_relative_path,
                new_relative_path,
                ..
            }
            | HotReloadEvent::FileMoved {
                old_relative_path,
                new_relative_path,
                ..
            } => {
                let from = self.contain(old_relative_path).await?;
                let to = self.contain(new_relative_path).await?;
                create_parent(&to).await?;
                fs::rename(&from, &to)
                    .await
                    .map_err(|e| mirror_error(&from, e))?;
                Ok(MirrorChange::Relocated { from, to })
            }
            HotReloadEvent::Reload {
                relative_entry_path,
                params,
                ..
            } => {
                info!("Reload requested: {relative_entry_path}?{params}");
                self.last_reload = Some(ReloadRequest {
                    relative_entry_path: relative_entry_path.clone(),
                    params: params.clone(),
                });
                Ok(MirrorChange::Noted)
            }
            HotReloadEvent::IpChanged { address } => {
                info!("Development host address changed to {address}");
                Ok(MirrorChange::Noted)
            }
            HotReloadEvent::Connected { kind, host, port } => {
                info!("Connected ({kind} {host}:{port})");
                Ok(MirrorChange::Noted)
            }
            HotReloadEvent::Disconnected { reason, .. } => {
                info!("Disconnected: {reason}");
                Ok(MirrorChange::Noted)
            }
        }
    }
}

/// Totals of one [`run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub applied: usize,
    pub failed: usize,
    pub disconnect_reason: Option<String>,
}

/// Apply events until the session disconnects or the channel closes.
pub async fn run(
    mut mirror: WorkspaceMirror,
    mut events: UnboundedReceiver<HotReloadEvent>,
) -> MirrorSummary {
    let mut summary = MirrorSummary::default();
    info!("Mirroring into {}", mirror.root().display());

    while let Some(event) = events.recv().await {
        match mirror.apply(&event).await {
            Ok(MirrorChange::Noted) => {}
            Ok(change) => {
                debug!("Applied {change:?}");
                summary.applied += 1;
            }
            Err(e) => {
                error!("{e}");
                summary.failed += 1;
            }
        }

        if let HotReloadEvent::Disconnected { reason, .. } = event {
            summary.disconnect_reason = Some(reason);
            break;
        }
    }

    summary
}

#[track_caller]
fn mirror_error(path: &Path, error: io::Error) -> HostError {
    HostError::Mirror {
        path: path.to_path_buf(),
        message: error.to_string(),
        location: ErrorLocation::caller(),
    }
}

async fn create_parent(path: &Path) -> Result<(), HostError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent)
            .await
            .map_err(|e| mirror_error(parent, e)),
        None => Ok(()),
    }
}
