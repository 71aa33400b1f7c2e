//! Host directories bind-mounted into service containers.
//!
//! Some fixtures mount fixed host paths and run their containers as an
//! arbitrary user id, so the directory has to exist with the right owner
//! before the group starts and has to disappear after it stops.
//! [`HostDirectoryGuard`] scopes that work: acquisition creates and chowns,
//! dropping removes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::HarnessError;

/// Tracing target for host directory management.
const HOST_DIR_TARGET: &str = "cluster_harness::host_dir";

/// A host directory required by a service group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDirectory {
    path: PathBuf,
    owner_uid: Option<u32>,
    cleanup_root: Option<PathBuf>,
}

impl HostDirectory {
    /// Requires `path` to exist while the group runs.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner_uid: None,
            cleanup_root: None,
        }
    }

    /// Recursively assigns ownership of the directory to `uid`.
    #[must_use]
    pub const fn owned_by(mut self, uid: u32) -> Self {
        self.owner_uid = Some(uid);
        self
    }

    /// Removes `root` instead of the directory itself on release.
    ///
    /// Useful when `path` is nested inside a scratch tree created for the
    /// test, for example `/tmp/kafka-test/data` with root `/tmp/kafka-test`.
    #[must_use]
    pub fn removing(mut self, root: impl Into<PathBuf>) -> Self {
        self.cleanup_root = Some(root.into());
        self
    }

    /// Directory that must exist.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owner applied on creation, if any.
    #[must_use]
    pub const fn owner_uid(&self) -> Option<u32> {
        self.owner_uid
    }

    /// Tree removed on release.
    #[must_use]
    pub fn cleanup_root(&self) -> &Path {
        self.cleanup_root.as_deref().unwrap_or(&self.path)
    }

    fn prepare(&self) -> Result<(), HarnessError> {
        fs::create_dir_all(&self.path).map_err(|source| self.error(source))?;
        if let Some(uid) = self.owner_uid {
            chown_recursive(&self.path, uid).map_err(|source| self.error(source))?;
        }
        info!(
            target: HOST_DIR_TARGET,
            path = %self.path.display(),
            owner = ?self.owner_uid,
            "host directory prepared"
        );
        Ok(())
    }

    fn error(&self, source: io::Error) -> HarnessError {
        HarnessError::HostDirectory {
            path: self.path.clone(),
            source: Arc::new(source),
        }
    }
}

/// Keeps host directories alive; removes them when dropped.
#[derive(Debug, Default)]
pub struct HostDirectoryGuard {
    acquired: Vec<HostDirectory>,
}

impl HostDirectoryGuard {
    /// Creates every directory, applying ownership where requested.
    ///
    /// Directories prepared before a failure are removed again.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::HostDirectory`] when a directory cannot be
    /// created or its ownership cannot be changed.
    pub fn acquire(directories: &[HostDirectory]) -> Result<Self, HarnessError> {
        let mut guard = Self::default();
        for directory in directories {
            directory.prepare()?;
            guard.acquired.push(directory.clone());
        }
        Ok(guard)
    }

    /// Directories currently held.
    #[must_use]
    pub fn directories(&self) -> &[HostDirectory] {
        &self.acquired
    }
}

impl Drop for HostDirectoryGuard {
    fn drop(&mut self) {
        for directory in self.acquired.drain(..).rev() {
            let root = directory.cleanup_root();
            match fs::remove_dir_all(root) {
                Ok(()) => info!(
                    target: HOST_DIR_TARGET,
                    path = %root.display(),
                    "host directory removed"
                ),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => warn!(
                    target: HOST_DIR_TARGET,
                    path = %root.display(),
                    %error,
                    "failed to remove host directory"
                ),
            }
        }
    }
}

#[cfg(unix)]
fn chown_recursive(path: &Path, uid: u32) -> io::Result<()> {
    use nix::unistd::{Uid, chown};

    chown(path, Some(Uid::from_raw(uid)), None).map_err(io::Error::from)?;
    if fs::symlink_metadata(path)?.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_symlink() {
                chown_recursive(&entry.path(), uid)?;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn chown_recursive(_path: &Path, _uid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "changing directory ownership requires a Unix host",
    ))
}
