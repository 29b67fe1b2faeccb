//! Local mirror of the upstream firmware repository

use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The on-disk clone shared by the refresher and every build.
///
/// The refresher holds the write lock for a whole cycle because it checks
/// out tags one after another; builds take the read lock only while cloning
/// from the mirror.
#[derive(Debug)]
pub struct SourceMirror {
    path: PathBuf,
    lock: RwLock<()>,
}

/// Shared access to the mirror, held while cloning from it
pub struct MirrorReadGuard<'a> {
    path: &'a Path,
    _guard: RwLockReadGuard<'a, ()>,
}

impl MirrorReadGuard<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }
}

/// Exclusive access to the mirror, held while mutating it
pub struct MirrorWriteGuard<'a> {
    path: &'a Path,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl MirrorWriteGuard<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }
}

impl SourceMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Mirror location; only touch its contents through a guard
    pub fn location(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> MirrorReadGuard<'_> {
        MirrorReadGuard {
            path: &self.path,
            _guard: self.lock.read().await,
        }
    }

    pub async fn write(&self) -> MirrorWriteGuard<'_> {
        MirrorWriteGuard {
            path: &self.path,
            _guard: self.lock.write().await,
        }
    }
}
