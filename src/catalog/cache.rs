//! Process-wide options cache

use super::OptionsManifest;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// The current [`OptionsManifest`], swapped wholesale on every refresh.
///
/// Readers hold an `Arc` to whichever manifest was current when they
/// asked, so a concurrent [`replace`](Self::replace) can never show them
/// a half-built table.
#[derive(Debug, Default)]
pub struct OptionsCache {
    current: RwLock<Arc<OptionsManifest>>,
}

impl OptionsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The manifest as of now
    pub fn snapshot(&self) -> Arc<OptionsManifest> {
        // A poisoned lock still holds a complete Arc; the cache never fails.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Whether `version` is in the current manifest
    pub fn contains(&self, version: &str) -> bool {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard.contains(version)
    }

    /// Publish a new manifest, returning the one it replaced
    pub fn replace(&self, manifest: OptionsManifest) -> Arc<OptionsManifest> {
        let next = Arc::new(manifest);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        debug!("Publishing options for {} versions", next.len());
        std::mem::replace(&mut *guard, next)
    }
}
