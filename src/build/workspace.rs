//! Disposable per-request build workspaces

use crate::error::{BuildBotError, BuildBotResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::{fs, task};
use uuid::Uuid;

/// Checked-out source tree inside the workspace
const SOURCE_DIR: &str = "source";

/// Saved copy of the request inside the workspace
const SETTINGS_FILE: &str = "settings.json";

/// Copy of a build request persisted next to the source tree
#[derive(Debug, Serialize)]
pub struct SettingsRecord<'a> {
    pub request_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub caller: &'a str,
    pub version: &'a str,
    pub board: &'a str,
    /// The request body exactly as received
    pub request: &'a str,
}

/// A uniquely named directory owned by one build request.
///
/// [`close`](Self::close) removes it on the blocking pool. Dropping an
/// unclosed workspace (deadline expiry) removes it inline.
#[derive(Debug)]
pub struct BuildWorkspace {
    dir: TempDir,
}

impl BuildWorkspace {
    /// Create a workspace under `root` whose name starts with the caller's
    /// sanitized address
    pub async fn create(root: &Path, caller: &str) -> BuildBotResult<Self> {
        let prefix = format!("{}-", sanitize_caller(caller));
        let parent = root.to_path_buf();

        let dir = task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(parent)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|created| created)
        .map_err(|e| {
            BuildBotError::io(format!("creating build workspace in {}", root.display()), e)
        })?;

        Ok(Self { dir })
    }

    /// Remove the workspace and everything in it
    pub async fn close(self) -> BuildBotResult<()> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;

        task::spawn_blocking(move || dir.close())
            .await
            .map_err(io::Error::other)
            .and_then(|removed| removed)
            .map_err(|e| BuildBotError::io(format!("removing {}", path.display()), e))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the firmware source is cloned
    pub fn source_dir(&self) -> PathBuf {
        self.path().join(SOURCE_DIR)
    }

    /// Build output directory inside the source tree
    pub fn build_dir(&self, subdir: &str) -> PathBuf {
        self.source_dir().join(subdir)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.path().join(SETTINGS_FILE)
    }

    /// Persist the request for later inspection of the workspace
    pub async fn write_settings(&self, record: &SettingsRecord<'_>) -> BuildBotResult<()> {
        let content = serde_json::to_string_pretty(record)?;
        let path = self.settings_path();
        fs::write(&path, content)
            .await
            .map_err(|e| BuildBotError::io(format!("writing {}", path.display()), e))
    }
}

/// Make a caller address usable in a directory name.
///
/// `.` becomes `_` and `:` becomes `-`; anything else outside
/// `[A-Za-z0-9_-]` (such as IPv6 brackets) also becomes `-`.
pub fn sanitize_caller(caller: &str) -> String {
    caller
        .chars()
        .map(|c| match c {
            '.' => '_',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => c,
            _ => '-',
        })
        .collect()
}
