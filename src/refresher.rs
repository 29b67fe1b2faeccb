//! Background repository refresher
//!
//! Keeps the local mirror in step with upstream and rebuilds the options
//! cache from the manifest at every version tag:
//!
//! 1. **Bootstrap** (once): wipe any stale mirror and clone upstream,
//!    retrying with exponential backoff. Giving up is fatal.
//! 2. **Refresh** (every poll period): under the mirror's write lock,
//!    drop local tags, pull, list version tags, check out each one and
//!    parse its options file, then publish the new manifest.

use crate::catalog::{
    parse_descriptors, parse_version_tag, OptionDescriptor, OptionsCache, OptionsManifest,
    SourceMirror,
};
use crate::config::RepositoryConfig;
use crate::error::{BuildBotError, BuildBotResult};
use crate::git::Git;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on the delay between bootstrap attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Local tags dropped before pulling
    pub tags_removed: usize,
    /// Version tags found after pulling
    pub tags_found: usize,
    /// Versions published to the cache
    pub versions: usize,
    /// Tags left out, with the reason
    pub skipped: Vec<(String, String)>,
}

/// Owns the mirror lifecycle and the options cache contents
pub struct RepositoryRefresher {
    config: RepositoryConfig,
    git: Git,
    mirror: Arc<SourceMirror>,
    cache: Arc<OptionsCache>,
    /// Branch checked out by the bootstrap clone; restored before each pull
    branch: Option<String>,
}

impl RepositoryRefresher {
    pub fn new(
        config: RepositoryConfig,
        git: Git,
        mirror: Arc<SourceMirror>,
        cache: Arc<OptionsCache>,
    ) -> Self {
        Self {
            config,
            git,
            mirror,
            cache,
            branch: None,
        }
    }

    /// Clone upstream into a fresh mirror, retrying with backoff
    pub async fn bootstrap(&mut self) -> BuildBotResult<()> {
        let attempts = self.config.bootstrap_attempts.max(1);
        let mut delay = Duration::from_secs(self.config.bootstrap_backoff_secs);
        let mut attempt = 1;

        loop {
            match self.clone_mirror().await {
                Ok(branch) => {
                    info!(
                        "Mirrored {} into {} (branch {})",
                        self.config.url,
                        self.mirror.location().display(),
                        branch
                    );
                    // A detached HEAD has no branch to return to
                    self.branch = (branch != "HEAD").then_some(branch);
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Mirror clone attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(BuildBotError::BootstrapExhausted {
                        attempts,
                        source: Box::new(e),
                    })
                }
            }
        }
    }

    async fn clone_mirror(&self) -> BuildBotResult<String> {
        let mirror = self.mirror.write().await;
        let path = mirror.path();

        if fs::try_exists(path).await.unwrap_or(false) {
            debug!("Removing stale mirror at {}", path.display());
            fs::remove_dir_all(path)
                .await
                .map_err(|e| BuildBotError::io(format!("removing {}", path.display()), e))?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildBotError::io(format!("creating {}", parent.display()), e))?;
        }

        self.git.clone_repo(&self.config.url, path).await?;

        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(BuildBotError::MirrorMissing(path.to_path_buf()));
        }

        self.git.current_branch(path).await
    }

    /// Run one refresh cycle and publish the resulting manifest.
    ///
    /// Failing to return to the tracked branch aborts the cycle with the
    /// mirror and the previous manifest untouched. Once local tags are being
    /// dropped the cache must follow the mirror, so any later git failure
    /// publishes an empty manifest. A tag whose options file is missing or
    /// unparsable is left out without affecting the others.
    pub async fn refresh_once(&self) -> BuildBotResult<RefreshReport> {
        let mirror = self.mirror.write().await;
        let repo = mirror.path();

        if let Some(branch) = &self.branch {
            self.git.checkout(repo, branch).await?;
        }

        let scanned = self.rescan(repo).await;

        if let Some(branch) = &self.branch {
            if let Err(e) = self.git.checkout(repo, branch).await {
                warn!("Could not return mirror to {}: {}", branch, e);
            }
        }

        match scanned {
            Ok((manifest, report)) => {
                self.cache.replace(manifest);
                Ok(report)
            }
            Err(e) => {
                let withdrawn = self.cache.replace(OptionsManifest::default());
                warn!(
                    "Mirror tags unavailable, withdrew {} cached versions",
                    withdrawn.len()
                );
                Err(e)
            }
        }
    }

    /// Drop local tags, pull, and read the options file at every version tag
    async fn rescan(&self, repo: &Path) -> BuildBotResult<(OptionsManifest, RefreshReport)> {
        let tags_removed = self.git.delete_all_tags(repo).await?;
        self.git.pull(repo).await?;

        let tags: Vec<String> = self
            .git
            .list_tags(repo, &self.config.tag_pattern)
            .await?
            .into_iter()
            .filter(|t| {
                let valid = parse_version_tag(t).is_some();
                if !valid {
                    debug!("Ignoring non-version tag {}", t);
                }
                valid
            })
            .collect();

        let mut versions = Vec::with_capacity(tags.len());
        let mut skipped = Vec::new();
        for tag in &tags {
            match self.options_at(repo, tag).await {
                Ok(descriptors) => versions.push((tag.clone(), descriptors)),
                Err(reason) => {
                    debug!("Skipping {}: {}", tag, reason);
                    skipped.push((tag.clone(), reason));
                }
            }
        }

        let manifest: OptionsManifest = versions.into_iter().collect();
        let report = RefreshReport {
            tags_removed,
            tags_found: tags.len(),
            versions: manifest.len(),
            skipped,
        };

        Ok((manifest, report))
    }

    /// Check out `tag` and parse its options file
    async fn options_at(&self, repo: &Path, tag: &str) -> Result<Vec<OptionDescriptor>, String> {
        self.git
            .checkout(repo, tag)
            .await
            .map_err(|e| format!("checkout failed: {}", e))?;

        let path = repo.join(&self.config.options_file);
        let content = fs::read(&path)
            .await
            .map_err(|e| format!("reading {}: {}", self.config.options_file, e))?;

        parse_descriptors(&content)
            .map_err(|e| format!("parsing {}: {}", self.config.options_file, e))
    }

    /// Refresh immediately, then every poll period until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.config.poll_period();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.refresh_once() => match result {
                    Ok(report) => info!(
                        "Refreshed options: {} versions ({} tags, {} skipped)",
                        report.versions,
                        report.tags_found,
                        report.skipped.len()
                    ),
                    Err(e) => warn!("Refresh failed: {}", e),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        info!("Repository refresher stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
