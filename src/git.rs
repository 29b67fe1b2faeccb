//! Git operations used by the refresher and build pipeline
//!
//! Thin wrappers over `git` subcommands run through a [`ProcessRunner`].
//! A non-zero exit becomes [`BuildBotError::Git`] carrying the combined
//! output for diagnostics.

use crate::error::{BuildBotError, BuildBotResult};
use crate::process::{Invocation, ProcessRunner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tags passed to a single `git tag -d` invocation
const TAG_DELETE_CHUNK: usize = 100;

/// Git command wrapper bound to a runner and per-command timeout
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl Git {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Run `git <args>` in `cwd`, returning stdout on success
    async fn git(&self, cwd: &Path, args: &[&str]) -> BuildBotResult<String> {
        let invocation = Invocation::new("git", cwd)
            .args(args.iter().copied())
            .timeout(self.timeout);
        let output = self.runner.run(&invocation).await?;

        if output.success() {
            Ok(output.stdout)
        } else {
            Err(BuildBotError::Git {
                command: args.join(" "),
                output: output.combined(),
            })
        }
    }

    /// Clone `source` (URL or local path) into `dest`
    pub async fn clone_repo(&self, source: &str, dest: &Path) -> BuildBotResult<()> {
        let cwd = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let dest = dest.to_string_lossy();
        self.git(cwd, &["clone", source, &dest]).await?;
        Ok(())
    }

    /// Name of the branch currently checked out (`HEAD` when detached)
    pub async fn current_branch(&self, repo: &Path) -> BuildBotResult<String> {
        let out = self.git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    /// Delete every local tag, returning how many were removed
    pub async fn delete_all_tags(&self, repo: &Path) -> BuildBotResult<usize> {
        let listing = self.git(repo, &["tag", "-l"]).await?;
        let tags = split_lines(&listing);

        for chunk in tags.chunks(TAG_DELETE_CHUNK) {
            let mut args = vec!["tag", "-d"];
            args.extend(chunk.iter().map(String::as_str));
            self.git(repo, &args).await?;
        }

        debug!("Deleted {} local tags in {}", tags.len(), repo.display());
        Ok(tags.len())
    }

    /// Pull the latest history for the current branch
    pub async fn pull(&self, repo: &Path) -> BuildBotResult<()> {
        self.git(repo, &["pull"]).await?;
        Ok(())
    }

    /// List tags matching a `git tag -l` glob, skipping blank entries
    pub async fn list_tags(&self, repo: &Path, pattern: &str) -> BuildBotResult<Vec<String>> {
        let listing = self.git(repo, &["tag", "-l", pattern]).await?;
        Ok(split_lines(&listing))
    }

    /// Check out a tag, branch or commit
    pub async fn checkout(&self, repo: &Path, rev: &str) -> BuildBotResult<()> {
        self.git(repo, &["checkout", "--quiet", rev]).await?;
        Ok(())
    }
}

fn split_lines(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
