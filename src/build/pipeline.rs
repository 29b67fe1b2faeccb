//! Per-request build pipeline
//!
//! Validates a request against the options cache, stages a private
//! workspace cloned from the local mirror, runs the configure and build
//! tools, and reads back the artifact.

use super::request::BuildRequest;
use super::workspace::{BuildWorkspace, SettingsRecord};
use crate::catalog::{OptionsCache, SourceMirror};
use crate::config::BuildConfig;
use crate::error::{BuildBotError, BuildBotResult};
use crate::git::Git;
use crate::process::{output_tail, Invocation, ProcessRunner};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything a successful build produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub request_id: Uuid,
    /// Workspace the build ran in (already removed)
    pub workspace: PathBuf,
    /// Request body as received
    pub request: String,
    pub artifact: Vec<u8>,
    pub configure_output: String,
    pub build_output: String,
}

/// Stateless build driver shared by all request handlers
pub struct BuildPipeline {
    config: BuildConfig,
    cache: Arc<OptionsCache>,
    mirror: Arc<SourceMirror>,
    git: Git,
    runner: Arc<dyn ProcessRunner>,
}

impl BuildPipeline {
    pub fn new(
        config: BuildConfig,
        cache: Arc<OptionsCache>,
        mirror: Arc<SourceMirror>,
        git: Git,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            cache,
            mirror,
            git,
            runner,
        }
    }

    /// Run one build request from raw body bytes to artifact.
    ///
    /// The whole run is bounded by the configured request deadline. On
    /// expiry any running tool is killed and dropping the workspace
    /// removes it.
    pub async fn execute(&self, caller: &str, body: &[u8]) -> BuildBotResult<BuildOutcome> {
        let deadline = self.config.request_deadline();
        let request_id = Uuid::new_v4();
        let run = self
            .run(request_id, caller, body)
            .instrument(info_span!("request", %request_id));

        tokio::time::timeout(deadline, run)
            .await
            .map_err(|_| BuildBotError::DeadlineExceeded(deadline.as_secs()))?
    }

    async fn run(
        &self,
        request_id: Uuid,
        caller: &str,
        body: &[u8],
    ) -> BuildBotResult<BuildOutcome> {
        let request = BuildRequest::parse(body)?;
        if !self.cache.contains(&request.version) {
            return Err(BuildBotError::UnknownVersion(request.version));
        }
        let flags = request.configure_flags();

        info!(
            board = %request.board,
            version = %request.version,
            "Starting build"
        );

        let root = self.config.workspace_root();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| BuildBotError::io(format!("creating {}", root.display()), e))?;
        let workspace = BuildWorkspace::create(&root, caller).await?;
        let location = workspace.path().to_path_buf();
        debug!("Workspace: {}", location.display());

        let raw_request = String::from_utf8_lossy(body).into_owned();
        let record = SettingsRecord {
            request_id,
            received_at: Utc::now(),
            caller,
            version: &request.version,
            board: &request.board,
            request: &raw_request,
        };
        let built = self.build_in(&workspace, &request, flags, &record).await;

        if let Err(e) = workspace.close().await {
            warn!("Could not remove workspace: {}", e);
        }
        let (artifact, configure_output, build_output) = built?;

        Ok(BuildOutcome {
            request_id,
            workspace: location,
            request: raw_request,
            artifact,
            configure_output,
            build_output,
        })
    }

    /// Stage the source in `workspace`, configure, build and read the
    /// artifact. Returns the artifact with the configure and build output.
    async fn build_in(
        &self,
        workspace: &BuildWorkspace,
        request: &BuildRequest,
        flags: Vec<String>,
        record: &SettingsRecord<'_>,
    ) -> BuildBotResult<(Vec<u8>, String, String)> {
        let source = workspace.source_dir();
        {
            let mirror = self.mirror.read().await;
            self.git
                .clone_repo(&mirror.path().to_string_lossy(), &source)
                .await?;
        }
        self.git.checkout(&source, &request.version).await?;
        workspace.write_settings(record).await?;

        let build_dir = workspace.build_dir(&self.config.build_subdir);
        fs::create_dir_all(&build_dir)
            .await
            .map_err(|e| BuildBotError::io(format!("creating {}", build_dir.display()), e))?;

        let mut configure_args = flags;
        configure_args.push(source.to_string_lossy().into_owned());
        let configure_output = self
            .run_step(&self.config.configure_program, configure_args, &build_dir)
            .await?;
        let build_output = self
            .run_step(&self.config.build_program, Vec::new(), &build_dir)
            .await?;

        let artifact_path = build_dir.join(self.config.artifact_path(&request.board));
        let artifact = fs::read(&artifact_path)
            .await
            .map_err(|source| BuildBotError::ArtifactMissing {
                path: artifact_path.clone(),
                source,
            })?;

        info!(bytes = artifact.len(), "Build finished");
        Ok((artifact, configure_output, build_output))
    }

    /// Run a toolchain step, returning its combined output
    async fn run_step(
        &self,
        program: &str,
        args: Vec<String>,
        cwd: &Path,
    ) -> BuildBotResult<String> {
        let invocation = Invocation::new(program, cwd)
            .args(args)
            .timeout(self.config.command_timeout());
        let output = self.runner.run(&invocation).await?;
        let combined = output.combined();

        if !output.success() {
            warn!(
                "{} failed with {}:\n{}",
                program,
                output.status_label(),
                output_tail(&combined)
            );
            return Err(BuildBotError::ToolFailed {
                step: program.to_string(),
                status: output.status_label(),
                output: combined,
            });
        }

        Ok(combined)
    }
}
