//! Serve command - mirror the repository and run the HTTP server

use crate::build::BuildPipeline;
use crate::catalog::{OptionsCache, SourceMirror};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::{BuildBotError, BuildBotResult};
use crate::git::Git;
use crate::process::{ProcessRunner, SystemRunner};
use crate::refresher::RepositoryRefresher;
use crate::server::{self, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> BuildBotResult<()> {
    let mut config = config.clone();
    args.apply(&mut config);

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
    let git = Git::new(runner.clone(), config.repository.git_timeout());
    let cache = Arc::new(OptionsCache::new());
    let mirror = Arc::new(SourceMirror::new(config.repository.mirror_path()));

    let mut refresher = RepositoryRefresher::new(
        config.repository.clone(),
        git.clone(),
        mirror.clone(),
        cache.clone(),
    );
    refresher.bootstrap().await?;

    let shutdown = CancellationToken::new();
    let refresh_task = refresher.spawn(shutdown.child_token());

    let pipeline = BuildPipeline::new(
        config.build.clone(),
        cache.clone(),
        mirror,
        git,
        runner.clone(),
    );
    let state = Arc::new(AppState {
        cache,
        pipeline,
        runner,
        debug: config.server.debug,
        max_request_bytes: config.server.max_request_bytes,
    });

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| BuildBotError::io(format!("binding {}", config.server.bind), e))?;
    info!(
        "Listening on {} (debug {})",
        config.server.bind,
        if config.server.debug { "on" } else { "off" }
    );

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        signal_token.cancel();
    });

    let result = server::serve(listener, state, shutdown.clone()).await;
    shutdown.cancel();

    if let Err(e) = refresh_task.await {
        warn!("Refresher task ended abnormally: {}", e);
    }

    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
