//! BrewBot - BrewTroller firmware build server
//!
//! CLI entry point that dispatches to subcommands.

use brewbot::cli::{Cli, Commands};
use brewbot::config::ConfigManager;
use brewbot::error::BuildBotResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> BuildBotResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    let debug = config.server.debug || matches!(cli.command, Commands::Serve(ref args) if args.debug);

    // 0 = warn, 1 = info, 2+ = debug; debug mode always logs at debug
    let level = match (cli.verbose, debug) {
        (_, true) | (2.., _) => "debug",
        (1, _) => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("brewbot={}", level)));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve(args) => brewbot::cli::commands::serve(args, &config).await,
        Commands::Config(args) => {
            brewbot::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
