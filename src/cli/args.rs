//! CLI argument definitions using clap derive

use crate::config::Config;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// BrewBot - BrewTroller firmware build server
///
/// Mirrors the firmware repository, serves the build options of every
/// release and compiles custom images over HTTP.
#[derive(Parser, Debug)]
#[command(name = "brewbot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BREWBOT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the repository and serve build requests
    Serve(ServeArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Return error details, tool output and host info in responses
    #[arg(long)]
    pub debug: bool,

    /// Interval between repository refreshes (e.g. 300, 90s, 5m, 1h)
    #[arg(long, value_name = "DURATION", value_parser = parse_period)]
    pub poll: Option<u64>,

    /// Upstream firmware repository URL
    #[arg(long, value_name = "URL")]
    pub git: Option<String>,

    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

impl ServeArgs {
    /// Overlay command-line flags on the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if self.debug {
            config.server.debug = true;
        }
        if let Some(secs) = self.poll {
            config.repository.poll_period_secs = secs;
        }
        if let Some(ref url) = self.git {
            config.repository.url = url.clone();
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration to the config file path
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Parse a poll period in seconds, with an optional `s`, `m` or `h` suffix
fn parse_period(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (digits, scale) = match value.char_indices().last() {
        Some((i, 's')) => (&value[..i], 1),
        Some((i, 'm')) => (&value[..i], 60),
        Some((i, 'h')) => (&value[..i], 3600),
        _ => (value, 1),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", value))?;
    if amount == 0 {
        return Err("poll period must be positive".to_string());
    }

    amount
        .checked_mul(scale)
        .ok_or_else(|| format!("duration '{}' is too large", value))
}
