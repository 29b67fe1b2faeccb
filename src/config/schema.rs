//! Configuration schema for brewbot
//!
//! Configuration is stored at `~/.config/brewbot/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Upstream repository and mirror settings
    pub repository: RepositoryConfig,

    /// Build toolchain settings
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// Include error details, tool output and host info in responses
    pub debug: bool,

    /// Largest accepted build request body
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            debug: false,
            max_request_bytes: 1024 * 1024,
        }
    }
}

/// Upstream repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Remote repository to mirror
    pub url: String,

    /// Local mirror location (defaults to the state directory)
    pub mirror_dir: Option<PathBuf>,

    /// Options manifest path, relative to the repository root
    pub options_file: String,

    /// Glob handed to `git tag -l` when discovering versions
    pub tag_pattern: String,

    /// Seconds between refresh cycles
    pub poll_period_secs: u64,

    /// Timeout for each git invocation
    pub git_timeout_secs: u64,

    /// Clone attempts before startup gives up
    pub bootstrap_attempts: u32,

    /// Initial delay between clone attempts, doubled after each failure
    pub bootstrap_backoff_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: "http://github.com/brewtroller/brewtroller".to_string(),
            mirror_dir: None,
            options_file: "options.json".to_string(),
            tag_pattern: "v[0-9]*.[0-9]*.[0-9]*".to_string(),
            poll_period_secs: 300,
            git_timeout_secs: 300,
            bootstrap_attempts: 5,
            bootstrap_backoff_secs: 2,
        }
    }
}

impl RepositoryConfig {
    /// Resolved local mirror path
    pub fn mirror_path(&self) -> PathBuf {
        self.mirror_dir
            .clone()
            .unwrap_or_else(|| super::ConfigManager::state_dir().join("BrewTroller"))
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

/// Build toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Parent directory for per-request workspaces (defaults to system temp)
    pub workspace_root: Option<PathBuf>,

    /// Build-configuration tool, invoked with `-D` flags and the source path
    pub configure_program: String,

    /// Build tool, invoked without arguments
    pub build_program: String,

    /// Build output directory, relative to the checked-out source
    pub build_subdir: String,

    /// Artifact path relative to the build directory; `{board}` is substituted
    pub artifact_template: String,

    /// Timeout for each configure/build invocation
    pub command_timeout_secs: u64,

    /// Upper bound on a whole build request
    pub request_deadline_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            configure_program: "cmake".to_string(),
            build_program: "make".to_string(),
            build_subdir: "build".to_string(),
            artifact_template: "src/BrewTroller-{board}.hex".to_string(),
            command_timeout_secs: 600,
            request_deadline_secs: 1800,
        }
    }
}

impl BuildConfig {
    /// Resolved workspace parent directory
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Artifact path for a board, relative to the build directory
    pub fn artifact_path(&self, board: &str) -> PathBuf {
        PathBuf::from(self.artifact_template.replace("{board}", board))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}
