//! Error types for brewbot
//!
//! All modules use `BuildBotResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for brewbot operations
pub type BuildBotResult<T> = Result<T, BuildBotError>;

/// All errors that can occur in brewbot
#[derive(Error, Debug)]
pub enum BuildBotError {
    // Request errors
    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    #[error("Could not read request body: {0}")]
    RequestBody(String),

    #[error("{0} option must be supplied")]
    MissingField(String),

    #[error("Invalid board name: {0:?}")]
    InvalidBoard(String),

    #[error("Build version {0} is invalid")]
    UnknownVersion(String),

    #[error("Unsupported value for option {name}: {kind} (expected string, integer or boolean)")]
    UnsupportedOption { name: String, kind: String },

    // Repository errors
    #[error("git {command} failed")]
    Git { command: String, output: String },

    #[error("Local mirror missing after clone: {0}")]
    MirrorMissing(PathBuf),

    #[error("Could not create local mirror after {attempts} attempts: {source}")]
    BootstrapExhausted {
        attempts: u32,
        #[source]
        source: Box<BuildBotError>,
    },

    // Build errors
    #[error("{step} failed with {status}")]
    ToolFailed {
        step: String,
        status: String,
        output: String,
    },

    #[error("Build artifact not found at {path}")]
    ArtifactMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {secs}s: {command}")]
    CommandTimeout { command: String, secs: u64 },

    #[error("Build exceeded its {0}s deadline")]
    DeadlineExceeded(u64),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl BuildBotError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether the caller is at fault (maps to a 400 response)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::RequestBody(_)
                | Self::MissingField(_)
                | Self::InvalidBoard(_)
                | Self::UnknownVersion(_)
                | Self::UnsupportedOption { .. }
        )
    }

    /// Auxiliary diagnostic text, such as captured tool output
    pub fn context(&self) -> Vec<String> {
        match self {
            Self::ToolFailed { output, .. } | Self::Git { output, .. } => vec![output.clone()],
            Self::BootstrapExhausted { source, .. } => source.context(),
            _ => vec![],
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BootstrapExhausted { .. } => {
                Some("Check the --git repository URL and that git can reach it")
            }
            Self::ConfigInvalid { .. } => Some("Fix the file or point --config at another one"),
            _ => None,
        }
    }
}
