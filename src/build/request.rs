//! Build request parsing and configure-flag translation

use crate::error::{BuildBotError, BuildBotResult};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field naming the target hardware
pub const BOARD_FIELD: &str = "board";

/// Field naming the firmware version; validated, never passed to the toolchain
pub const VERSION_FIELD: &str = "BuildVersion";

/// A build option value: string, integer or boolean
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Integer(Number),
    Flag(bool),
}

impl OptionValue {
    fn from_json(name: &str, value: Value) -> BuildBotResult<Self> {
        let kind = match value {
            Value::String(s) => return Ok(Self::Text(s)),
            Value::Bool(b) => return Ok(Self::Flag(b)),
            Value::Number(n) if n.is_i64() || n.is_u64() => return Ok(Self::Integer(n)),
            Value::Number(_) => "non-integer number",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        Err(BuildBotError::UnsupportedOption {
            name: name.to_string(),
            kind: kind.to_string(),
        })
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Flag(true) => write!(f, "ON"),
            Self::Flag(false) => write!(f, "OFF"),
        }
    }
}

/// A validated client build request
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Target hardware identifier
    pub board: String,
    /// Requested firmware version tag
    pub version: String,
    /// Every option except the version, including `board`
    pub options: BTreeMap<String, OptionValue>,
}

impl BuildRequest {
    /// Parse a raw request body.
    ///
    /// Fails with a client error for malformed JSON, a missing or non-string
    /// `board`/`BuildVersion`, an unsafe board name, or an option whose value
    /// is not a string, integer or boolean.
    pub fn parse(body: &[u8]) -> BuildBotResult<Self> {
        let mut fields: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| BuildBotError::InvalidRequest(e.to_string()))?;

        let board = required_string(&fields, BOARD_FIELD)?;
        let version = required_string(&fields, VERSION_FIELD)?;
        validate_board(&board)?;
        fields.remove(VERSION_FIELD);

        let options = fields
            .into_iter()
            .map(|(name, value)| {
                let value = OptionValue::from_json(&name, value)?;
                Ok((name, value))
            })
            .collect::<BuildBotResult<BTreeMap<_, _>>>()?;

        Ok(Self {
            board,
            version,
            options,
        })
    }

    /// `-D<name>=<value>` flags for the build-configuration step, sorted by name
    pub fn configure_flags(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(name, value)| format!("-D{}={}", name, value))
            .collect()
    }
}

fn required_string(fields: &Map<String, Value>, name: &str) -> BuildBotResult<String> {
    match fields.get(name) {
        None => Err(BuildBotError::MissingField(name.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(BuildBotError::InvalidRequest(format!(
            "{} must be a string",
            name
        ))),
    }
}

/// The board names the artifact file, so it must be a single path component
fn validate_board(board: &str) -> BuildBotResult<()> {
    let unsafe_name = board.is_empty()
        || board == "."
        || board == ".."
        || board.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(BuildBotError::InvalidBoard(board.to_string()));
    }
    Ok(())
}
