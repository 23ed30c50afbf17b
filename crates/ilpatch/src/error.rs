use thiserror::Error;

use crate::instruction::Label;
use crate::search::Direction;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Pattern not found searching {direction} from offset {start}: [{pattern}]")]
    PatternNotFound {
        start: usize,
        direction: Direction,
        pattern: String,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Unresolved label {label} referenced at offset {position}")]
    UnresolvedLabel { label: Label, position: usize },

    #[error("Instruction at offset {position} is not a branch: {instruction}")]
    NotABranch { position: usize, instruction: String },

    #[error("Incompatible target {target}: {message}")]
    IncompatibleTarget { target: String, message: String },

    #[error("Cannot declare local of type {type_name}: slots are limited to {limit}")]
    TooManyLocals { type_name: String, limit: usize },

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a failed pattern search
    pub fn is_pattern_not_found(&self) -> bool {
        matches!(self, Error::PatternNotFound { .. })
    }

    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub(crate) fn invalid_range(message: impl Into<String>) -> Self {
        Error::InvalidRange(message.into())
    }

    pub(crate) fn incompatible(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::IncompatibleTarget {
            target: target.into(),
            message: message.into(),
        }
    }
}
