//! Error taxonomy for evaluation runs.
//!
//! Only discovery, configuration and persistence problems surface here.
//! Per-item scorer failures are folded into the batch summary instead.

use std::path::PathBuf;

/// Errors that abort an evaluation run.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("cannot list files under {root:?}: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot prepare output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pairing error: {0}")]
    Pairing(String),

    #[error("cannot write report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Numeric text that matched the token grammar but is not a valid float.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed score token {token:?} in line {line:?}")]
pub struct ScoreParseError {
    pub token: String,
    pub line: String,
}

/// Result type for evaluation runs.
pub type Result<T> = std::result::Result<T, EvalError>;
