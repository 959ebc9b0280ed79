//! Error types for the event coder.
//!
//! Everything that can go wrong while *loading* (catalogs, configs, pattern
//! files) or while running a pipeline pass over a badly authored pattern set is
//! reported through [`Error`]. Soft, per-candidate problems found while
//! matching (a missing required role, an unknown tense) are not errors: they
//! are logged with `tracing::warn!` and the candidate is dropped.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed s-expression text.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A pattern form that does not compile (unknown keyword, bad arity, ...).
    #[error("pattern error: {0}")]
    Pattern(String),

    /// A `(shortcut ..)` reference that names no reference pattern.
    #[error("unresolved shortcut: {0}")]
    UnresolvedShortcut(String),

    /// Catalog, manifest or configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pipeline pass hit a pattern set that contradicts its own contract.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn pattern(msg: impl Into<String>) -> Self {
        Error::Pattern(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Error::Pipeline(msg.into())
    }

    pub fn syntax(line: usize, msg: impl Into<String>) -> Self {
        Error::Syntax { line, message: msg.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

/// Read a whole file, attaching the path to any I/O failure.
pub(crate) fn read_to_string(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}
