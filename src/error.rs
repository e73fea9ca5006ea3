// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// The conditions that stop a scan. Everything recoverable is already a
/// verdict by the time it reaches the scanner.
#[derive(Debug, Error)]
pub enum NetsieveError {
    #[error("scan root {path} is not a readable directory: {reason}")]
    Path { path: PathBuf, reason: String },

    #[error("rule file error: {source} (path: {path})")]
    RuleFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl NetsieveError {
    pub(crate) fn rule_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RuleFile {
            source,
            path: path.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetsieveError>;
