// src/types.rs
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A file the walker thinks is worth analyzing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCandidate {
    pub path: PathBuf,
    pub filename: String,
}

impl ExecutableCandidate {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            filename,
        }
    }
}

/// Which heuristic tier produced the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTier {
    Dll,
    Symbol,
}

/// The import that made a file count as network capable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub tier: EvidenceTier,
    pub dll: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{}!{symbol}", self.dll),
            None => write!(f, "{}", self.dll),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CapabilityVerdict {
    Capable { evidence: Evidence },
    NotCapable,
    /// Malformed or unreadable input. Counted as not capable by the scanner.
    ParseFailed { reason: String },
}

impl CapabilityVerdict {
    #[must_use]
    pub fn parse_failed(reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_capable(&self) -> bool {
        matches!(self, Self::Capable { .. })
    }

    #[must_use]
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseFailed { .. })
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Capable { .. } => "capable",
            Self::NotCapable => "not capable",
            Self::ParseFailed { .. } => "parse failed",
        }
    }
}

/// A verdict tied to the file it was computed for.
#[derive(Debug, Clone, Serialize)]
pub struct FileVerdict {
    pub path: PathBuf,
    pub filename: String,
    #[serde(flatten)]
    pub verdict: CapabilityVerdict,
}

/// Result of walking and analyzing a directory tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub root: PathBuf,
    /// Filenames of capable executables, deduplicated and sorted.
    pub capable: BTreeSet<String>,
    pub files: Vec<FileVerdict>,
    pub duration_ms: u128,
}

impl Discovery {
    #[must_use]
    pub fn candidates(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn parse_failures(&self) -> usize {
        self.files.iter().filter(|f| f.verdict.is_parse_failure()).count()
    }

    #[must_use]
    pub fn capable_files(&self) -> usize {
        self.files.iter().filter(|f| f.verdict.is_capable()).count()
    }
}

/// Final counts of a scan, plus the names that were (or would be) appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub found: usize,
    pub added: usize,
    pub appended: Vec<String>,
    pub dry_run: bool,
}
