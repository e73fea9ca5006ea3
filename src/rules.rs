// src/rules.rs
//! The persisted process-name allow-list.
//!
//! The file is line oriented. Lines of the form
//! `- PROCESS-NAME,<name>[ #<comment>]` are rule entries; every other line is
//! opaque. The store only ever appends: existing bytes are never rewritten.

use std::collections::{BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs2::FileExt;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{NetsieveError, Result};

pub const ENTRY_PREFIX: &str = "- PROCESS-NAME,";

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*- PROCESS-NAME,([^#]*)").unwrap_or_else(|_| panic!("Invalid Regex"))
});

/// A parsed rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub process_name: String,
    pub raw_line: String,
}

/// Result of [`RuleStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    NothingToAdd,
    /// Names written, in file order.
    Appended(Vec<String>),
}

impl AppendOutcome {
    #[must_use]
    pub fn added(&self) -> &[String] {
        match self {
            Self::NothingToAdd => &[],
            Self::Appended(names) => names,
        }
    }
}

/// An open, exclusively locked rule file and a snapshot of its contents.
///
/// The advisory lock is held from [`load`](Self::load) until the store is
/// dropped, so concurrent scans against one file serialize their
/// load-check-append sequences. A read-only file still loads; it only fails
/// once [`append`](Self::append) has something to write.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    file: File,
    writable: bool,
    lines: Vec<String>,
    entries: Vec<RuleEntry>,
    names: HashSet<String>,
    ends_with_newline: bool,
}

impl RuleStore {
    /// Opens and locks the rule file, then reads every line.
    ///
    /// # Errors
    /// Returns [`NetsieveError::RuleFile`] if the file is missing or cannot
    /// be read.
    pub fn load(path: &Path) -> Result<Self> {
        let (mut file, writable) = open(path)?;
        lock(&file, path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| NetsieveError::rule_file(path, e))?;

        let text = String::from_utf8_lossy(&raw);
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let entries: Vec<RuleEntry> = lines.iter().filter_map(|l| parse_entry(l)).collect();
        let names = entries.iter().map(|e| e.process_name.clone()).collect();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            writable,
            lines,
            entries,
            names,
            ends_with_newline: raw.is_empty() || raw.ends_with(b"\n"),
        })
    }

    /// Exact, case-sensitive membership.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Every line of the file, verbatim, without line terminators.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Names from `names` that are not yet in the file.
    #[must_use]
    pub fn missing(&self, names: &BTreeSet<String>) -> Vec<String> {
        names
            .iter()
            .filter(|n| !self.contains(n))
            .filter(|n| is_representable(n))
            .cloned()
            .collect()
    }

    /// Appends one rule line per new name, in sorted order, in a single write.
    ///
    /// Names already present are skipped. If nothing is left no write happens.
    ///
    /// # Errors
    /// Returns [`NetsieveError::RuleFile`] if the file is read-only or the
    /// write fails.
    pub fn append(&mut self, names: &BTreeSet<String>, marker: &str) -> Result<AppendOutcome> {
        let new_names = self.missing(names);
        if new_names.is_empty() {
            return Ok(AppendOutcome::NothingToAdd);
        }

        if !self.writable {
            let denied = io::Error::new(io::ErrorKind::PermissionDenied, "rule file is read-only");
            return Err(NetsieveError::rule_file(&self.path, denied));
        }

        let new_lines: Vec<String> = new_names.iter().map(|n| format_entry(n, marker)).collect();
        let mut buf = String::new();
        if !self.ends_with_newline {
            buf.push('\n');
        }
        for line in &new_lines {
            buf.push_str(line);
            buf.push('\n');
        }

        self.file
            .write_all(buf.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| NetsieveError::rule_file(&self.path, e))?;
        info!(path = %self.path.display(), count = new_names.len(), "appended rules");

        for (name, line) in new_names.iter().zip(new_lines) {
            self.names.insert(name.clone());
            self.entries.push(RuleEntry {
                process_name: name.clone(),
                raw_line: line.clone(),
            });
            self.lines.push(line);
        }
        self.ends_with_newline = true;

        Ok(AppendOutcome::Appended(new_names))
    }
}

impl Drop for RuleStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Opens for read+append, falling back to read-only when writing is denied.
/// The lock and any later write share this one handle.
fn open(path: &Path) -> Result<(File, bool)> {
    match OpenOptions::new().read(true).append(true).open(path) {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            debug!(path = %path.display(), "rule file is not writable, opening read-only");
            let file = File::open(path).map_err(|e| NetsieveError::rule_file(path, e))?;
            Ok((file, false))
        }
        Err(e) => Err(NetsieveError::rule_file(path, e)),
    }
}

fn lock(file: &File, path: &Path) -> Result<()> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(()),
        Err(e) if is_contended(&e) => {
            info!(path = %path.display(), "waiting for rule file lock");
            FileExt::lock_exclusive(file).map_err(|e| NetsieveError::rule_file(path, e))
        }
        Err(e) => Err(NetsieveError::rule_file(path, e)),
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Extracts the process name from a rule line.
#[must_use]
pub fn parse_entry(line: &str) -> Option<RuleEntry> {
    let caps = ENTRY_RE.captures(line)?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    Some(RuleEntry {
        process_name: name.to_string(),
        raw_line: line.to_string(),
    })
}

/// Renders the line written for an automatically discovered name.
#[must_use]
pub fn format_entry(name: &str, marker: &str) -> String {
    format!("{ENTRY_PREFIX}{name} #{marker}")
}

/// A marker is written after `#` on the same line, so it must not start a
/// second comment or break the line.
#[must_use]
pub fn is_valid_marker(marker: &str) -> bool {
    !marker.contains(['#', '\n', '\r'])
}

/// A name survives a write/parse cycle only if it has no comment marker, no
/// line break and no surrounding whitespace.
fn is_representable(name: &str) -> bool {
    let ok = !name.is_empty()
        && name.trim() == name
        && !name.contains(['#', '\n', '\r']);
    if !ok {
        warn!(name, "process name cannot be stored as a rule line, skipping");
    }
    ok
}
