//! Scan orchestration for `netsieve`.
//! walk → analyze → deduplicate → diff against the rule file → append.

use std::collections::BTreeSet;
use std::path::Path;

use rayon::prelude::{ParallelBridge, ParallelIterator};
use tracing::{info, warn};

use crate::config::{Config, DEFAULT_MARKER};
use crate::discovery;
use crate::error::Result;
use crate::rules::{AppendOutcome, RuleStore};
use crate::types::{Discovery, FileVerdict, ScanSummary};

use super::Analyzer;

/// Knobs for one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub follow_links: bool,
    /// Analysis worker threads; 0 uses the global rayon pool.
    pub jobs: usize,
    pub marker: String,
    pub dry_run: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            jobs: 0,
            marker: DEFAULT_MARKER.to_string(),
            dry_run: false,
        }
    }
}

impl ScanOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            follow_links: config.scan.follow_links,
            jobs: config.scan.jobs,
            marker: config.rules.marker.clone(),
            dry_run: false,
        }
    }
}

/// Composes the walker, the analyzer and the rule store.
pub struct Engine {
    analyzer: Analyzer,
    options: ScanOptions,
}

impl Engine {
    #[must_use]
    pub fn new(analyzer: Analyzer, options: ScanOptions) -> Self {
        Self { analyzer, options }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Analyzer::new(config.heuristics()),
            ScanOptions::from_config(config),
        )
    }

    /// Report missing names without writing them.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.options.dry_run = dry_run;
    }

    /// Walks `root` and analyzes every candidate.
    ///
    /// # Errors
    /// Returns [`NetsieveError::Path`](crate::error::NetsieveError::Path) if
    /// `root` is not a directory.
    pub fn discover(&self, root: &Path) -> Result<Discovery> {
        let start = std::time::Instant::now();
        let root = discovery::resolve_root(root)?;
        let candidates = discovery::walk(&root, self.options.follow_links);

        // Workers produce independent verdicts; the name set is built once
        // they have all finished.
        let analyze = || -> Vec<FileVerdict> {
            candidates
                .par_bridge()
                .map(|c| FileVerdict {
                    verdict: self.analyzer.analyze(&c.path),
                    path: c.path,
                    filename: c.filename,
                })
                .collect()
        };
        let mut files = match self.pool() {
            Some(pool) => pool.install(analyze),
            None => analyze(),
        };
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let capable: BTreeSet<String> = files
            .iter()
            .filter(|f| f.verdict.is_capable())
            .map(|f| f.filename.clone())
            .collect();

        let discovery = Discovery {
            root,
            capable,
            files,
            duration_ms: start.elapsed().as_millis(),
        };
        info!(
            candidates = discovery.candidates(),
            capable = discovery.capable.len(),
            parse_failures = discovery.parse_failures(),
            "discovery finished"
        );
        Ok(discovery)
    }

    /// Merges the discovered names into the rule file.
    ///
    /// # Errors
    /// Returns [`NetsieveError::RuleFile`](crate::error::NetsieveError::RuleFile)
    /// if the rule file cannot be loaded or written.
    pub fn persist(&self, discovery: &Discovery, rule_path: &Path) -> Result<ScanSummary> {
        let mut store = RuleStore::load(rule_path)?;

        let appended = if self.options.dry_run {
            store.missing(&discovery.capable)
        } else {
            match store.append(&discovery.capable, &self.options.marker)? {
                AppendOutcome::NothingToAdd => Vec::new(),
                AppendOutcome::Appended(names) => names,
            }
        };

        Ok(ScanSummary {
            found: discovery.capable.len(),
            added: appended.len(),
            appended,
            dry_run: self.options.dry_run,
        })
    }

    /// Full scan: [`discover`](Self::discover) then [`persist`](Self::persist).
    ///
    /// # Errors
    /// Returns the path or rule file error that stopped the scan.
    pub fn run(&self, root: &Path, rule_path: &Path) -> Result<ScanSummary> {
        let discovery = self.discover(root)?;
        self.persist(&discovery, rule_path)
    }

    fn pool(&self) -> Option<rayon::ThreadPool> {
        if self.options.jobs == 0 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("falling back to the global thread pool: {e}");
                None
            }
        }
    }
}
