// src/config/mod.rs
pub mod types;

pub use self::types::{Config, HeuristicsConfig, RulesConfig, ScanConfig, DEFAULT_MARKER};

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{NetsieveError, Result};
use crate::heuristics::Heuristics;
use crate::rules;

/// Looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "netsieve.toml";

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration.
    ///
    /// An explicit path must exist and parse. Without one, `netsieve.toml` in
    /// the working directory is used if present; a broken implicit file is
    /// logged and ignored.
    ///
    /// # Errors
    /// Returns [`NetsieveError::Config`] if the explicit file is unreadable or
    /// invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = fs::read_to_string(path).map_err(|e| NetsieveError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            return Self::parse_toml(&content, path);
        }

        let implicit = Path::new(CONFIG_FILE);
        let Ok(content) = fs::read_to_string(implicit) else {
            debug!("no {CONFIG_FILE} found, using defaults");
            return Ok(Self::new());
        };
        match Self::parse_toml(&content, implicit) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("ignoring {CONFIG_FILE}: {e}");
                Ok(Self::new())
            }
        }
    }

    /// # Errors
    /// Returns [`NetsieveError::Config`] if `content` is not valid config TOML.
    pub fn parse_toml(content: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| NetsieveError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    /// Returns [`NetsieveError::Config`] naming `origin` if the rule marker
    /// contains `#` or a line break.
    pub fn validate(&self, origin: &Path) -> Result<()> {
        if rules::is_valid_marker(&self.rules.marker) {
            return Ok(());
        }
        Err(NetsieveError::Config {
            path: origin.to_path_buf(),
            message: format!(
                "rule marker {:?} must not contain '#' or line breaks",
                self.rules.marker
            ),
        })
    }

    /// Builds the analyzer heuristics from the configured keyword lists.
    #[must_use]
    pub fn heuristics(&self) -> Heuristics {
        Heuristics::new(&self.heuristics.dlls, &self.heuristics.symbols)
    }
}
