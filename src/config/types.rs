use serde::{Deserialize, Serialize};

use crate::heuristics::{DEFAULT_NETWORK_DLLS, DEFAULT_NETWORK_SYMBOLS};

/// Comment appended to every rule the scanner writes. Matches the marker
/// carried by existing hand-maintained rule files.
pub const DEFAULT_MARKER: &str = "自动扫描添加";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    #[serde(default = "default_dlls")]
    pub dlls: Vec<String>,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            dlls: default_dlls(),
            symbols: default_symbols(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub follow_links: bool,
    /// Worker threads for analysis; 0 lets rayon decide.
    #[serde(default)]
    pub jobs: usize,
}

/// Contents of `netsieve.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

fn default_dlls() -> Vec<String> {
    DEFAULT_NETWORK_DLLS.iter().map(|s| (*s).to_string()).collect()
}

fn default_symbols() -> Vec<String> {
    DEFAULT_NETWORK_SYMBOLS.iter().map(|s| (*s).to_string()).collect()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}
