// src/heuristics.rs
//! Keyword lists that decide whether an import counts as network evidence.

// --- Default keyword lists ---
pub const DEFAULT_NETWORK_DLLS: &[&str] = &["ws2_32.dll", "wininet.dll", "winhttp.dll"];

pub const DEFAULT_NETWORK_SYMBOLS: &[&str] = &[
    "socket", "connect", "send", "recv", "inet", "http", "url", "gethost",
];

/// Injected into the analyzer so the lists can come from config or tests.
///
/// DLL names match case-insensitively and exactly; symbol keywords match
/// case-insensitively as substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heuristics {
    dlls: Vec<String>,
    symbols: Vec<String>,
}

impl Heuristics {
    #[must_use]
    pub fn new<D, S>(dlls: D, symbols: S) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            dlls: normalize(dlls),
            symbols: normalize(symbols),
        }
    }

    #[must_use]
    pub fn is_network_dll(&self, dll_name: &str) -> bool {
        self.dlls.iter().any(|d| d.eq_ignore_ascii_case(dll_name))
    }

    /// Returns the first keyword contained in `symbol`, if any.
    #[must_use]
    pub fn network_keyword(&self, symbol: &str) -> Option<&str> {
        let lower = symbol.to_ascii_lowercase();
        self.symbols
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn dlls(&self) -> &[String] {
        &self.dlls
    }

    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_DLLS, DEFAULT_NETWORK_SYMBOLS)
    }
}

fn normalize<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
