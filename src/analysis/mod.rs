// src/analysis/mod.rs
//! Import-based network capability analysis.

pub mod engine;

pub use self::engine::{Engine, ScanOptions};

use std::path::Path;

use tracing::debug;

use serde::Serialize;

use crate::heuristics::Heuristics;
use crate::pe::{
    self, FileReader, ImageHeaders, ImageKind, ImportDescriptor, ImportSymbol, ImportTable, Reader,
};
use crate::types::{CapabilityVerdict, Evidence, EvidenceTier};

/// Classifies executables by what they import.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    heuristics: Heuristics,
}

impl Analyzer {
    #[must_use]
    pub fn new(heuristics: Heuristics) -> Self {
        Self { heuristics }
    }

    /// Analyzes the file at `path`.
    ///
    /// Never fails: unreadable or malformed files come back as
    /// [`CapabilityVerdict::ParseFailed`].
    #[must_use]
    pub fn analyze(&self, path: &Path) -> CapabilityVerdict {
        let verdict = match FileReader::open(path) {
            Ok(reader) => self.analyze_reader(&reader),
            Err(e) => CapabilityVerdict::parse_failed(e.to_string()),
        };
        debug!(path = %path.display(), verdict = verdict.label(), "analyzed");
        verdict
    }

    /// Analyzes an already opened byte source.
    #[must_use]
    pub fn analyze_reader<R: Reader>(&self, reader: &R) -> CapabilityVerdict {
        self.classify(reader)
            .unwrap_or_else(|e| CapabilityVerdict::parse_failed(e.to_string()))
    }

    fn classify<R: Reader>(&self, reader: &R) -> pe::Result<CapabilityVerdict> {
        let headers = ImageHeaders::read_from(reader)?;
        let Some(table) = ImportTable::locate(reader, &headers) else {
            return Ok(CapabilityVerdict::NotCapable);
        };

        for entry in table.entries() {
            let entry = entry?;
            let dll = entry.dll_name.clone().unwrap_or_default();

            if entry.dll_name.is_some() && self.heuristics.is_network_dll(&dll) {
                return Ok(capable(EvidenceTier::Dll, dll, None));
            }

            for symbol in table.symbols(&entry) {
                if let ImportSymbol::Named(name) = symbol {
                    if self.heuristics.network_keyword(&name).is_some() {
                        return Ok(capable(EvidenceTier::Symbol, dll, Some(name)));
                    }
                }
            }
        }

        Ok(CapabilityVerdict::NotCapable)
    }
}

fn capable(tier: EvidenceTier, dll: String, symbol: Option<String>) -> CapabilityVerdict {
    CapabilityVerdict::Capable {
        evidence: Evidence { tier, dll, symbol },
    }
}

/// Header facts and the import table of one image, for `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub kind: ImageKind,
    pub machine: u16,
    pub sections: Vec<String>,
    /// Empty when the image has no import directory.
    pub imports: Vec<ImportDescriptor>,
}

/// # Errors
/// Returns the structural error when the file is not a readable PE image.
pub fn inspect_image(path: &Path) -> pe::Result<ImageInfo> {
    let reader = FileReader::open(path)?;
    inspect_image_from(&reader)
}

/// # Errors
/// Returns the structural error when the source is not a readable PE image.
pub fn inspect_image_from<R: Reader>(reader: &R) -> pe::Result<ImageInfo> {
    let headers = ImageHeaders::read_from(reader)?;
    let imports = match ImportTable::locate(reader, &headers) {
        Some(table) => table.read_all()?,
        None => Vec::new(),
    };
    Ok(ImageInfo {
        kind: headers.kind,
        machine: headers.machine,
        sections: headers.sections.iter().map(|s| s.name_str()).collect(),
        imports,
    })
}
