// src/pe/imports.rs
//! Bounded traversal of the Import Directory Table and its lookup tables.
//!
//! Every loop here has a fixed ceiling that does not depend on sizes declared
//! inside the file. Invalid references inside a single item (a DLL name, a
//! thunk table, a hint/name entry) only drop that item; failures reading the
//! descriptor table itself end the walk with an error.

use std::cell::Cell;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use super::error::{PeError, Result};
use super::headers::ImageHeaders;
use super::reader::Reader;

/// Hard cap on descriptors walked per image.
pub const MAX_DESCRIPTORS: u32 = 1024;
/// Hard cap on lookup table entries read per DLL.
pub const MAX_THUNKS_PER_DLL: u32 = 8192;
/// Hard cap on lookup table entries read per image.
pub const MAX_THUNKS_PER_IMAGE: usize = 65_536;
/// Longest DLL or symbol name scanned for a terminator.
pub const MAX_NAME_LEN: usize = 256;

const DESCRIPTOR_SIZE: u32 = 20;
const ORDINAL_FLAG_32: u64 = 0x8000_0000;
const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;
const HINT_NAME_RVA_MASK: u64 = 0x7FFF_FFFF;

/// IMAGE_IMPORT_DESCRIPTOR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDescriptor {
    pub original_first_thunk: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    pub name_rva: u32,
    pub first_thunk: u32,
}

impl RawDescriptor {
    fn parse(data: &[u8; DESCRIPTOR_SIZE as usize]) -> Self {
        let field =
            |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        Self {
            original_first_thunk: field(0),
            time_date_stamp: field(4),
            forwarder_chain: field(8),
            name_rva: field(12),
            first_thunk: field(16),
        }
    }

    /// The all-zero descriptor terminates the table.
    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }

    /// The ILT when present, otherwise the IAT.
    #[must_use]
    pub fn lookup_table_rva(&self) -> u32 {
        if self.original_first_thunk != 0 {
            self.original_first_thunk
        } else {
            self.first_thunk
        }
    }
}

/// One descriptor with its DLL name resolved (if the name RVA is valid).
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub dll_name: Option<String>,
    pub raw: RawDescriptor,
}

/// One lookup table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSymbol {
    Named(String),
    Ordinal(u16),
    /// The hint/name RVA did not resolve.
    Invalid(u32),
}

/// An imported DLL and the names imported from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDescriptor {
    pub dll_name: String,
    pub symbols: BTreeSet<String>,
    pub ordinal_count: usize,
}

/// Lazy view of an image's import table.
pub struct ImportTable<'a, R: Reader> {
    reader: &'a R,
    headers: &'a ImageHeaders,
    directory_rva: u32,
    thunk_budget: Cell<usize>,
}

impl<'a, R: Reader> ImportTable<'a, R> {
    /// Returns `None` when the image has no usable import directory: size zero,
    /// absent from the data directory array, or an RVA that does not resolve.
    #[must_use]
    pub fn locate(reader: &'a R, headers: &'a ImageHeaders) -> Option<Self> {
        let dir = headers.import_directory.filter(|d| !d.is_empty())?;
        headers.locate(dir.virtual_address)?;
        Some(Self {
            reader,
            headers,
            directory_rva: dir.virtual_address,
            thunk_budget: Cell::new(MAX_THUNKS_PER_IMAGE),
        })
    }

    /// Iterates descriptors up to the null terminator.
    #[must_use]
    pub fn entries(&self) -> Entries<'_, 'a, R> {
        Entries {
            table: self,
            index: 0,
            done: false,
        }
    }

    /// Iterates the lookup table of one descriptor.
    #[must_use]
    pub fn symbols(&self, entry: &ImportEntry) -> Symbols<'_, 'a, R> {
        Symbols {
            table: self,
            base_rva: entry.raw.lookup_table_rva(),
            index: 0,
            done: false,
        }
    }

    /// Reads the whole table into owned descriptors, within the same bounds.
    ///
    /// # Errors
    /// Returns error if the descriptor table is truncated or unterminated.
    pub fn read_all(&self) -> Result<Vec<ImportDescriptor>> {
        let mut out = Vec::new();
        for entry in self.entries() {
            let entry = entry?;
            let mut descriptor = ImportDescriptor {
                dll_name: entry
                    .dll_name
                    .clone()
                    .unwrap_or_else(|| format!("<invalid name rva {:#x}>", entry.raw.name_rva)),
                symbols: BTreeSet::new(),
                ordinal_count: 0,
            };
            for symbol in self.symbols(&entry) {
                match symbol {
                    ImportSymbol::Named(name) => {
                        descriptor.symbols.insert(name);
                    }
                    ImportSymbol::Ordinal(_) => descriptor.ordinal_count += 1,
                    ImportSymbol::Invalid(_) => {}
                }
            }
            out.push(descriptor);
        }
        Ok(out)
    }

    fn read_name(&self, rva: u32) -> Option<String> {
        let loc = self.headers.locate(rva)?;
        let max = usize::try_from(loc.available).map_or(MAX_NAME_LEN, |a| a.min(MAX_NAME_LEN));
        self.reader.read_cstr_at(loc.offset, max).ok()
    }

    fn read_descriptor(&self, rva: u32) -> Result<RawDescriptor> {
        let offset = self
            .headers
            .locate_span(rva, u64::from(DESCRIPTOR_SIZE))
            .ok_or(PeError::TruncatedImports)?;
        let mut buf = [0u8; DESCRIPTOR_SIZE as usize];
        self.reader.read_exact_at(offset, &mut buf)?;
        Ok(RawDescriptor::parse(&buf))
    }

    fn read_thunk(&self, rva: u32) -> Option<u64> {
        let size = self.headers.kind.thunk_size();
        let offset = self.headers.locate_span(rva, u64::from(size))?;
        let value = if size == 8 {
            self.reader.read_u64_at(offset).ok()?
        } else {
            u64::from(self.reader.read_u32_at(offset).ok()?)
        };
        Some(value)
    }

    fn take_thunk_budget(&self) -> bool {
        let left = self.thunk_budget.get();
        if left == 0 {
            return false;
        }
        self.thunk_budget.set(left - 1);
        true
    }
}

/// Iterator over import descriptors.
pub struct Entries<'t, 'a, R: Reader> {
    table: &'t ImportTable<'a, R>,
    index: u32,
    done: bool,
}

impl<R: Reader> Iterator for Entries<'_, '_, R> {
    type Item = Result<ImportEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.index >= MAX_DESCRIPTORS {
            self.done = true;
            return Some(Err(PeError::DescriptorLimit));
        }

        let rva = self
            .table
            .directory_rva
            .checked_add(self.index * DESCRIPTOR_SIZE);
        self.index += 1;

        let raw = match rva.map_or(Err(PeError::TruncatedImports), |rva| {
            self.table.read_descriptor(rva)
        }) {
            Ok(raw) => raw,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if raw.is_null() {
            self.done = true;
            return None;
        }

        let dll_name = self.table.read_name(raw.name_rva);
        if dll_name.is_none() {
            trace!(name_rva = raw.name_rva, "unresolvable DLL name");
        }
        Some(Ok(ImportEntry { dll_name, raw }))
    }
}

/// Iterator over one descriptor's lookup table.
pub struct Symbols<'t, 'a, R: Reader> {
    table: &'t ImportTable<'a, R>,
    base_rva: u32,
    index: u32,
    done: bool,
}

impl<R: Reader> Symbols<'_, '_, R> {
    fn decode(&self, value: u64) -> ImportSymbol {
        let ordinal_flag = match self.table.headers.kind.thunk_size() {
            8 => ORDINAL_FLAG_64,
            _ => ORDINAL_FLAG_32,
        };
        if value & ordinal_flag != 0 {
            #[allow(clippy::cast_possible_truncation)]
            return ImportSymbol::Ordinal((value & 0xFFFF) as u16);
        }

        #[allow(clippy::cast_possible_truncation)]
        let hint_rva = (value & HINT_NAME_RVA_MASK) as u32;
        // Skip the two-byte hint.
        match hint_rva.checked_add(2).and_then(|rva| self.table.read_name(rva)) {
            Some(name) => ImportSymbol::Named(name),
            None => {
                trace!(hint_rva, "unresolvable hint/name entry");
                ImportSymbol::Invalid(hint_rva)
            }
        }
    }
}

impl<R: Reader> Iterator for Symbols<'_, '_, R> {
    type Item = ImportSymbol;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= MAX_THUNKS_PER_DLL || !self.table.take_thunk_budget() {
            self.done = true;
            return None;
        }

        let thunk_size = self.table.headers.kind.thunk_size();
        let value = self
            .base_rva
            .checked_add(self.index * thunk_size)
            .and_then(|rva| self.table.read_thunk(rva));
        self.index += 1;

        match value {
            None => {
                trace!(base_rva = self.base_rva, "lookup table runs off mapped data");
                self.done = true;
                None
            }
            Some(0) => {
                self.done = true;
                None
            }
            Some(value) => Some(self.decode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_descriptor() {
        assert!(RawDescriptor::default().is_null());
        let d = RawDescriptor {
            first_thunk: 0x1000,
            ..Default::default()
        };
        assert!(!d.is_null());
    }

    #[test]
    fn test_lookup_table_falls_back_to_iat() {
        let d = RawDescriptor {
            original_first_thunk: 0,
            first_thunk: 0x3000,
            ..Default::default()
        };
        assert_eq!(d.lookup_table_rva(), 0x3000);
        let d = RawDescriptor {
            original_first_thunk: 0x2000,
            ..d
        };
        assert_eq!(d.lookup_table_rva(), 0x2000);
    }

    #[test]
    fn test_descriptor_parse() {
        let mut bytes = [0u8; 20];
        bytes[12..16].copy_from_slice(&0x2040u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&0x3000u32.to_le_bytes());
        let d = RawDescriptor::parse(&bytes);
        assert_eq!(d.name_rva, 0x2040);
        assert_eq!(d.first_thunk, 0x3000);
        assert_eq!(d.original_first_thunk, 0);
    }
}
