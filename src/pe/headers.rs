// src/pe/headers.rs
//! DOS, COFF and optional header parsing plus the section table.
//!
//! Only the fields needed to find the import directory and translate RVAs to
//! file offsets are decoded.

use std::fmt;

use serde::Serialize;

use super::error::{PeError, Result};
use super::reader::Reader;

/// "MZ"
pub const DOS_SIGNATURE: u16 = 0x5A4D;
/// "PE\0\0"
pub const PE_SIGNATURE: u32 = 0x0000_4550;
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

/// Index of the import table in the data directory array.
pub const IMPORT_DIRECTORY_INDEX: u32 = 1;

/// Windows refuses to load images with more sections than this.
pub const MAX_SECTIONS: u16 = 96;

const DOS_HEADER_SIZE: u64 = 64;
const E_LFANEW_OFFSET: u64 = 0x3C;
const COFF_HEADER_SIZE: u64 = 20;
const DATA_DIRECTORY_SIZE: u64 = 8;

/// PE32 or PE32+, selected by the optional header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Pe32,
    Pe32Plus,
}

impl ImageKind {
    #[must_use]
    pub const fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            PE32_MAGIC => Some(Self::Pe32),
            PE32PLUS_MAGIC => Some(Self::Pe32Plus),
            _ => None,
        }
    }

    /// Width of an Import Lookup Table entry.
    #[must_use]
    pub const fn thunk_size(self) -> u32 {
        match self {
            Self::Pe32 => 4,
            Self::Pe32Plus => 8,
        }
    }

    /// Offset of `NumberOfRvaAndSizes` inside the optional header.
    const fn rva_count_offset(self) -> u64 {
        match self {
            Self::Pe32 => 92,
            Self::Pe32Plus => 108,
        }
    }

    /// Offset of the first data directory inside the optional header.
    const fn data_directory_offset(self) -> u64 {
        self.rva_count_offset() + 4
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pe32 => f.write_str("PE32"),
            Self::Pe32Plus => f.write_str("PE32+"),
        }
    }
}

/// Short name for a COFF machine type.
#[must_use]
pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        0x014C => "i386",
        0x8664 => "amd64",
        0x01C4 => "armnt",
        0xAA64 => "arm64",
        _ => "unknown",
    }
}

/// IMAGE_DATA_DIRECTORY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.virtual_address == 0 || self.size == 0
    }
}

/// The parts of IMAGE_SECTION_HEADER used for address translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
}

impl SectionHeader {
    pub const SIZE: usize = 40;

    fn parse(data: &[u8]) -> Option<Self> {
        let field = |at: usize| -> Option<u32> {
            let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
            Some(u32::from_le_bytes(bytes))
        };
        let name: [u8; 8] = data.get(0..8)?.try_into().ok()?;
        Some(Self {
            name,
            virtual_size: field(8)?,
            virtual_address: field(12)?,
            size_of_raw_data: field(16)?,
            pointer_to_raw_data: field(20)?,
        })
    }

    /// Section name with trailing NULs stripped.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Translates `rva` if it lies in the file-backed part of this section.
    /// Returns the file offset and the number of raw bytes left in the section.
    fn translate(&self, rva: u32) -> Option<(u64, u32)> {
        let delta = rva.checked_sub(self.virtual_address)?;
        if delta >= self.size_of_raw_data {
            return None;
        }
        let offset = u64::from(self.pointer_to_raw_data) + u64::from(delta);
        Some((offset, self.size_of_raw_data - delta))
    }
}

/// A resolved RVA: where it lives in the file and how many bytes can be read
/// from there without leaving the section or the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: u64,
    pub available: u64,
}

/// Headers of a validated PE image.
#[derive(Debug, Clone)]
pub struct ImageHeaders {
    pub kind: ImageKind,
    pub machine: u16,
    pub import_directory: Option<DataDirectory>,
    pub sections: Vec<SectionHeader>,
    file_size: u64,
}

impl ImageHeaders {
    /// Validates the signatures and reads the headers and section table.
    ///
    /// # Errors
    /// Returns [`PeError::NotPe`] on a signature mismatch, or a structural
    /// error for truncated or out-of-range header data.
    pub fn read_from<R: Reader>(reader: &R) -> Result<Self> {
        let file_size = reader.size();
        if file_size < DOS_HEADER_SIZE || reader.read_u16_at(0)? != DOS_SIGNATURE {
            return Err(PeError::NotPe);
        }

        let pe_offset = u64::from(reader.read_u32_at(E_LFANEW_OFFSET)?);
        match reader.read_u32_at(pe_offset) {
            Ok(PE_SIGNATURE) => {}
            Ok(_) | Err(PeError::Truncated { .. }) => return Err(PeError::NotPe),
            Err(e) => return Err(e),
        }

        let coff = pe_offset + 4;
        let machine = reader.read_u16_at(coff)?;
        let number_of_sections = reader.read_u16_at(coff + 2)?;
        let size_of_optional_header = reader.read_u16_at(coff + 16)?;
        if number_of_sections > MAX_SECTIONS {
            return Err(PeError::TooManySections(number_of_sections));
        }

        let optional = coff + COFF_HEADER_SIZE;
        let magic = reader.read_u16_at(optional)?;
        let kind = ImageKind::from_magic(magic).ok_or(PeError::BadMagic(magic))?;
        if u64::from(size_of_optional_header) < kind.data_directory_offset() {
            return Err(PeError::OptionalHeaderTooSmall(size_of_optional_header));
        }

        let import_directory =
            read_import_directory(reader, kind, optional, size_of_optional_header)?;

        let section_table = optional + u64::from(size_of_optional_header);
        let sections = read_sections(reader, section_table, number_of_sections)?;

        Ok(Self {
            kind,
            machine,
            import_directory,
            sections,
            file_size,
        })
    }

    /// Translates an RVA through the section table.
    ///
    /// `None` means the RVA is outside every section's file-backed data or
    /// points past the end of the file.
    #[must_use]
    pub fn locate(&self, rva: u32) -> Option<Location> {
        let (offset, in_section) = self.sections.iter().find_map(|s| s.translate(rva))?;
        if offset >= self.file_size {
            return None;
        }
        let available = u64::from(in_section).min(self.file_size - offset);
        Some(Location { offset, available })
    }

    /// Like [`locate`](Self::locate), but also requires `len` readable bytes.
    #[must_use]
    pub fn locate_span(&self, rva: u32, len: u64) -> Option<u64> {
        self.locate(rva)
            .filter(|loc| loc.available >= len)
            .map(|loc| loc.offset)
    }
}

fn read_import_directory<R: Reader>(
    reader: &R,
    kind: ImageKind,
    optional: u64,
    size_of_optional_header: u16,
) -> Result<Option<DataDirectory>> {
    let rva_count = reader.read_u32_at(optional + kind.rva_count_offset())?;
    if rva_count <= IMPORT_DIRECTORY_INDEX {
        return Ok(None);
    }

    let entry =
        kind.data_directory_offset() + u64::from(IMPORT_DIRECTORY_INDEX) * DATA_DIRECTORY_SIZE;
    if entry + DATA_DIRECTORY_SIZE > u64::from(size_of_optional_header) {
        return Ok(None);
    }

    Ok(Some(DataDirectory {
        virtual_address: reader.read_u32_at(optional + entry)?,
        size: reader.read_u32_at(optional + entry + 4)?,
    }))
}

fn read_sections<R: Reader>(reader: &R, offset: u64, count: u16) -> Result<Vec<SectionHeader>> {
    let mut table = vec![0u8; usize::from(count) * SectionHeader::SIZE];
    reader.read_exact_at(offset, &mut table)?;
    Ok(table
        .chunks_exact(SectionHeader::SIZE)
        .filter_map(SectionHeader::parse)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::reader::SliceReader;

    fn section(va: u32, raw_size: u32, raw_ptr: u32) -> SectionHeader {
        SectionHeader {
            name: *b".idata\0\0",
            virtual_size: raw_size,
            virtual_address: va,
            size_of_raw_data: raw_size,
            pointer_to_raw_data: raw_ptr,
        }
    }

    fn headers(sections: Vec<SectionHeader>, file_size: u64) -> ImageHeaders {
        ImageHeaders {
            kind: ImageKind::Pe32,
            machine: 0x14C,
            import_directory: None,
            sections,
            file_size,
        }
    }

    #[test]
    fn test_image_kind_from_magic() {
        assert_eq!(ImageKind::from_magic(0x10B), Some(ImageKind::Pe32));
        assert_eq!(ImageKind::from_magic(0x20B), Some(ImageKind::Pe32Plus));
        assert_eq!(ImageKind::from_magic(0x107), None);
        assert_eq!(ImageKind::Pe32Plus.thunk_size(), 8);
    }

    #[test]
    fn test_locate_inside_section() {
        let h = headers(vec![section(0x1000, 0x200, 0x400)], 0x600);
        let loc = h.locate(0x1010).unwrap();
        assert_eq!(loc.offset, 0x410);
        assert_eq!(loc.available, 0x1F0);
        assert_eq!(h.locate_span(0x11FC, 4), Some(0x5FC));
        assert_eq!(h.locate_span(0x11FE, 4), None);
    }

    #[test]
    fn test_locate_rejects_unmapped_rva() {
        let h = headers(vec![section(0x1000, 0x200, 0x400)], 0x600);
        assert!(h.locate(0x0FFF).is_none());
        assert!(h.locate(0x1200).is_none());
        assert!(h.locate(u32::MAX).is_none());
    }

    #[test]
    fn test_locate_clips_to_file_size() {
        // Section claims more raw data than the file holds.
        let h = headers(vec![section(0x1000, 0x1000, 0x400)], 0x500);
        assert_eq!(h.locate(0x1000).unwrap().available, 0x100);
        assert!(h.locate(0x1100).is_none());
    }

    #[test]
    fn test_machine_names() {
        assert_eq!(machine_name(0x14C), "i386");
        assert_eq!(machine_name(0x8664), "amd64");
        assert_eq!(machine_name(0x1234), "unknown");
        assert_eq!(ImageKind::Pe32Plus.to_string(), "PE32+");
    }

    #[test]
    fn test_section_name() {
        assert_eq!(section(0, 0, 0).name_str(), ".idata");
    }

    #[test]
    fn test_rejects_non_mz() {
        let data = vec![0x7Fu8, b'E', b'L', b'F'].repeat(32);
        let err = ImageHeaders::read_from(&SliceReader::new(&data)).unwrap_err();
        assert!(matches!(err, PeError::NotPe));
    }

    #[test]
    fn test_rejects_short_input() {
        let err = ImageHeaders::read_from(&SliceReader::new(b"MZ")).unwrap_err();
        assert!(matches!(err, PeError::NotPe));
    }

    #[test]
    fn test_rejects_bad_pe_offset() {
        let mut data = vec![0u8; 128];
        data[0..2].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        let err = ImageHeaders::read_from(&SliceReader::new(&data)).unwrap_err();
        assert!(matches!(err, PeError::NotPe));
    }
}
