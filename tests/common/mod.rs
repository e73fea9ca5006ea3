// tests/common/mod.rs
//! Builds small, well-formed PE images in memory.
//!
//! Layout: DOS header with `e_lfanew = 0x80`, headers padded to 0x200, and a
//! single `.idata` section mapped at RVA 0x1000 and stored at file offset
//! 0x200. The import directory sits at the start of that section.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const PE_OFFSET: usize = 0x80;
pub const COFF_OFFSET: usize = PE_OFFSET + 4;
pub const OPTIONAL_OFFSET: usize = COFF_OFFSET + 20;
pub const HEADERS_SIZE: usize = 0x200;
pub const SECTION_RVA: u32 = 0x1000;
pub const SECTION_FILE_OFFSET: usize = HEADERS_SIZE;

const FILE_ALIGNMENT: usize = 0x200;
const DESCRIPTOR_SIZE: usize = 20;

enum Thunk {
    Named(String),
    Ordinal(u16),
}

struct Dll {
    name: String,
    thunks: Vec<Thunk>,
}

#[derive(Default)]
pub struct ImageBuilder {
    pe32_plus: bool,
    iat_only: bool,
    dlls: Vec<Dll>,
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        Self::default()
    }

    pub fn pe32_plus() -> Self {
        Self {
            pe32_plus: true,
            ..Self::default()
        }
    }

    /// Leave `OriginalFirstThunk` zero so readers must fall back to the IAT.
    pub fn iat_only(mut self) -> Self {
        self.iat_only = true;
        self
    }

    pub fn import(mut self, dll: &str, symbols: &[&str]) -> Self {
        self.dlls.push(Dll {
            name: dll.to_string(),
            thunks: symbols.iter().map(|s| Thunk::Named((*s).to_string())).collect(),
        });
        self
    }

    pub fn import_ordinals(mut self, dll: &str, ordinals: &[u16]) -> Self {
        self.dlls.push(Dll {
            name: dll.to_string(),
            thunks: ordinals.iter().map(|&o| Thunk::Ordinal(o)).collect(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        if self.dlls.is_empty() {
            return assemble(self.pe32_plus, &[0u8; FILE_ALIGNMENT], (0, 0));
        }

        let thunk_size = if self.pe32_plus { 8 } else { 4 };
        let ordinal_flag: u64 = if self.pe32_plus { 1 << 63 } else { 1 << 31 };
        let table_len = (self.dlls.len() + 1) * DESCRIPTOR_SIZE;
        let mut section = vec![0u8; table_len];

        for (i, dll) in self.dlls.iter().enumerate() {
            let name_rva = rva(section.len());
            push_cstr(&mut section, &dll.name);

            let mut values = Vec::new();
            for thunk in &dll.thunks {
                match thunk {
                    Thunk::Named(name) => {
                        values.push(u64::from(rva(section.len())));
                        section.extend_from_slice(&[0, 0]);
                        push_cstr(&mut section, name);
                    }
                    Thunk::Ordinal(ordinal) => values.push(ordinal_flag | u64::from(*ordinal)),
                }
            }
            values.push(0);

            align(&mut section, 8);
            let ilt_rva = rva(section.len());
            push_thunks(&mut section, &values, thunk_size);
            let iat_rva = rva(section.len());
            push_thunks(&mut section, &values, thunk_size);

            let at = i * DESCRIPTOR_SIZE;
            let original_first_thunk = if self.iat_only { 0 } else { ilt_rva };
            put_u32(&mut section, at, original_first_thunk);
            put_u32(&mut section, at + 12, name_rva);
            put_u32(&mut section, at + 16, iat_rva);
        }

        align(&mut section, FILE_ALIGNMENT);
        #[allow(clippy::cast_possible_truncation)]
        assemble(self.pe32_plus, &section, (SECTION_RVA, table_len as u32))
    }

    pub fn write_to(&self, path: &Path) {
        fs::write(path, self.build()).unwrap();
    }
}

/// Wraps raw `.idata` contents in valid headers with the given import
/// directory entry (RVA, size).
pub fn assemble(pe32_plus: bool, section: &[u8], import_dir: (u32, u32)) -> Vec<u8> {
    let mut image = vec![0u8; HEADERS_SIZE];
    image[0..2].copy_from_slice(b"MZ");
    #[allow(clippy::cast_possible_truncation)]
    put_u32(&mut image, 0x3C, PE_OFFSET as u32);
    image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

    let (machine, magic, optional_size, dirs_at): (u16, u16, u16, usize) = if pe32_plus {
        (0x8664, 0x20B, 240, 112)
    } else {
        (0x14C, 0x10B, 224, 96)
    };
    put_u16(&mut image, COFF_OFFSET, machine);
    put_u16(&mut image, COFF_OFFSET + 2, 1);
    put_u16(&mut image, COFF_OFFSET + 16, optional_size);
    put_u16(&mut image, COFF_OFFSET + 18, 0x0102);

    put_u16(&mut image, OPTIONAL_OFFSET, magic);
    put_u32(&mut image, OPTIONAL_OFFSET + dirs_at - 4, 16);
    put_u32(&mut image, OPTIONAL_OFFSET + dirs_at + 8, import_dir.0);
    put_u32(&mut image, OPTIONAL_OFFSET + dirs_at + 12, import_dir.1);

    #[allow(clippy::cast_possible_truncation)]
    let raw_size = section.len() as u32;
    let header = OPTIONAL_OFFSET + usize::from(optional_size);
    image[header..header + 8].copy_from_slice(b".idata\0\0");
    put_u32(&mut image, header + 8, raw_size);
    put_u32(&mut image, header + 12, SECTION_RVA);
    put_u32(&mut image, header + 16, raw_size);
    #[allow(clippy::cast_possible_truncation)]
    put_u32(&mut image, header + 20, SECTION_FILE_OFFSET as u32);

    image.extend_from_slice(section);
    image
}

/// Overwrites the COFF section count.
pub fn set_section_count(image: &mut [u8], count: u16) {
    put_u16(image, COFF_OFFSET + 2, count);
}

/// Deterministic noise for adversarial inputs.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn rva(section_offset: usize) -> u32 {
    SECTION_RVA + section_offset as u32
}

fn push_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    align(buf, 2);
}

fn push_thunks(buf: &mut Vec<u8>, values: &[u64], size: usize) {
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes()[..size]);
    }
}

fn align(buf: &mut Vec<u8>, to: usize) {
    while buf.len() % to != 0 {
        buf.push(0);
    }
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
