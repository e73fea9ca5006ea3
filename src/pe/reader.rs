// src/pe/reader.rs
//! Positioned, bounded reads over a file or an in-memory buffer.
//!
//! The analyzer never loads a whole executable. It asks a [`Reader`] for the
//! few byte ranges it needs (headers, section table, import structures) and
//! every read is checked against the source size.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::error::{PeError, Result};

/// A random-access byte source.
pub trait Reader {
    /// Reads up to `buf.len()` bytes at `offset`, returning how many were read.
    /// Reading at or past the end returns `Ok(0)`.
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` completely or fails with [`PeError::Truncated`].
    ///
    /// # Errors
    /// Returns error on I/O failure or a short read.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n < buf.len() {
            return Err(PeError::Truncated {
                offset,
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(())
    }

    /// # Errors
    /// Returns error on I/O failure or a short read.
    fn read_u16_at(&self, offset: u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// # Errors
    /// Returns error on I/O failure or a short read.
    fn read_u32_at(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// # Errors
    /// Returns error on I/O failure or a short read.
    fn read_u64_at(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes.
    ///
    /// If no terminator appears within the bound the bytes read so far are
    /// returned as the string. Non-ASCII bytes are replaced lossily.
    ///
    /// # Errors
    /// Returns error on I/O failure.
    fn read_cstr_at(&self, offset: u64, max_len: usize) -> Result<String> {
        let mut buf = vec![0u8; max_len];
        let n = self.read_at(offset, &mut buf)?;
        buf.truncate(n);
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
}

/// Reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl Reader for SliceReader<'_> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        if offset >= self.data.len() {
            return Ok(0);
        }
        let to_read = buf.len().min(self.data.len() - offset);
        buf[..to_read].copy_from_slice(&self.data[offset..offset + to_read]);
        Ok(to_read)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Reader over a file on disk. The handle is closed when the reader drops.
pub struct FileReader {
    file: RefCell<File>,
    size: u64,
}

impl FileReader {
    /// # Errors
    /// Returns error if the file cannot be opened or its size queried.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: RefCell::new(file),
            size,
        })
    }
}

impl Reader for FileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
