// src/pe/error.rs
use thiserror::Error;

/// Structural problems found while reading a PE image.
///
/// These never leave the analyzer: they are folded into
/// `CapabilityVerdict::ParseFailed` with the rendered message as the reason.
#[derive(Debug, Error)]
pub enum PeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PE file")]
    NotPe,

    #[error("truncated read at {offset:#x}: expected {expected} bytes, got {actual}")]
    Truncated {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported optional header magic {0:#06x}")]
    BadMagic(u16),

    #[error("optional header too small ({0} bytes)")]
    OptionalHeaderTooSmall(u16),

    #[error("section count {0} exceeds limit")]
    TooManySections(u16),

    #[error("truncated import directory")]
    TruncatedImports,

    #[error("import descriptor limit exceeded")]
    DescriptorLimit,
}

pub type Result<T> = std::result::Result<T, PeError>;
