//! Codec error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while reading a compiled artifact. All of them are
/// recoverable at the loader boundary; a failed load leaves no partial state
/// behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid {section} magic: {found:02X?}")]
    InvalidMagic { section: &'static str, found: [u8; 4] },

    #[error("unsupported {section} version {found}")]
    UnsupportedVersion { section: &'static str, found: u8 },

    #[error("unexpected end of input reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("{section} section size does not match its contents")]
    SectionSizeMismatch { section: &'static str },

    #[error("unexpected section count {found}")]
    UnexpectedSectionCount { found: u32 },

    #[error("pool entry index {index} out of range")]
    PoolIndexOutOfRange { index: u32 },

    #[error("duplicate pool entry index {index}")]
    DuplicatePoolIndex { index: u32 },

    #[error("missing pool entry index {index}")]
    MissingPoolIndex { index: u32 },

    #[error("pool entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: u32 },

    #[error("unknown dynamic record type {found:#04x}")]
    UnknownRecordType { found: u8 },
}
