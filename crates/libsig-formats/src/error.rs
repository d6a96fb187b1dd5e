//! Error types for container and object parsing.

use thiserror::Error;

/// Error type for archive and object parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Invalid magic number at start of file.
    #[error("invalid magic number: expected {expected}, got {actual:02x?}")]
    InvalidMagic {
        expected: &'static str,
        actual: Vec<u8>,
    },

    /// File is too short to contain required data.
    #[error("file too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Member header size field is not ASCII decimal.
    #[error("malformed member header at offset {offset:#x}: unparseable size field")]
    MalformedMemberSize { offset: usize },

    /// Member payload crosses the end of the archive.
    #[error("truncated member at offset {offset:#x}: {size}-byte payload crosses end of archive")]
    TruncatedMember { offset: usize, size: usize },

    /// Truncated data while parsing.
    #[error("truncated data: expected {expected} bytes, got {actual} while parsing {context}")]
    TruncatedData {
        expected: usize,
        actual: usize,
        context: &'static str,
    },
}

impl ParseError {
    /// Creates a new InvalidMagic error.
    pub fn invalid_magic(expected: &'static str, actual: &[u8]) -> Self {
        Self::InvalidMagic {
            expected,
            actual: actual.to_vec(),
        }
    }

    /// Creates a new TooShort error.
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::TooShort { expected, actual }
    }
}
