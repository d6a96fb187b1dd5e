//! Byte pattern representation with wildcards.
//!
//! The text form is space-separated, one token per byte: two uppercase hex
//! digits for a concrete byte, `??` for a wildcard.

use crate::{PatternError, Result};
use std::fmt;

/// A single byte in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternByte {
    /// Exact byte match.
    Concrete(u8),
    /// Match any byte; stands in for one byte of a relative operand.
    Wildcard,
}

impl PatternByte {
    /// Check if this pattern byte matches a concrete byte.
    pub fn matches(&self, byte: u8) -> bool {
        match self {
            PatternByte::Concrete(b) => *b == byte,
            PatternByte::Wildcard => true,
        }
    }
}

/// A relocation-masked byte pattern identifying one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<PatternByte>,
}

impl Pattern {
    /// Create an empty pattern.
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Create a pattern from pattern bytes.
    pub fn from_pattern_bytes(bytes: Vec<PatternByte>) -> Self {
        Self { bytes }
    }

    /// Parse a pattern from its text form.
    ///
    /// Format: `"55 48 89 E5 ?? ?? 48 8B"`. Each byte is two hex digits,
    /// `??` is a wildcard, bytes are whitespace-separated.
    pub fn parse(s: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        for part in s.split_whitespace() {
            let byte = if part == "??" {
                PatternByte::Wildcard
            } else if part.len() == 2 {
                let value = u8::from_str_radix(part, 16)
                    .map_err(|_| PatternError::InvalidToken(part.to_string()))?;
                PatternByte::Concrete(value)
            } else {
                return Err(PatternError::InvalidToken(part.to_string()));
            };
            bytes.push(byte);
        }
        Ok(Self { bytes })
    }

    /// Appends one byte.
    pub fn push(&mut self, byte: PatternByte) {
        self.bytes.push(byte);
    }

    /// Get the pattern length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the pattern is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the pattern bytes.
    pub fn bytes(&self) -> &[PatternByte] {
        &self.bytes
    }

    /// Check if this pattern matches the start of `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.bytes.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(data.iter())
            .all(|(pattern, &byte)| pattern.matches(byte))
    }

    /// Check if this pattern matches at a specific offset.
    pub fn matches_at(&self, data: &[u8], offset: usize) -> bool {
        match data.get(offset..) {
            Some(rest) => self.matches(rest),
            None => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match byte {
                PatternByte::Concrete(value) => write!(f, "{value:02X}")?,
                PatternByte::Wildcard => f.write_str("??")?,
            }
        }
        Ok(())
    }
}
