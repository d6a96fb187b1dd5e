//! # libsig-patterns
//!
//! Wildcard byte patterns and their generation from machine code.
//!
//! A [`Pattern`] identifies a function up to relocation: bytes that the
//! linker or loader may rewrite (near-branch offsets, RIP-relative
//! displacements) are wildcards, everything else is a concrete byte.
//! [`function_pattern`] produces one by linearly decoding a function's bytes;
//! [`Pattern::parse`] and [`Pattern::matches`] are the consuming side for
//! identification tooling that reads the emitted document back.

mod generator;
mod pattern;

pub use generator::function_pattern;
pub use pattern::{Pattern, PatternByte};

/// Error type for pattern-string parsing.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid pattern token: {0:?}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, PatternError>;
