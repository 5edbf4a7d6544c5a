//! # Error Types
//!
//! Errors produced while parsing shared primitives.

use thiserror::Error;

/// Errors that can occur when parsing an [`Identity`](crate::Identity) from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    /// Input was not valid hexadecimal.
    #[error("invalid hex in identity: {0}")]
    InvalidHex(String),

    /// Decoded input had the wrong number of bytes.
    #[error("identity must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
