//! Error types for field parsing in glucoscope-types.

use thiserror::Error;

/// Errors that can occur when parsing record fields.
///
/// Numeric fields never fail (they coerce to zero at load time), so every
/// variant here concerns calendar values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A meal timestamp did not match `YYYY-MM-DD HH:MM:SS`.
    #[error("Invalid timestamp '{0}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),

    /// A date did not match `YYYY-MM-DD`.
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Result type alias using glucoscope-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
