//! Error types for MIME composition.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field is missing (sender, recipients).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An address failed RFC 5322 mailbox parsing.
    #[error("Invalid address: {0}")]
    Address(String),

    /// The body/attachment combination cannot be expressed as MIME.
    #[error("Invalid message structure: {0}")]
    Structure(String),

    /// Reading an attachment source or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The OS entropy source could not produce an identifier.
    #[error("Entropy source failure: {0}")]
    Entropy(#[from] rand::Error),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}

impl Error {
    /// Creates an address error naming the offending input.
    #[must_use]
    pub fn address(input: &str, reason: &str) -> Self {
        Self::Address(format!("{input:?}: {reason}"))
    }
}
