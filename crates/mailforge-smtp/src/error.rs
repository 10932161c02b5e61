//! Error types for SMTP delivery.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned an error reply.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error text from the server.
        message: String,
    },

    /// Unexpected or malformed server response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connect or a single read/write did not finish in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the credentials or the exchange failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The transaction has no recipients.
    #[error("No recipients")]
    NoRecipients,

    /// Message is larger than the limit the server advertised.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Advertised SIZE limit.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx), or a timeout.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
            || matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::smtp_error(550, "no such user").is_permanent());
        assert!(!Error::smtp_error(550, "no such user").is_transient());
        assert!(Error::smtp_error(451, "try later").is_transient());
        assert!(Error::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!Error::NoRecipients.is_permanent());
    }

    #[test]
    fn test_display() {
        let err = Error::MessageTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Message of 2048 bytes exceeds server limit of 1024 bytes"
        );
        assert_eq!(
            Error::smtp_error(554, "rejected").to_string(),
            "SMTP error 554: rejected"
        );
    }
}
