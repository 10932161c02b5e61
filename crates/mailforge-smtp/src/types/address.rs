//! Envelope address type.

use crate::error::{Error, Result};

/// Bare address used in `MAIL FROM` and `RCPT TO`.
///
/// Only the shape needed on the wire is checked: one `@` separating
/// non-empty parts, and nothing that would break the command line. Addresses
/// must be ASCII since SMTPUTF8 is never negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| !c.is_ascii() || c.is_control() || c.is_whitespace() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains characters not allowed in an envelope address"
            )));
        }

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr:?} must contain @")));
        };
        let quoted = local.len() >= 2 && local.starts_with('"') && local.ends_with('"');
        if local.is_empty() || domain.is_empty() || (local.contains('@') && !quoted) {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} needs a local part and a domain"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_quoted_local_part_with_at() {
        assert!(Address::new("\"a@b\"@example.com").is_ok());
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "user@ex@ample.com",
            "user@example.com\r\nRCPT TO:<x@y>",
            "<user@example.com>",
            "us er@example.com",
            "jörg@example.com",
            "user@exämple.com",
        ] {
            assert!(
                matches!(Address::new(addr), Err(Error::InvalidAddress(_))),
                "{addr:?} accepted"
            );
        }
    }
}
