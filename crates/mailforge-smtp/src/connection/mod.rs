//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, SmtpConnection,
};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::error::{Error, Result};
use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

/// Server capabilities from the EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// Advertised extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if the SIZE extension is advertised, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised and non-zero.
    ///
    /// `SIZE 0` means no fixed limit.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(limit)) if *limit > 0 => Some(*limit),
            _ => None,
        })
    }

    /// Returns the usable AUTH mechanisms, or `None` if AUTH is not
    /// advertised at all.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<Vec<AuthMechanism>> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.clone()),
            _ => None,
        })
    }
}

/// Bounds `future` by `duration`, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| Error::Timeout(duration))?
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

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "mx.example.com".to_string(),
            extensions: lines.iter().map(|line| Extension::parse(line)).collect(),
        }
    }

    #[test]
    fn test_capabilities() {
        let info = info(&["STARTTLS", "SIZE 1024", "AUTH LOGIN"]);
        assert!(info.supports_starttls());
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), Some(1024));
        assert_eq!(info.auth_mechanisms(), Some(vec![AuthMechanism::Login]));
    }

    #[test]
    fn test_missing_capabilities() {
        let info = info(&["PIPELINING", "SIZE 0"]);
        assert!(!info.supports_starttls());
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), None);
        assert_eq!(info.auth_mechanisms(), None);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
