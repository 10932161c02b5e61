//! One-shot message delivery over a fresh SMTP session.

use crate::config::{Config, Security};
use crate::connection::{Client, Connected, SmtpConnection, connect, connect_tls, with_timeout};
use crate::error::{Error, Result};
use crate::types::Address;

/// Delivers messages to one SMTP server.
///
/// Each [`SmtpTransport::send`] opens a connection, runs the whole session
/// (greeting, EHLO, optional STARTTLS and AUTH, MAIL/RCPT/DATA) and closes
/// it again. Nothing is retried.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    config: Config,
}

impl SmtpTransport {
    /// Creates a transport for `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Sends `message` from `sender` to every address in `recipients`.
    ///
    /// The message must already be RFC 5322 formatted; it is dot-stuffed on
    /// the way out. If the server advertises a SIZE limit smaller than the
    /// message, nothing is sent after EHLO/AUTH.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] or [`Error::InvalidAddress`] before
    /// connecting, [`Error::Timeout`] if connect or any reply is too slow,
    /// [`Error::MessageTooLarge`] if the server's limit is exceeded, and
    /// any connection, TLS, authentication or reply error on the way.
    pub async fn send(&self, sender: &str, recipients: &[String], message: &[u8]) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        let from = Address::new(sender)?;
        let to = recipients
            .iter()
            .map(|recipient| Address::new(recipient.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let client = self.open().await?;

        let size = message.len();
        if let Some(limit) = client.server_info().max_message_size()
            && size > limit
        {
            tracing::debug!(size, limit, "message exceeds advertised SIZE");
            let _ = client.quit().await;
            return Err(Error::MessageTooLarge { size, limit });
        }

        let client = match &self.config.credentials {
            Some(credentials) => {
                client
                    .authenticate(&credentials.username, &credentials.password)
                    .await?
                    .mail_from(from, Some(size))
                    .await?
            }
            None => client.mail_from(from, Some(size)).await?,
        };

        let mut to = to.into_iter();
        let Some(first) = to.next() else {
            return Err(Error::NoRecipients);
        };
        let mut client = client.rcpt_to(first).await?;
        for recipient in to {
            client = client.rcpt_to(recipient).await?;
        }

        let client = client.data().await?.send_message(message).await?;
        tracing::debug!(
            host = %self.config.host,
            recipients = recipients.len(),
            bytes = size,
            "message accepted"
        );

        // The message is already accepted, so a failed QUIT is not a failed send.
        if let Err(error) = client.quit().await {
            tracing::warn!(%error, "QUIT failed after message was accepted");
        }
        Ok(())
    }

    /// Connects, reads the greeting, greets and secures the session.
    async fn open(&self) -> Result<Client<Connected>> {
        let config = &self.config;
        tracing::debug!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            "connecting"
        );

        let stream = with_timeout(config.connect_timeout, async {
            match config.security {
                Security::Implicit => connect_tls(&config.host, config.port).await,
                Security::StartTls | Security::None => connect(&config.host, config.port).await,
            }
        })
        .await?;

        let client = Client::from_stream(stream, config.io_timeout)
            .await?
            .ehlo(&config.client_hostname)
            .await?;

        if config.security == Security::StartTls {
            client
                .starttls(&config.host, &config.client_hostname)
                .await
        } else {
            Ok(client)
        }
    }
}
