//! Compose-then-deliver orchestration.

use crate::error::Result;
use crate::transport::Transport;
use mailforge_mime::{Envelope, Message};
use mailforge_smtp::{Config, SmtpTransport};

/// Sends [`Message`]s through a [`Transport`].
#[derive(Debug, Clone)]
pub struct Mailer<T> {
    transport: T,
}

impl Mailer<SmtpTransport> {
    /// Creates a mailer that delivers over SMTP.
    #[must_use]
    pub const fn smtp(config: Config) -> Self {
        Self::new(SmtpTransport::new(config))
    }
}

impl<T: Transport> Mailer<T> {
    /// Creates a mailer using `transport`.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Composes `message` and hands it to the transport once.
    ///
    /// The message is fully serialized before the transport is called, so a
    /// composition error never reaches the network. Returns the envelope
    /// that was used.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Compose`] for validation, address, structure
    /// or entropy failures, and [`crate::Error::Transport`] if delivery
    /// fails.
    pub async fn send(&self, message: &Message) -> Result<Envelope> {
        let envelope = message.envelope()?;
        let bytes = message.to_bytes()?;

        match self.transport.send(&envelope, &bytes).await {
            Ok(()) => {
                tracing::info!(
                    sender = %envelope.sender,
                    recipients = envelope.recipients.len(),
                    bytes = bytes.len(),
                    "message sent"
                );
                Ok(envelope)
            }
            Err(error) => {
                tracing::warn!(%error, sender = %envelope.sender, "message delivery failed");
                Err(error.into())
            }
        }
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
    use crate::error::Error;
    use crate::transport::TransportError;
    use mailforge_mime::Attachment;
    use std::future::Future;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Envelope, Vec<u8>)>>,
        fail_with: Option<u16>,
    }

    impl Transport for RecordingTransport {
        fn send(
            &self,
            envelope: &Envelope,
            message: &[u8],
        ) -> impl Future<Output = std::result::Result<(), TransportError>> + Send {
            self.sent
                .lock()
                .unwrap()
                .push((envelope.clone(), message.to_vec()));
            let result = self
                .fail_with
                .map_or(Ok(()), |code| Err(TransportError::smtp_error(code, "rejected")));
            std::future::ready(result)
        }
    }

    fn message() -> Message {
        Message::new()
            .from("Alice <alice@example.com>")
            .to("Bob <bob@example.com>")
            .cc("carol@example.com")
            .bcc("dave@example.com")
            .subject("Status")
            .text("All good.")
    }

    #[test]
    fn test_send_hands_over_envelope_and_bytes() {
        let mailer = Mailer::new(RecordingTransport::default());
        let envelope = tokio_test::block_on(mailer.send(&message())).unwrap();

        assert_eq!(envelope.sender, "alice@example.com");
        assert_eq!(
            envelope.recipients,
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );

        let sent = mailer.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (sent_envelope, bytes) = &sent[0];
        assert_eq!(sent_envelope, &envelope);
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("Subject: Status\r\n"));
        assert!(text.contains("To: Bob <bob@example.com>\r\n"));
        assert!(!text.contains("dave@example.com"));
    }

    #[test]
    fn test_sender_override() {
        let mailer = Mailer::new(RecordingTransport::default());
        let envelope =
            tokio_test::block_on(mailer.send(&message().sender("bounce@example.com"))).unwrap();
        assert_eq!(envelope.sender, "bounce@example.com");
    }

    #[test]
    fn test_compose_error_never_reaches_transport() {
        let mailer = Mailer::new(RecordingTransport::default());
        let broken = message()
            .text("x")
            .attachment(Attachment::new("logo.png", None, Vec::new()).inline());

        let result = tokio_test::block_on(mailer.send(&broken));
        assert!(matches!(
            result,
            Err(Error::Compose(mailforge_mime::Error::Structure(_)))
        ));
        assert!(mailer.transport().sent.lock().unwrap().is_empty());

        let no_recipients = Message::new().from("alice@example.com").text("x");
        let result = tokio_test::block_on(mailer.send(&no_recipients));
        assert!(matches!(
            result,
            Err(Error::Compose(mailforge_mime::Error::Validation(_)))
        ));
        assert!(mailer.transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_error() {
        let mailer = Mailer::new(RecordingTransport {
            fail_with: Some(451),
            ..RecordingTransport::default()
        });

        let error = tokio_test::block_on(mailer.send(&message())).unwrap_err();
        assert!(matches!(error, Error::Transport(_)));
        assert!(error.is_transient());
        assert_eq!(mailer.transport().sent.lock().unwrap().len(), 1);
    }
}
