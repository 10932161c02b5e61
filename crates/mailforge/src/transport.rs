//! The delivery seam between composition and the network.

use mailforge_mime::Envelope;
use mailforge_smtp::SmtpTransport;
use std::future::Future;

/// Error returned by transports.
pub type TransportError = mailforge_smtp::Error;

/// Something that can deliver a fully composed message.
///
/// Implementations receive the final bytes and the envelope and must not
/// alter either.
pub trait Transport {
    /// Delivers `message` to the envelope recipients.
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl Transport for SmtpTransport {
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        Self::send(self, &envelope.sender, &envelope.recipients, message)
    }
}
