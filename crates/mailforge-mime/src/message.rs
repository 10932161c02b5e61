//! Outgoing message model and serialization.

use crate::address::Mailbox;
use crate::attachment::Attachment;
use crate::compose;
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::plan::Plan;
use chrono::{DateTime, FixedOffset, Local};
use std::io::{Read, Write};
use std::path::Path;

/// SMTP envelope derived from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Bare `MAIL FROM` address.
    pub sender: String,
    /// Bare `RCPT TO` addresses: To, then Cc, then Bcc.
    pub recipients: Vec<String>,
}

/// An email message to be composed.
///
/// Address fields hold raw RFC 5322 strings (`"Name <addr>"` or a bare
/// address); each list entry may itself be a comma-separated list. They are
/// parsed and normalized when the message is serialized.
///
/// ```ignore
/// use mailforge_mime::Message;
///
/// let bytes = Message::new()
///     .from("Alice <alice@example.com>")
///     .to("bob@example.com")
///     .subject("Hello")
///     .text("Hi Bob")
///     .to_bytes()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Author address.
    pub from: String,
    /// Envelope sender override. Only used for `MAIL FROM`, never emitted as
    /// a header.
    pub sender: Option<String>,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients. Never emitted as a header.
    pub bcc: Vec<String>,
    /// Reply-to addresses.
    pub reply_to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: Option<Vec<u8>>,
    /// HTML body.
    pub html: Option<Vec<u8>>,
    /// Extra top-level headers. These take precedence over generated ones.
    pub headers: Headers,
    /// Standalone and inline attachments, in insertion order.
    pub attachments: Vec<Attachment>,
    /// Addresses that should receive a read receipt.
    pub read_receipt: Vec<String>,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the author address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets the envelope sender.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Adds a Bcc recipient.
    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Adds a Reply-To address.
    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to.push(reply_to.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<Vec<u8>>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<Vec<u8>>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an extra top-level header value.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Requests a read receipt to `address`.
    #[must_use]
    pub fn read_receipt(mut self, address: impl Into<String>) -> Self {
        self.read_receipt.push(address.into());
        self
    }

    /// Adds a prepared attachment.
    #[must_use]
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Reads `reader` to the end and adds it as a standalone attachment.
    ///
    /// Returns the new attachment so the caller can adjust its headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading fails; the message is unchanged.
    pub fn attach<R: Read>(
        &mut self,
        reader: R,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<&mut Attachment> {
        let attachment = Attachment::from_reader(filename, content_type, reader)?;
        Ok(self.push_attachment(attachment))
    }

    /// Reads `reader` to the end and adds it as an inline attachment,
    /// referenced from the HTML body by its Content-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading fails; the message is unchanged.
    pub fn attach_inline<R: Read>(
        &mut self,
        reader: R,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<&mut Attachment> {
        let attachment = Attachment::from_reader(filename, content_type, reader)?.inline();
        Ok(self.push_attachment(attachment))
    }

    /// Adds the file at `path` as a standalone attachment, named after the
    /// file and typed by its extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Attachment> {
        let attachment = Attachment::from_file(path)?;
        Ok(self.push_attachment(attachment))
    }

    fn push_attachment(&mut self, attachment: Attachment) -> &mut Attachment {
        self.attachments.push(attachment);
        let last = self.attachments.len() - 1;
        &mut self.attachments[last]
    }

    /// Derives the SMTP envelope.
    ///
    /// The sender is the `sender` override if set, otherwise `from`.
    /// Recipients are the bare addresses of To, Cc and Bcc in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `from` is empty or there are no
    /// recipients, and [`Error::Address`] if any of those addresses is
    /// malformed.
    pub fn envelope(&self) -> Result<Envelope> {
        if self.from.trim().is_empty() {
            return Err(Error::Validation("sender (From) is required".to_string()));
        }
        let recipients: Vec<&String> = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .filter(|recipient| !recipient.trim().is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(Error::Validation(
                "at least one recipient (To, Cc or Bcc) is required".to_string(),
            ));
        }

        let from = Mailbox::parse(&self.from)?;
        let sender = match self.sender.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(sender) => Mailbox::parse(sender)?.address,
            None => from.address,
        };

        let mut addresses = Vec::new();
        for recipient in recipients {
            addresses.extend(
                Mailbox::parse_list(recipient)?
                    .into_iter()
                    .map(|mailbox| mailbox.address),
            );
        }

        Ok(Envelope {
            sender,
            recipients: addresses,
        })
    }

    /// Serializes the message to RFC 5322 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::Address`] or
    /// [`Error::Structure`] before any output is produced, or
    /// [`Error::Entropy`] if an identifier cannot be generated.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_at(Local::now().into())
    }

    /// Serializes the message with `date` as its `Date` header (unless one
    /// was supplied).
    ///
    /// # Errors
    ///
    /// See [`Message::to_bytes`].
    pub fn to_bytes_at(&self, date: DateTime<FixedOffset>) -> Result<Vec<u8>> {
        self.envelope()?;
        let plan = Plan::build(self.text.as_deref(), self.html.as_deref(), &self.attachments)?;
        tracing::debug!(
            structure = %plan,
            attachments = self.attachments.len(),
            "composing message"
        );

        let headers = compose::message_headers(self, date)?;
        let mut out = Vec::new();
        plan.write(headers, &mut out)?;
        Ok(out)
    }

    /// Serializes the message and writes it to `writer`.
    ///
    /// The whole message is composed in memory first, so composition errors
    /// leave the writer untouched.
    ///
    /// # Errors
    ///
    /// See [`Message::to_bytes`]; also [`Error::Io`] if writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
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
    use crate::content_type::ContentType;
    use crate::encoding::{decode_base64_wrapped, decode_quoted_printable};
    use chrono::TimeZone;

    struct Entity {
        headers: Headers,
        body: String,
    }

    fn entity(raw: &str) -> Entity {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        Entity {
            headers: Headers::parse(head),
            body: body.to_string(),
        }
    }

    impl Entity {
        fn content_type(&self) -> ContentType {
            ContentType::parse(self.headers.get("Content-Type").unwrap()).unwrap()
        }

        fn parts(&self) -> Vec<Self> {
            let boundary = self.content_type().boundary().unwrap().to_string();
            let close = format!("--{boundary}--\r\n");
            let open = format!("--{boundary}\r\n");
            assert!(self.body.ends_with(&close), "missing closing boundary");
            let inner = self.body.strip_suffix(&close).unwrap();
            inner
                .split(&open)
                .skip(1)
                .map(|part| entity(part.strip_suffix("\r\n").unwrap()))
                .collect()
        }

        fn essence(&self) -> String {
            self.content_type().essence()
        }
    }

    fn base() -> Message {
        Message::new()
            .from("Alice <alice@example.com>")
            .to("bob@example.com")
            .subject("Hello")
    }

    fn compose(message: &Message) -> Entity {
        let bytes = message.to_bytes().unwrap();
        entity(&String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_text_only() {
        let root = compose(&base().text("Hi Bob"));
        assert_eq!(
            root.headers.get("Content-Type"),
            Some("text/plain; charset=UTF-8")
        );
        assert_eq!(
            root.headers.get("Content-Transfer-Encoding"),
            Some("quoted-printable")
        );
        assert_eq!(root.body, "Hi Bob");
        assert_eq!(root.headers.get("MIME-Version"), Some("1.0"));
        assert_eq!(root.headers.get("From"), Some("Alice <alice@example.com>"));
    }

    #[test]
    fn test_html_only() {
        let root = compose(&base().html("<p>Hi</p>"));
        assert_eq!(root.essence(), "text/html");
    }

    #[test]
    fn test_text_and_html_alternative() {
        let root = compose(&base().text("plain").html("<p>html</p>"));
        assert_eq!(root.essence(), "multipart/alternative");
        let parts = root.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].essence(), "text/plain");
        assert_eq!(parts[0].body, "plain");
        assert_eq!(parts[1].essence(), "text/html");
        assert_eq!(parts[1].body, "<p>html</p>");
    }

    #[test]
    fn test_html_with_inline_related() {
        let mut message = base().html("<img src=\"cid:logo\">");
        message
            .attach_inline(&b"PNG"[..], "logo.png", None)
            .unwrap();

        let root = compose(&message);
        assert_eq!(root.essence(), "multipart/related");
        let parts = root.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].essence(), "text/html");
        assert_eq!(parts[0].body, "<img src=3D\"cid:logo\">");
        assert_eq!(parts[1].essence(), "image/png");
        assert_eq!(
            parts[1].headers.get("Content-Disposition"),
            Some("inline; filename=\"logo.png\"")
        );
        assert!(parts[1].headers.contains("Content-ID"));
    }

    #[test]
    fn test_full_nesting() {
        let mut message = base().text("plain").html("<img src=\"cid:logo\">");
        message
            .attach(&b"%PDF"[..], "report.pdf", None)
            .unwrap();
        message
            .attach_inline(&b"PNG"[..], "logo.png", None)
            .unwrap();
        let message = message.attachment(
            Attachment::new("photo.jpg", None, b"JPG".to_vec())
                .inline()
                .with_content_id("photo"),
        );

        let root = compose(&message);
        assert_eq!(root.essence(), "multipart/mixed");
        let mixed = root.parts();
        assert_eq!(mixed.len(), 2);

        let alternative = &mixed[0];
        assert_eq!(alternative.essence(), "multipart/alternative");
        let alternatives = alternative.parts();
        assert_eq!(alternatives[0].essence(), "text/plain");

        let related = &alternatives[1];
        assert_eq!(related.essence(), "multipart/related");
        let related_parts = related.parts();
        assert_eq!(related_parts.len(), 3);
        assert_eq!(related_parts[0].essence(), "text/html");
        assert_eq!(
            related_parts[1].headers.get("Content-Disposition"),
            Some("inline; filename=\"logo.png\"")
        );
        assert_eq!(related_parts[2].headers.get("Content-ID"), Some("<photo>"));

        let report = &mixed[1];
        assert_eq!(report.essence(), "application/pdf");
        assert_eq!(
            report.headers.get("Content-Disposition"),
            Some("attachment; filename=\"report.pdf\"")
        );
        assert_eq!(decode_base64_wrapped(&report.body).unwrap(), b"%PDF");
    }

    #[test]
    fn test_attachments_without_body() {
        let message = base().attachment(Attachment::new("a.txt", None, b"a".to_vec()));
        let root = compose(&message);
        assert_eq!(root.essence(), "multipart/mixed");
        let parts = root.parts();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].essence(), "text/plain");
        assert_eq!(
            parts[0].headers.get("Content-Disposition"),
            Some("attachment; filename=\"a.txt\"")
        );
    }

    #[test]
    fn test_boundaries_unique() {
        let message = base()
            .text("t")
            .html("h")
            .attachment(Attachment::new("i.png", None, Vec::new()).inline())
            .attachment(Attachment::new("a.bin", None, Vec::new()));
        let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();

        let mut boundaries: Vec<&str> = bytes
            .lines()
            .filter_map(|line| line.trim().strip_prefix("boundary="))
            .collect();
        assert_eq!(boundaries.len(), 3);
        for boundary in &boundaries {
            // The delimiter never occurs in any part content.
            assert_eq!(bytes.matches(&format!("--{boundary}--")).count(), 1);
        }
        boundaries.sort_unstable();
        boundaries.dedup();
        assert_eq!(boundaries.len(), 3);
    }

    #[test]
    fn test_bcc_never_emitted() {
        let message = base().bcc("hidden@example.com").text("x");
        let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
        assert!(!bytes.contains("hidden@example.com"));
        assert!(!bytes.contains("\r\nBcc:"));
        assert_eq!(
            message.envelope().unwrap().recipients,
            vec!["bob@example.com", "hidden@example.com"]
        );
    }

    #[test]
    fn test_sender_not_emitted() {
        let message = base().sender("bounces@example.com").text("x");
        let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
        assert!(!bytes.contains("bounces@example.com"));
        assert_eq!(message.envelope().unwrap().sender, "bounces@example.com");
    }

    #[test]
    fn test_envelope() {
        let message = Message::new()
            .from("Alice <alice@example.com>")
            .to("Bob <bob@example.com>, carol@example.com")
            .cc("\"Doe, Dave\" <dave@example.com>")
            .bcc("eve@example.com");
        let envelope = message.envelope().unwrap();
        assert_eq!(envelope.sender, "alice@example.com");
        assert_eq!(
            envelope.recipients,
            vec![
                "bob@example.com",
                "carol@example.com",
                "dave@example.com",
                "eve@example.com"
            ]
        );
    }

    #[test]
    fn test_missing_from() {
        let message = Message::new().to("bob@example.com").text("x");
        assert!(matches!(message.to_bytes(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_recipients() {
        let message = Message::new().from("alice@example.com").to(" ").text("x");
        assert!(matches!(message.to_bytes(), Err(Error::Validation(_))));
        assert!(matches!(message.envelope(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validation_precedes_structure_errors() {
        let message = Message::new()
            .attachment(Attachment::new("logo.png", None, Vec::new()).inline());
        assert!(matches!(message.to_bytes(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_malformed_addresses() {
        let bad_to = base().to("not-an-address").text("x");
        assert!(matches!(bad_to.to_bytes(), Err(Error::Address(_))));

        let bad_from = base().from("alice at example").text("x");
        assert!(matches!(bad_from.to_bytes(), Err(Error::Address(_))));

        let bad_reply = base().reply_to("nope").text("x");
        assert!(matches!(bad_reply.to_bytes(), Err(Error::Address(_))));
    }

    #[test]
    fn test_header_injection_through_address_rejected() {
        let message = base().to("x@[a\r\nX-Injected:1]").text("hi");
        let mut out = Vec::new();
        assert!(matches!(message.write_to(&mut out), Err(Error::Address(_))));
        assert!(out.is_empty());

        let quoted = base().cc("\"a\0b\"@example.com").text("hi");
        assert!(matches!(quoted.to_bytes(), Err(Error::Address(_))));
    }

    #[test]
    fn test_output_is_ascii() {
        let non_ascii = base().to("jörg@exämple.com").text("hi");
        assert!(matches!(non_ascii.to_bytes(), Err(Error::Address(_))));

        let mut message = base()
            .from("Jörg Müller <jorg@example.com>")
            .to("\"j doe\"@example.com, root@[192.168.0.1]")
            .cc("Zoë <zoe@example.com>")
            .reply_to("\"Ärger, Team\" <team@example.com>")
            .subject("Grüße")
            .text("Schöne Grüße")
            .html("<p>Schöne Grüße</p>");
        message
            .attach(&"Ünïcödé".as_bytes()[..], "résumé.txt", None)
            .unwrap();

        let bytes = message.to_bytes().unwrap();
        assert!(bytes.is_ascii());
    }

    #[test]
    fn test_inline_without_html_writes_nothing() {
        let message = base()
            .text("x")
            .attachment(Attachment::new("logo.png", None, Vec::new()).inline());
        let mut out = Vec::new();
        let result = message.write_to(&mut out);
        assert!(matches!(result, Err(Error::Structure(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_attach_failure_leaves_message_unchanged() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("gone"))
            }
        }

        let mut message = base();
        assert!(matches!(
            message.attach(Broken, "x.bin", None),
            Err(Error::Io(_))
        ));
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_non_ascii_subject_and_body() {
        let message = base().subject("Grüße").text("Schöne Grüße\n");
        let root = compose(&message);
        let subject = root.headers.get("Subject").unwrap();
        assert!(subject.starts_with("=?UTF-8?q?"));
        assert_eq!(
            crate::encoding::decode_rfc2047(subject).unwrap(),
            "Grüße"
        );
        assert_eq!(
            decode_quoted_printable(root.body.as_bytes()).unwrap(),
            "Schöne Grüße\r\n".as_bytes()
        );
    }

    #[test]
    fn test_caller_headers() {
        let message = base()
            .text("x")
            .header("Message-ID", "<fixed@example.com>")
            .header("X-Priority", "1")
            .header("Content-Type", "application/json");
        let root = compose(&message);
        assert_eq!(root.headers.get("Message-ID"), Some("<fixed@example.com>"));
        assert_eq!(root.headers.get("X-Priority"), Some("1"));
        // Structural headers always describe the real body.
        assert_eq!(root.essence(), "text/plain");
    }

    #[test]
    fn test_deterministic_with_fixed_identifiers() {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap();
        let message = base()
            .header("Message-ID", "<fixed@example.com>")
            .text("t")
            .html("h")
            .attachment(Attachment::new("a.txt", None, b"abc".to_vec()).with_content_id("a"));

        let normalize = |bytes: Vec<u8>| {
            let mut text = String::from_utf8(bytes).unwrap();
            let boundaries: Vec<String> = text
                .lines()
                .filter_map(|line| line.trim().strip_prefix("boundary="))
                .map(str::to_string)
                .collect();
            for (i, boundary) in boundaries.iter().enumerate() {
                text = text.replace(boundary, &format!("BOUNDARY{i}"));
            }
            text
        };

        let first = normalize(message.to_bytes_at(date).unwrap());
        let second = normalize(message.to_bytes_at(date).unwrap());
        assert_eq!(first, second);
        assert!(first.contains("Date: Tue, 2 Jan 2024 03:04:05 +0000\r\n"));
    }

    #[test]
    fn test_write_to() {
        let message = base().text("hello");
        let mut out = Vec::new();
        message.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\r\n\r\nhello"));
        assert!(text.split("\r\n").all(|line| line.len() <= 998));
    }
}
