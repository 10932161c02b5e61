//! MIME header handling.
//!
//! [`Headers`] keeps field names in canonical case and compares them
//! case-insensitively, so `message-id` and `Message-ID` are one field.
//! Fields keep the order in which they were first inserted.

use crate::address::{Mailbox, format_list};
use crate::encoding::encode_header_value;
use crate::error::{Error, Result};
use std::io::Write;

/// Fields whose values are address lists.
const ADDRESS_FIELDS: &[&str] = &[
    "From",
    "Sender",
    "Reply-To",
    "To",
    "Cc",
    "Bcc",
    "Disposition-Notification-To",
];

/// Fields whose values are already fully formed and written as-is.
const VERBATIM_FIELDS: &[&str] = &["Content-Type", "Content-Disposition"];

/// Names whose canonical spelling is not plain word capitalization.
const SPECIAL_NAMES: &[&str] = &["MIME-Version", "Message-ID", "Content-ID"];

/// Returns the canonical spelling of a header field name.
///
/// Each hyphen-separated word is capitalized (`content-type` becomes
/// `Content-Type`), except for a few names with conventional spellings
/// such as `MIME-Version` and `Message-ID`.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let name = name.trim();
    if let Some(special) = SPECIAL_NAMES.iter().find(|s| s.eq_ignore_ascii_case(name)) {
        return (*special).to_string();
    }

    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Collection of email headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Adds a header value, keeping any existing values.
    pub fn add(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        match self.position(name.as_ref()) {
            Some(index) => self.entries[index].1.push(value),
            None => self
                .entries
                .push((canonical_name(name.as_ref()), vec![value])),
        }
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        match self.position(name.as_ref()) {
            Some(index) => self.entries[index].1 = vec![value],
            None => self
                .entries
                .push((canonical_name(name.as_ref()), vec![value])),
        }
    }

    /// Sets a header value only if the field is not present yet.
    ///
    /// Returns `true` if the value was inserted.
    pub fn set_default(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> bool {
        if self.contains(name.as_ref()) {
            return false;
        }
        self.set(name, value);
        true
    }

    /// Appends every field of `defaults` that is not already present.
    ///
    /// Existing fields are never overwritten.
    pub fn merge_defaults(&mut self, defaults: Self) {
        for (name, values) in defaults.entries {
            if !self.contains(&name) {
                self.entries.push((name, values));
            }
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|index| self.entries[index].1.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|index| self.entries[index].1.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        if let Some(index) = self.position(name) {
            self.entries.remove(index);
        }
    }

    /// Returns the number of distinct fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Renders the header block, one CRLF-terminated line per value.
    ///
    /// Address fields are parsed and rejoined in canonical form,
    /// `Content-Type` and `Content-Disposition` are written verbatim, and
    /// all other values are RFC 2047 encoded when they contain anything but
    /// printable ASCII. The blank line ending the block is not included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] for a malformed address and
    /// [`Error::Validation`] for an invalid field name.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for (name, value) in self.iter() {
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
                return Err(Error::Validation(format!("invalid header name {name:?}")));
            }

            out.push_str(name);
            out.push_str(": ");
            if ADDRESS_FIELDS.contains(&name) {
                out.push_str(&format_list(&Mailbox::parse_list(value)?));
            } else if VERBATIM_FIELDS.contains(&name) {
                out.push_str(value);
            } else {
                out.push_str(&encode_header_value(value));
            }
            out.push_str("\r\n");
        }
        Ok(out)
    }

    /// Renders the header block followed by the blank separator line and
    /// writes it to `writer`.
    ///
    /// Rendering completes before anything is written, so an encoding
    /// error leaves the writer untouched.
    ///
    /// # Errors
    ///
    /// Returns rendering errors (see [`Headers::render`]) or
    /// [`Error::Io`] if writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let mut block = self.render()?;
        block.push_str("\r\n");
        writer.write_all(block.as_bytes())?;
        Ok(())
    }

    /// Parses a header block such as the one produced by
    /// [`Headers::write_to`].
    ///
    /// Parsing stops at the first empty line. Folded continuation lines are
    /// joined with a single space. Values are not decoded.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        headers
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
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("X-MAILER"), "X-Mailer");
        assert_eq!(canonical_name("mime-version"), "MIME-Version");
        assert_eq!(canonical_name("Message-Id"), "Message-ID");
        assert_eq!(canonical_name("content-id"), "Content-ID");
        assert_eq!(canonical_name("reply-to"), "Reply-To");
    }

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
        assert_eq!(headers.len(), 0);
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.iter().next(), Some(("Content-Type", "text/plain")));
    }

    #[test]
    fn test_mixed_case_names_merge() {
        let mut headers = Headers::new();
        headers.add("X-Tag", "one");
        headers.add("x-tag", "two");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("X-TAG"), vec!["one", "two"]);
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("to", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut headers = Headers::new();
        headers.set("Subject", "Mine");
        assert!(!headers.set_default("subject", "Default"));
        assert!(headers.set_default("Date", "now"));
        assert_eq!(headers.get("Subject"), Some("Mine"));
        assert_eq!(headers.get("Date"), Some("now"));
    }

    #[test]
    fn test_merge_defaults() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "image/png");

        let mut defaults = Headers::new();
        defaults.set("Content-Type", "application/octet-stream");
        defaults.set("Content-Transfer-Encoding", "base64");

        headers.merge_defaults(defaults);
        assert_eq!(headers.get("Content-Type"), Some("image/png"));
        assert_eq!(headers.get("Content-Transfer-Encoding"), Some("base64"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(!headers.contains("Subject"));
    }

    #[test]
    fn test_render_order_and_rules() {
        let mut headers = Headers::new();
        headers.add("From", "Jörg <joerg@example.com>");
        headers.add("To", "a@example.com,b@example.com");
        headers.add("Subject", "Grüße");
        headers.add("Content-Type", "multipart/mixed;\r\n boundary=abc");
        headers.add("X-Plain", "ascii stays");

        let rendered = headers.render().unwrap();
        assert_eq!(
            rendered,
            concat!(
                "From: =?UTF-8?q?J=C3=B6rg?= <joerg@example.com>\r\n",
                "To: a@example.com, b@example.com\r\n",
                "Subject: =?UTF-8?q?Gr=C3=BC=C3=9Fe?=\r\n",
                "Content-Type: multipart/mixed;\r\n boundary=abc\r\n",
                "X-Plain: ascii stays\r\n",
            )
        );
    }

    #[test]
    fn test_render_rejects_bad_address() {
        let mut headers = Headers::new();
        headers.add("Cc", "not an address");
        assert!(matches!(headers.render(), Err(Error::Address(_))));
    }

    #[test]
    fn test_render_rejects_bad_name() {
        let mut headers = Headers::new();
        headers.add("Bad Name", "x");
        assert!(matches!(headers.render(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_render_encodes_injected_newlines() {
        let mut headers = Headers::new();
        headers.add("Subject", "hi\r\nBcc: victim@example.com");
        let rendered = headers.render().unwrap();
        assert_eq!(rendered.matches("\r\n").count(), 1);
        assert!(rendered.starts_with("Subject: =?UTF-8?q?"));
    }

    #[test]
    fn test_write_to_appends_blank_line() {
        let mut headers = Headers::new();
        headers.add("MIME-Version", "1.0");
        let mut out = Vec::new();
        headers.write_to(&mut out).unwrap();
        assert_eq!(out, b"MIME-Version: 1.0\r\n\r\n");
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=utf-8"));
        assert!(!headers.contains("Body"));
    }
}
