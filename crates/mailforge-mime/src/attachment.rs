//! Attachments: standalone downloads and inline parts referenced from HTML.

use crate::content_type::{ContentType, OCTET_STREAM};
use crate::encoding::{needs_encoding, write_base64_wrapped};
use crate::error::Result;
use crate::header::Headers;
use crate::id;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// A file attached to a message.
///
/// Inline attachments are rendered with `Content-Disposition: inline` and
/// grouped with the HTML body in a `multipart/related` container; the HTML
/// refers to them with `cid:` URLs. Standalone attachments are rendered
/// with `Content-Disposition: attachment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content_type: Option<String>,
    content: Vec<u8>,
    inline: bool,
    headers: Headers,
}

impl Attachment {
    /// Creates a standalone attachment from in-memory content.
    ///
    /// When `content_type` is `None` the type is inferred from the file
    /// name's extension, falling back to `application/octet-stream`.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            content,
            inline: false,
            headers: Headers::new(),
        }
    }

    /// Creates an attachment by draining `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if reading fails.
    pub fn from_reader<R: Read>(
        filename: impl Into<String>,
        content_type: Option<&str>,
        mut reader: R,
    ) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(Self::new(filename, content_type, content))
    }

    /// Creates an attachment from a file on disk.
    ///
    /// The file name (without directories) becomes the attachment name and
    /// the content type is inferred from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be opened or read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_reader(filename, None, file)
    }

    /// Marks the attachment as inline (referenced from the HTML body).
    #[must_use]
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Sets an explicit Content-ID (e.g. `<logo>`), so HTML can refer to
    /// the part as `cid:logo`.
    #[must_use]
    pub fn with_content_id(self, content_id: impl AsRef<str>) -> Self {
        let content_id = content_id.as_ref().trim();
        let content_id = if content_id.starts_with('<') {
            content_id.to_string()
        } else {
            format!("<{content_id}>")
        };
        self.with_header("Content-ID", content_id)
    }

    /// Sets a part header that takes precedence over the computed defaults.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Returns the attachment's file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the raw content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns true if the attachment is inline.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.inline
    }

    /// Returns the caller-supplied header overrides.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the effective media type: declared, inferred from the
    /// extension, or `application/octet-stream`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|declared| !declared.trim().is_empty())
            .or_else(|| ContentType::from_filename(&self.filename))
            .unwrap_or(OCTET_STREAM)
    }

    /// Returns the `Content-Disposition` value for this attachment.
    ///
    /// Non-ASCII filenames get an ASCII `filename` fallback plus an RFC 2231
    /// `filename*` parameter carrying the UTF-8 name.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        let kind = if self.inline { "inline" } else { "attachment" };
        if !needs_encoding(&self.filename) {
            return format!("{kind}; filename=\"{}\"", quote(&self.filename));
        }

        let fallback: String = self
            .filename
            .chars()
            .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '_' })
            .collect();
        format!(
            "{kind}; filename=\"{}\";\r\n filename*=UTF-8''{}",
            quote(&fallback),
            utf8_percent_encode(&self.filename, ATTR_CHAR_ESCAPES)
        )
    }

    /// Computes the part headers: caller overrides first, then defaults for
    /// `Content-Type`, `Content-Disposition` and `Content-ID`, then
    /// `Content-Transfer-Encoding: base64`, which cannot be overridden.
    ///
    /// A Content-ID is generated only when none was supplied, so each call
    /// may yield a different one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if a Content-ID cannot be generated.
    pub fn default_headers(&self) -> Result<Headers> {
        let mut defaults = Headers::new();
        defaults.set("Content-Type", self.content_type());
        defaults.set("Content-Disposition", self.content_disposition());
        if !self.headers.contains("Content-ID") {
            defaults.set("Content-ID", id::content_id(&self.filename)?);
        }

        let mut headers = self.headers.clone();
        headers.merge_defaults(defaults);
        // The body is always written as base64.
        headers.set("Content-Transfer-Encoding", "base64");
        Ok(headers)
    }

    /// Writes the content as Base64 wrapped to 76-character CRLF lines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if writing fails.
    pub fn write_base64<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        write_base64_wrapped(writer, &self.content)?;
        Ok(())
    }
}

/// Bytes outside RFC 2231 `attr-char`, percent-encoded in `filename*`.
const ATTR_CHAR_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
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
    use crate::encoding::decode_base64_wrapped;
    use crate::error::Error;
    use std::io;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "source closed"))
        }
    }

    #[test]
    fn test_from_reader() {
        let attachment =
            Attachment::from_reader("hello.txt", Some("text/plain"), &b"hello"[..]).unwrap();
        assert_eq!(attachment.filename(), "hello.txt");
        assert_eq!(attachment.content(), b"hello");
        assert!(!attachment.is_inline());
    }

    #[test]
    fn test_from_reader_failure() {
        let result = Attachment::from_reader("x.bin", None, FailingReader);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("mailforge-attach-{}.pdf", std::process::id()));
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let attachment = Attachment::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(attachment.content(), b"%PDF-1.4");
        assert_eq!(attachment.content_type(), "application/pdf");
        assert!(attachment.filename().ends_with(".pdf"));
        assert!(!attachment.filename().contains('/'));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Attachment::from_file("/nonexistent/mailforge/file.txt");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_content_type_resolution() {
        let declared = Attachment::new("a.png", Some("image/x-custom"), Vec::new());
        assert_eq!(declared.content_type(), "image/x-custom");

        let inferred = Attachment::new("a.png", None, Vec::new());
        assert_eq!(inferred.content_type(), "image/png");

        let unknown = Attachment::new("a.zzz", None, Vec::new());
        assert_eq!(unknown.content_type(), "application/octet-stream");

        let blank = Attachment::new("a.bin", Some(" "), Vec::new());
        assert_eq!(blank.content_type(), "application/octet-stream");
    }

    #[test]
    fn test_default_headers_standalone() {
        let attachment = Attachment::new("report.pdf", None, b"data".to_vec());
        let headers = attachment.default_headers().unwrap();

        assert_eq!(headers.get("Content-Type"), Some("application/pdf"));
        assert_eq!(
            headers.get("Content-Disposition"),
            Some("attachment; filename=\"report.pdf\"")
        );
        assert_eq!(headers.get("Content-Transfer-Encoding"), Some("base64"));
        assert!(headers.get("Content-ID").unwrap().ends_with("@report.pdf>"));
    }

    #[test]
    fn test_default_headers_inline() {
        let attachment = Attachment::new("logo.png", None, Vec::new()).inline();
        let headers = attachment.default_headers().unwrap();
        assert_eq!(
            headers.get("Content-Disposition"),
            Some("inline; filename=\"logo.png\"")
        );
    }

    #[test]
    fn test_default_headers_preserve_overrides() {
        let attachment = Attachment::new("logo.png", None, Vec::new())
            .inline()
            .with_content_id("logo")
            .with_header("content-type", "image/svg+xml");
        let headers = attachment.default_headers().unwrap();

        assert_eq!(headers.get("Content-ID"), Some("<logo>"));
        assert_eq!(headers.get("Content-Type"), Some("image/svg+xml"));
        assert_eq!(headers.get_all("Content-Type").len(), 1);
        // Overrides come first, then the remaining defaults.
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "Content-ID",
                "Content-Type",
                "Content-Disposition",
                "Content-Transfer-Encoding"
            ]
        );
    }

    #[test]
    fn test_default_headers_do_not_mutate() {
        let attachment = Attachment::new("a.txt", None, Vec::new());
        let _ = attachment.default_headers().unwrap();
        assert!(attachment.headers().is_empty());
    }

    #[test]
    fn test_disposition_escapes_filename() {
        let attachment = Attachment::new("say \"hi\".txt", None, Vec::new());
        assert_eq!(
            attachment.content_disposition(),
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
    }

    #[test]
    fn test_disposition_encodes_non_ascii_filename() {
        let attachment = Attachment::new("résumé.pdf", None, Vec::new());
        let disposition = attachment.content_disposition();
        assert!(disposition.is_ascii());
        assert_eq!(
            disposition,
            "attachment; filename=\"r_sum_.pdf\";\r\n filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
        assert!(!disposition.contains("=?"));
    }

    #[test]
    fn test_disposition_control_bytes_never_raw() {
        let attachment = Attachment::new("a\r\nX-Injected: 1.txt", None, Vec::new()).inline();
        let disposition = attachment.content_disposition();
        assert!(disposition.starts_with("inline; filename=\"a__X-Injected: 1.txt\";\r\n "));
        assert!(disposition.ends_with("filename*=UTF-8''a%0D%0AX-Injected%3A%201.txt"));
    }

    #[test]
    fn test_transfer_encoding_cannot_be_overridden() {
        let attachment = Attachment::new("a.txt", None, b"hello".to_vec())
            .with_header("Content-Transfer-Encoding", "7bit");
        let headers = attachment.default_headers().unwrap();
        assert_eq!(headers.get_all("Content-Transfer-Encoding"), vec!["base64"]);
    }

    #[test]
    fn test_write_base64() {
        let content: Vec<u8> = (0..200u8).collect();
        let attachment = Attachment::new("bytes.bin", None, content.clone());
        let mut out = Vec::new();
        attachment.write_base64(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|line| line.len() == 76));
        assert_eq!(decode_base64_wrapped(&text).unwrap(), content);
    }
}
