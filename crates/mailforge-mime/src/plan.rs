//! Multipart structure planning and serialization.
//!
//! [`Plan::build`] decides, once, how the text body (T), HTML body (H),
//! inline attachments (R) and standalone attachments (M) nest:
//!
//! ```text
//! T only              text/plain
//! H only              text/html
//! T + H               multipart/alternative [T, H]
//! H + R               multipart/related [H, R...]
//! T + H + R           multipart/alternative [T, multipart/related [H, R...]]
//! any body + M        multipart/mixed [<body as above>, M...]
//! R without H         error
//! ```
//!
//! The resulting tree is then written by a single recursive walk.

use crate::attachment::Attachment;
use crate::content_type::ContentType;
use crate::encoding::encode_quoted_printable;
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::id;
use std::fmt;
use std::io::Write;

/// Kind of multipart container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    /// Body followed by standalone attachments.
    Mixed,
    /// Equivalent renderings of the same content, plainest first.
    Alternative,
    /// HTML body plus the inline parts it references.
    Related,
}

impl MultipartKind {
    /// Returns the MIME subtype.
    #[must_use]
    pub const fn subtype(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Alternative => "alternative",
            Self::Related => "related",
        }
    }
}

/// Kind of text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `text/plain`.
    Text,
    /// `text/html`.
    Html,
}

impl BodyKind {
    /// Returns the content type used for this body.
    #[must_use]
    pub fn content_type(self) -> ContentType {
        match self {
            Self::Text => ContentType::text_plain(),
            Self::Html => ContentType::text_html(),
        }
    }
}

/// Planned MIME tree of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan<'a> {
    /// A quoted-printable text or HTML body.
    Body {
        /// Text or HTML.
        kind: BodyKind,
        /// Raw body bytes.
        content: &'a [u8],
    },
    /// A base64 attachment part.
    Attachment(&'a Attachment),
    /// A multipart container.
    Multipart {
        /// Container kind.
        kind: MultipartKind,
        /// Child parts in output order.
        parts: Vec<Plan<'a>>,
    },
}

impl<'a> Plan<'a> {
    /// Decides the MIME structure for the given bodies and attachments.
    ///
    /// Empty bodies count as absent. With no body and no attachments the
    /// plan is an empty `text/plain` body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structure`] if there are inline attachments but no
    /// HTML body.
    pub fn build(
        text: Option<&'a [u8]>,
        html: Option<&'a [u8]>,
        attachments: &'a [Attachment],
    ) -> Result<Self> {
        let text = text.filter(|body| !body.is_empty());
        let html = html.filter(|body| !body.is_empty());
        let (inline, standalone): (Vec<&Attachment>, Vec<&Attachment>) =
            attachments.iter().partition(|a| a.is_inline());

        if !inline.is_empty() && html.is_none() {
            return Err(Error::Structure(
                "inline attachments require an HTML body".to_string(),
            ));
        }

        let html_part = html.map(|content| {
            let body = Self::Body {
                kind: BodyKind::Html,
                content,
            };
            if inline.is_empty() {
                body
            } else {
                let mut parts = vec![body];
                parts.extend(inline.iter().copied().map(Self::Attachment));
                Self::Multipart {
                    kind: MultipartKind::Related,
                    parts,
                }
            }
        });
        let text_part = text.map(|content| Self::Body {
            kind: BodyKind::Text,
            content,
        });

        let body = match (text_part, html_part) {
            (Some(text), Some(html)) => Some(Self::Multipart {
                kind: MultipartKind::Alternative,
                parts: vec![text, html],
            }),
            (text, html) => text.or(html),
        };

        if standalone.is_empty() {
            return Ok(body.unwrap_or(Self::Body {
                kind: BodyKind::Text,
                content: &[],
            }));
        }

        let mut parts: Vec<Self> = body.into_iter().collect();
        parts.extend(standalone.iter().copied().map(Self::Attachment));
        Ok(Self::Multipart {
            kind: MultipartKind::Mixed,
            parts,
        })
    }

    /// Returns the container kind if this node is multipart.
    #[must_use]
    pub const fn multipart_kind(&self) -> Option<MultipartKind> {
        match self {
            Self::Multipart { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Writes this node as a MIME entity: `headers` plus the node's own
    /// content headers, a blank line, then the encoded body.
    ///
    /// Structural headers (`Content-Type`, `Content-Transfer-Encoding`)
    /// replace any of the same name in `headers`. Each multipart container
    /// gets a freshly generated boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Entropy`] if an identifier cannot be generated,
    /// header rendering errors, or [`Error::Io`] if writing fails.
    pub fn write<W: Write + ?Sized>(&self, mut headers: Headers, writer: &mut W) -> Result<()> {
        match self {
            Self::Body { kind, content } => {
                headers.set("Content-Type", kind.content_type().to_string());
                headers.set("Content-Transfer-Encoding", "quoted-printable");
                headers.write_to(writer)?;
                writer.write_all(&encode_quoted_printable(content))?;
            }
            Self::Attachment(attachment) => {
                headers.merge_defaults(attachment.default_headers()?);
                headers.write_to(writer)?;
                attachment.write_base64(writer)?;
            }
            Self::Multipart { kind, parts } => {
                let boundary = id::boundary()?;
                let content_type = ContentType::multipart(kind.subtype(), boundary.as_str());
                headers.set("Content-Type", content_type.to_folded_string());
                headers.remove("Content-Transfer-Encoding");
                headers.write_to(writer)?;

                for part in parts {
                    write!(writer, "--{boundary}\r\n")?;
                    part.write(Headers::new(), writer)?;
                    writer.write_all(b"\r\n")?;
                }
                write!(writer, "--{boundary}--\r\n")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Plan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body { kind, .. } => write!(f, "{}", kind.content_type().essence()),
            Self::Attachment(attachment) => {
                let disposition = if attachment.is_inline() {
                    "inline"
                } else {
                    "attachment"
                };
                write!(f, "{disposition}({})", attachment.filename())
            }
            Self::Multipart { kind, parts } => {
                write!(f, "multipart/{}[", kind.subtype())?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str("]")
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

    fn inline(name: &str) -> Attachment {
        Attachment::new(name, None, b"img".to_vec()).inline()
    }

    fn standalone(name: &str) -> Attachment {
        Attachment::new(name, None, b"doc".to_vec())
    }

    fn plan(text: Option<&str>, html: Option<&str>, attachments: &[Attachment]) -> String {
        Plan::build(text.map(str::as_bytes), html.map(str::as_bytes), attachments)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(plan(Some("hi"), None, &[]), "text/plain");
    }

    #[test]
    fn test_html_only() {
        assert_eq!(plan(None, Some("<b>hi</b>"), &[]), "text/html");
    }

    #[test]
    fn test_nothing() {
        assert_eq!(plan(None, None, &[]), "text/plain");
        assert_eq!(plan(Some(""), Some(""), &[]), "text/plain");
    }

    #[test]
    fn test_alternative() {
        assert_eq!(
            plan(Some("hi"), Some("<b>hi</b>"), &[]),
            "multipart/alternative[text/plain, text/html]"
        );
    }

    #[test]
    fn test_related() {
        assert_eq!(
            plan(None, Some("<img>"), &[inline("a.png"), inline("b.png")]),
            "multipart/related[text/html, inline(a.png), inline(b.png)]"
        );
    }

    #[test]
    fn test_alternative_with_related() {
        assert_eq!(
            plan(Some("hi"), Some("<img>"), &[inline("a.png")]),
            "multipart/alternative[text/plain, multipart/related[text/html, inline(a.png)]]"
        );
    }

    #[test]
    fn test_mixed_text() {
        assert_eq!(
            plan(Some("hi"), None, &[standalone("a.pdf")]),
            "multipart/mixed[text/plain, attachment(a.pdf)]"
        );
    }

    #[test]
    fn test_mixed_attachments_only() {
        assert_eq!(
            plan(None, None, &[standalone("a.pdf"), standalone("b.pdf")]),
            "multipart/mixed[attachment(a.pdf), attachment(b.pdf)]"
        );
    }

    #[test]
    fn test_mixed_related() {
        assert_eq!(
            plan(None, Some("<img>"), &[standalone("a.pdf"), inline("logo.png")]),
            "multipart/mixed[multipart/related[text/html, inline(logo.png)], attachment(a.pdf)]"
        );
    }

    #[test]
    fn test_mixed_alternative_related() {
        assert_eq!(
            plan(
                Some("hi"),
                Some("<img>"),
                &[standalone("a.pdf"), inline("logo.png"), standalone("b.zip")]
            ),
            "multipart/mixed[multipart/alternative[text/plain, multipart/related[text/html, inline(logo.png)]], attachment(a.pdf), attachment(b.zip)]"
        );
    }

    #[test]
    fn test_inline_without_html() {
        let attachments = [inline("logo.png")];
        let result = Plan::build(Some(b"hi".as_slice()), None, &attachments);
        assert!(matches!(result, Err(Error::Structure(_))));

        let result = Plan::build(None, Some(b"".as_slice()), &attachments);
        assert!(matches!(result, Err(Error::Structure(_))));
    }

    #[test]
    fn test_multipart_kind() {
        let attachments = [standalone("a.pdf")];
        let mixed = Plan::build(None, None, &attachments).unwrap();
        assert_eq!(mixed.multipart_kind(), Some(MultipartKind::Mixed));
        let single = Plan::build(Some(b"x".as_slice()), None, &[]).unwrap();
        assert_eq!(single.multipart_kind(), None);
    }

    #[test]
    fn test_write_single_body() {
        let plan = Plan::build(Some("Grüße\n".as_bytes()), None, &[]).unwrap();
        let mut out = Vec::new();
        plan.write(Headers::new(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                "Content-Type: text/plain; charset=UTF-8\r\n",
                "Content-Transfer-Encoding: quoted-printable\r\n",
                "\r\n",
                "Gr=C3=BC=C3=9Fe\r\n",
            )
        );
    }

    #[test]
    fn test_write_alternative_boundaries() {
        let plan = Plan::build(Some(b"plain".as_slice()), Some(b"<p>html</p>".as_slice()), &[])
            .unwrap();
        let mut out = Vec::new();
        plan.write(Headers::new(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let headers = Headers::parse(&text);
        let content_type = ContentType::parse(headers.get("Content-Type").unwrap()).unwrap();
        assert_eq!(content_type.essence(), "multipart/alternative");
        let boundary = content_type.boundary().unwrap();

        assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        let plain_at = text.find("text/plain").unwrap();
        let html_at = text.find("text/html").unwrap();
        assert!(plain_at < html_at);
    }

    #[test]
    fn test_nested_boundaries_differ() {
        let attachments = [inline("logo.png"), standalone("a.pdf")];
        let plan = Plan::build(Some(b"t".as_slice()), Some(b"h".as_slice()), &attachments).unwrap();
        let mut out = Vec::new();
        plan.write(Headers::new(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut boundaries: Vec<&str> = text
            .lines()
            .filter_map(|line| line.trim().strip_prefix("boundary="))
            .collect();
        assert_eq!(boundaries.len(), 3);
        boundaries.sort_unstable();
        boundaries.dedup();
        assert_eq!(boundaries.len(), 3);
        for boundary in boundaries {
            assert_eq!(text.matches(&format!("--{boundary}--\r\n")).count(), 1);
        }
    }

    #[test]
    fn test_write_failure_is_io_error() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let plan = Plan::build(Some(b"x".as_slice()), None, &[]).unwrap();
        let result = plan.write(Headers::new(), &mut Full);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
