//! RFC 5322 mailbox parsing and canonical formatting.
//!
//! Supports `addr-spec` and `[display-name] <addr-spec>` forms, quoted
//! display names, and comma-separated lists. Group syntax and comments are
//! not supported.

use crate::encoding::{decode_rfc2047, encode_phrase, needs_encoding};
use crate::error::{Error, Result};
use std::fmt;

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address (`local@domain`).
    pub address: String,
}

impl Mailbox {
    /// Parses a single mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] if the input is not a valid mailbox.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::address(input, "address cannot be empty"));
        }

        let Some(open) = find_unquoted(trimmed, b'<') else {
            validate_addr_spec(input, trimmed)?;
            return Ok(Self {
                name: None,
                address: trimmed.to_string(),
            });
        };

        let Some(address) = trimmed[open + 1..].strip_suffix('>') else {
            return Err(Error::address(input, "unterminated angle address"));
        };
        let address = address.trim();
        validate_addr_spec(input, address)?;

        let name = parse_display_name(input, trimmed[..open].trim())?;
        Ok(Self {
            name,
            address: address.to_string(),
        })
    }

    /// Parses a comma-separated list of mailboxes.
    ///
    /// Commas inside quoted display names or angle brackets do not split.
    /// Empty list items are skipped, but at least one mailbox is required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] if any item is invalid or the list is empty.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        let mailboxes = split_list(input)
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>>>()?;

        if mailboxes.is_empty() {
            return Err(Error::address(input, "empty address list"));
        }
        Ok(mailboxes)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) else {
            return f.write_str(&self.address);
        };

        if needs_encoding(name) {
            write!(f, "{} <{}>", encode_phrase(name), self.address)
        } else if name.bytes().all(|b| is_atext(b) || b == b' ') {
            write!(f, "{name} <{}>", self.address)
        } else {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "\"{escaped}\" <{}>", self.address)
        }
    }
}

/// Formats mailboxes as a header value: canonical forms joined by `", "`.
#[must_use]
pub fn format_list(mailboxes: &[Mailbox]) -> String {
    mailboxes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_display_name(input: &str, raw: &str) -> Result<Option<String>> {
    if raw.is_empty() {
        return Ok(None);
    }

    if let Some(quoted) = raw.strip_prefix('"') {
        let Some(inner) = quoted.strip_suffix('"') else {
            return Err(Error::address(input, "unterminated quoted display name"));
        };
        return Ok(Some(unescape(inner)));
    }

    if raw.contains(['"', '<', '>', '@', ',', ';', ':', '\\']) {
        return Err(Error::address(input, "invalid character in display name"));
    }

    // Already-encoded names are normalized back to text.
    let name = decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string());
    Ok(Some(name))
}

fn validate_addr_spec(input: &str, addr: &str) -> Result<()> {
    let Some((local, domain)) = addr.rsplit_once('@') else {
        return Err(Error::address(input, "address must contain @"));
    };

    if local.is_empty() || domain.is_empty() {
        return Err(Error::address(input, "local and domain parts cannot be empty"));
    }

    let local_ok = if local.len() >= 2 && local.starts_with('"') && local.ends_with('"') {
        local[1..local.len() - 1].bytes().all(is_quoted_text)
    } else {
        is_dot_atom(local)
    };
    if !local_ok {
        return Err(Error::address(input, "invalid local part"));
    }

    let domain_ok = if domain.starts_with('[') && domain.ends_with(']') {
        domain.len() > 2 && domain[1..domain.len() - 1].bytes().all(is_dtext)
    } else {
        is_dot_atom(domain)
    };
    if !domain_ok {
        return Err(Error::address(input, "invalid domain"));
    }

    Ok(())
}

fn is_dot_atom(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|atom| !atom.is_empty() && atom.bytes().all(is_atext))
}

/// RFC 5322 `atext`.
fn is_atext(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-/=?^_`{|}~".contains(&b)
}

/// Printable ASCII allowed between the quotes of a local part.
const fn is_quoted_text(b: u8) -> bool {
    matches!(b, b' '..=b'~')
}

/// RFC 5322 `dtext`.
const fn is_dtext(b: u8) -> bool {
    matches!(b, 33..=90 | 94..=126)
}

/// Finds the first occurrence of `needle` outside a quoted string.
fn find_unquoted(text: &str, needle: u8) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            _ if b == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_list(input: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (i, b) in input.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_quotes => escaped = true,
            b'"' if !in_angle => in_quotes = !in_quotes,
            b'<' if !in_quotes => in_angle = true,
            b'>' if !in_quotes => in_angle = false,
            b',' if !in_quotes && !in_angle => {
                items.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&input[start..]);
    items
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
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
    fn test_bare_address() {
        let mailbox = Mailbox::parse("  user@example.com ").unwrap();
        assert_eq!(mailbox.address, "user@example.com");
        assert!(mailbox.name.is_none());
        assert_eq!(mailbox.to_string(), "user@example.com");
    }

    #[test]
    fn test_named_address() {
        let mailbox = Mailbox::parse("John Doe <john@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("John Doe"));
        assert_eq!(mailbox.address, "john@example.com");
        assert_eq!(mailbox.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_angle_only() {
        let mailbox = Mailbox::parse("<john@example.com>").unwrap();
        assert!(mailbox.name.is_none());
        assert_eq!(mailbox.to_string(), "john@example.com");
    }

    #[test]
    fn test_quoted_name_with_comma() {
        let mailbox = Mailbox::parse("\"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Doe, John"));
        assert_eq!(mailbox.to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_quoted_name_escapes() {
        let mailbox = Mailbox::parse(r#""The \"Boss\"" <boss@example.com>"#).unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("The \"Boss\""));
        assert_eq!(mailbox.to_string(), r#""The \"Boss\"" <boss@example.com>"#);
    }

    #[test]
    fn test_non_ascii_name_encoded() {
        let mailbox = Mailbox::parse("Jörg <joerg@example.com>").unwrap();
        assert_eq!(mailbox.to_string(), "=?UTF-8?q?J=C3=B6rg?= <joerg@example.com>");
    }

    #[test]
    fn test_encoded_name_normalized() {
        let mailbox = Mailbox::parse("=?UTF-8?q?J=C3=B6rg?= <joerg@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Jörg"));
    }

    #[test]
    fn test_invalid_addresses() {
        for input in [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "user@@example.com",
            "us er@example.com",
            "user@exa mple.com",
            "user.@example.com",
            "John <john@example.com",
            "John <>",
            "Jo<hn <john@example.com>",
            "a@b, c",
        ] {
            let result = Mailbox::parse(input);
            assert!(matches!(result, Err(Error::Address(_))), "{input:?} parsed");
        }
    }

    #[test]
    fn test_domain_literal() {
        let mailbox = Mailbox::parse("root@[192.168.0.1]").unwrap();
        assert_eq!(mailbox.address, "root@[192.168.0.1]");
        let mailbox = Mailbox::parse("root@[IPv6:2001:db8::1]").unwrap();
        assert_eq!(mailbox.address, "root@[IPv6:2001:db8::1]");
    }

    #[test]
    fn test_control_bytes_rejected() {
        for input in [
            "x@[a\r\nX-Injected:1]",
            "x@[a\tb]",
            "x@[]",
            "\"a\0b\"@example.com",
            "\"a\r\nb\"@example.com",
            "\"a\x7fb\"@example.com",
            "Bob <x@[a\nb]>",
        ] {
            let result = Mailbox::parse(input);
            assert!(matches!(result, Err(Error::Address(_))), "{input:?} parsed");
        }
    }

    #[test]
    fn test_quoted_local_part() {
        let mailbox = Mailbox::parse("\"john doe\"@example.com").unwrap();
        assert_eq!(mailbox.address, "\"john doe\"@example.com");
    }

    #[test]
    fn test_non_ascii_address_rejected() {
        for input in [
            "jörg@example.com",
            "jorg@exämple.com",
            "Jörg <jörg@exämple.com>",
            "\"jörg\"@example.com",
            "x@[exämple]",
        ] {
            let result = Mailbox::parse(input);
            assert!(matches!(result, Err(Error::Address(_))), "{input:?} parsed");
        }

        let mailbox = Mailbox::parse("Jörg <jorg@example.com>").unwrap();
        assert!(mailbox.to_string().is_ascii());
    }

    #[test]
    fn test_parse_list() {
        let list = Mailbox::parse_list(
            "a@example.com, \"Doe, John\" <john@example.com>,Bob <bob@example.com>,",
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1].address, "john@example.com");
        assert_eq!(
            format_list(&list),
            "a@example.com, \"Doe, John\" <john@example.com>, Bob <bob@example.com>"
        );
    }

    #[test]
    fn test_parse_list_errors() {
        assert!(Mailbox::parse_list("").is_err());
        assert!(Mailbox::parse_list(" , ").is_err());
        assert!(Mailbox::parse_list("a@example.com, broken").is_err());
    }
}
