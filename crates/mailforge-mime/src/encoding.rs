//! MIME encoding and decoding utilities.
//!
//! Supports wrapped Base64 bodies, Quoted-Printable bodies (RFC 2045) and
//! RFC 2047 encoded-words for header values. The decoders exist to verify
//! the encoders' output; this crate does not parse received mail.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
pub const MAX_LINE_LENGTH: usize = 76;

/// Raw bytes per Base64 line: 57 bytes encode to exactly 76 characters.
const BASE64_LINE_BYTES: usize = 57;

/// Maximum length of a single RFC 2047 encoded-word.
const MAX_ENCODED_WORD: usize = 75;

const ENCODED_WORD_PREFIX: &str = "=?UTF-8?q?";
const ENCODED_WORD_SUFFIX: &str = "?=";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Writes `data` as Base64 wrapped to 76-character lines.
///
/// Input is consumed in 57-byte groups; each group becomes one full line
/// terminated by CRLF. A trailing short group produces one shorter line.
/// Empty input writes nothing.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_base64_wrapped<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let mut line = String::with_capacity(MAX_LINE_LENGTH + 2);
    for chunk in data.chunks(BASE64_LINE_BYTES) {
        line.clear();
        STANDARD.encode_string(chunk, &mut line);
        line.push_str("\r\n");
        writer.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Decodes Base64 produced by [`write_base64_wrapped`].
///
/// # Errors
///
/// Returns an error if the unwrapped input is not valid Base64.
pub fn decode_base64_wrapped(text: &str) -> Result<Vec<u8>> {
    let joined: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    decode_base64(&joined)
}

/// Encodes a body using Quoted-Printable encoding (RFC 2045 section 6.7).
///
/// Line breaks in the input (CRLF or bare LF) become CRLF hard breaks.
/// `=`, control characters and non-ASCII bytes are escaped as `=XX`, as is
/// whitespace at the end of a line. Soft breaks keep every encoded line
/// within 76 characters.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    let mut lines = data.split(|&b| b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let hard_break = lines.peek().is_some();
        let line = if hard_break {
            line.strip_suffix(b"\r").unwrap_or(line)
        } else {
            line
        };

        let mut line_length = 0;
        for (i, &byte) in line.iter().enumerate() {
            let trailing_space = (byte == b' ' || byte == b'\t') && i + 1 == line.len();
            let literal = !trailing_space
                && matches!(byte, b'!'..=b'<' | b'>'..=b'~' | b' ' | b'\t');
            let width = if literal { 1 } else { 3 };

            // Leave room for the soft break's '='.
            if line_length + width > MAX_LINE_LENGTH - 1 {
                out.extend_from_slice(b"=\r\n");
                line_length = 0;
            }

            if literal {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("={byte:02X}").as_bytes());
            }
            line_length += width;
        }

        if hard_break {
            out.extend_from_slice(b"\r\n");
        }
    }

    out
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }

        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([high, low, ..]) => {
                let byte = hex_value(*high)
                    .zip(hex_value(*low))
                    .map(|(h, l)| (h << 4) | l)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid hex: ={}{}",
                            char::from(*high),
                            char::from(*low)
                        ))
                    })?;
                result.push(byte);
                i += 3;
            }
            _ => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

fn hex_value(digit: u8) -> Option<u8> {
    char::from(digit)
        .to_digit(16)
        .and_then(|v| u8::try_from(v).ok())
}

/// Returns true if a header value must be RFC 2047 encoded to stay within
/// printable ASCII.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.bytes()
        .any(|b| (b < b' ' || b > b'~') && b != b'\t')
}

/// Encodes an unstructured header value (e.g. `Subject`) using RFC 2047
/// Q-encoding when it contains anything but printable ASCII.
///
/// Long values are split into several encoded-words joined by a folding
/// CRLF SP; a UTF-8 sequence is never split across words.
#[must_use]
pub fn encode_header_value(text: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }
    q_encode(text, |b| {
        b.is_ascii_graphic() && b != b'=' && b != b'?' && b != b'_'
    })
}

/// Encodes a display name for use in an address header.
///
/// Uses the restricted character set RFC 2047 section 5(3) allows inside
/// a `phrase`.
#[must_use]
pub fn encode_phrase(text: &str) -> String {
    q_encode(text, |b| b.is_ascii_alphanumeric() || b"!*+-/".contains(&b))
}

fn q_encode(text: &str, literal: impl Fn(u8) -> bool) -> String {
    let capacity = MAX_ENCODED_WORD - ENCODED_WORD_PREFIX.len() - ENCODED_WORD_SUFFIX.len();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let mut encoded = String::new();
        for &byte in c.encode_utf8(&mut buf).as_bytes() {
            if byte == b' ' {
                encoded.push('_');
            } else if literal(byte) {
                encoded.push(char::from(byte));
            } else {
                let _ = write!(encoded, "={byte:02X}");
            }
        }

        if !current.is_empty() && current.len() + encoded.len() > capacity {
            words.push(std::mem::take(&mut current));
        }
        current.push_str(&encoded);
    }
    words.push(current);

    words
        .iter()
        .map(|word| format!("{ENCODED_WORD_PREFIX}{word}{ENCODED_WORD_SUFFIX}"))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Decodes a header value that may contain RFC 2047 encoded-words.
///
/// Whitespace between adjacent encoded-words is dropped, as the RFC
/// requires. Only UTF-8 (and its US-ASCII subset) charsets are supported.
///
/// # Errors
///
/// Returns an error if an encoded-word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::new();
    let mut previous_encoded = false;

    for (index, token) in text.split_whitespace().enumerate() {
        match decode_encoded_word(token)? {
            Some(decoded) => {
                if index > 0 && !previous_encoded {
                    result.push(' ');
                }
                result.push_str(&decoded);
                previous_encoded = true;
            }
            None => {
                if index > 0 {
                    result.push(' ');
                }
                result.push_str(token);
                previous_encoded = false;
            }
        }
    }

    Ok(result)
}

fn decode_encoded_word(token: &str) -> Result<Option<String>> {
    let Some(inner) = token
        .strip_prefix("=?")
        .and_then(|rest| rest.strip_suffix("?="))
    else {
        return Ok(None);
    };

    let parts: Vec<&str> = inner.splitn(3, '?').collect();
    let [charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(format!(
            "Invalid RFC 2047 word: {token}"
        )));
    };

    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("us-ascii") {
        return Err(Error::InvalidEncoding(format!(
            "Unsupported charset: {charset}"
        )));
    }

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_quoted_printable(encoded_text.replace('_', " ").as_bytes())?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    Ok(Some(String::from_utf8(bytes)?))
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
    use proptest::prelude::*;

    fn wrapped(data: &[u8]) -> String {
        let mut out = Vec::new();
        write_base64_wrapped(&mut out, data).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Converts bare LF to CRLF, leaving existing CRLF alone.
    fn normalize_newlines(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for (i, &byte) in data.iter().enumerate() {
            if byte == b'\n' && (i == 0 || data[i - 1] != b'\r') {
                out.push(b'\r');
            }
            out.push(byte);
        }
        out
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_empty() {
        assert_eq!(wrapped(b""), "");
    }

    #[test]
    fn test_base64_wrapped_short() {
        assert_eq!(wrapped(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==\r\n");
    }

    #[test]
    fn test_base64_wrapped_exact_line() {
        let data = [0u8; 57];
        let out = wrapped(&data);
        assert_eq!(out, format!("{}\r\n", "A".repeat(76)));
    }

    #[test]
    fn test_base64_wrapped_line_boundaries() {
        let data: Vec<u8> = (0..=255).collect();
        let out = wrapped(&data);
        let lines: Vec<&str> = out.split_terminator("\r\n").collect();
        // 256 bytes = 4 full lines of 57 plus 28 remaining bytes.
        assert_eq!(lines.len(), 5);
        assert!(lines[..4].iter().all(|line| line.len() == 76));
        assert_eq!(lines[4].len(), 40);
        assert!(out.ends_with("\r\n"));
        assert_eq!(decode_base64_wrapped(&out).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), b"Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
        assert_eq!(encoded, b"H=C3=A9llo, W=C3=B8rld!");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable(b"a=b"), b"a=3Db");
    }

    #[test]
    fn test_quoted_printable_hard_breaks() {
        assert_eq!(encode_quoted_printable(b"one\r\ntwo"), b"one\r\ntwo");
        assert_eq!(encode_quoted_printable(b"one\ntwo\n"), b"one\r\ntwo\r\n");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext\t"), b"end=20\r\nnext=09");
        assert_eq!(encode_quoted_printable(b"a b"), b"a b");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(text.as_bytes());
        let encoded = String::from_utf8(encoded).unwrap();
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "{line}");
        }
        assert_eq!(decode_quoted_printable(encoded.as_bytes()).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_quoted_printable_escape_not_split() {
        let text = format!("{}é", "a".repeat(74));
        let encoded = String::from_utf8(encode_quoted_printable(text.as_bytes())).unwrap();
        assert_eq!(encoded, format!("{}=\r\n=C3=A9", "a".repeat(74)));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo").unwrap(), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert!(decode_quoted_printable(b"bad=Z1").is_err());
        assert!(decode_quoted_printable(b"cut=4").is_err());
    }

    #[test]
    fn test_header_value_ascii_untouched() {
        assert_eq!(encode_header_value("Weekly report"), "Weekly report");
        assert_eq!(encode_header_value("a = b?"), "a = b?");
    }

    #[test]
    fn test_header_value_q_encoding() {
        assert_eq!(encode_header_value("Héllo wörld"), "=?UTF-8?q?H=C3=A9llo_w=C3=B6rld?=");
    }

    #[test]
    fn test_header_value_long_splits_words() {
        let subject = "当你想要公开分享一个分支时，需要将其推送到有写入权限的远程仓库上";
        let encoded = encode_header_value(subject);
        for word in encoded.split("\r\n ") {
            assert!(word.len() <= MAX_ENCODED_WORD, "{word}");
            assert!(word.starts_with(ENCODED_WORD_PREFIX));
            assert!(word.ends_with(ENCODED_WORD_SUFFIX));
        }
        assert!(encoded.contains("\r\n "));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_phrase_encoding() {
        assert_eq!(encode_phrase("Jöhn D."), "=?UTF-8?q?J=C3=B6hn_D=2E?=");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(
            decode_rfc2047("Re: =?UTF-8?q?caf=C3=A9?= =?UTF-8?q?_au_lait?=").unwrap(),
            "Re: café au lait"
        );
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }

    proptest! {
        #[test]
        fn prop_base64_wrapped_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let out = wrapped(&data);
            for line in out.split_terminator("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            prop_assert_eq!(decode_base64_wrapped(&out).unwrap(), data);
        }

        #[test]
        fn prop_quoted_printable_round_trip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let encoded = encode_quoted_printable(&data);
            prop_assert!(encoded.is_ascii());
            for line in encoded.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), normalize_newlines(&data));
        }

        #[test]
        fn prop_header_value_round_trip(text in "\\PC{0,120}") {
            let encoded = encode_header_value(&text);
            prop_assert!(!needs_encoding(&encoded.replace("\r\n ", " ")));
            if needs_encoding(&text) {
                prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
            }
        }
    }
}
