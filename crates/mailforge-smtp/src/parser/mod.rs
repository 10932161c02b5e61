//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Upper bound on lines in one reply, so a misbehaving server cannot grow it
/// without limit.
const MAX_REPLY_LINES: usize = 512;

/// Parses an SMTP reply from its lines (line endings already removed).
///
/// Replies are single-line (`250 OK`) or multi-line
/// (`250-first`, `250-second`, `250 last`); every line must carry the same
/// code.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("empty reply".into()));
    };

    let code = reply_code(first)?;
    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if reply_code(line)? != code {
            return Err(Error::Protocol(format!(
                "reply code changed within reply: {line}"
            )));
        }
        match line.len() {
            3 => message.push(String::new()),
            _ if matches!(line.as_bytes()[3], b' ' | b'-') => {
                message.push(line[4..].to_string());
            }
            _ => return Err(Error::Protocol(format!("malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(code, message))
}

fn reply_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("invalid reply code: {line}")))?;
    digits
        .parse::<u16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::Protocol(format!("invalid reply code: {line}")))
}

/// Checks if a line ends a reply.
///
/// Continuation lines have `-` after the code; the last line has a space or
/// nothing at all.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
}

/// Reads one complete reply from `reader`.
///
/// Blank lines between replies are skipped.
///
/// # Errors
///
/// Returns [`Error::Io`] if reading fails, or [`Error::Protocol`] if the
/// connection closes mid-reply or the reply is malformed.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        if reader.read_line(&mut raw).await? == 0 {
            return Err(Error::Protocol("connection closed by server".into()));
        }

        let line = raw.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(line);
        lines.push(line.to_string());
        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol("reply has too many lines".into()));
        }
    }

    let reply = parse_reply(&lines)?;
    tracing::trace!(code = reply.code.as_u16(), text = %reply.message_text(), "smtp reply");
    Ok(reply)
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
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line() {
        let reply = parse_reply(&lines(&["220 mx.example.com ESMTP"])).unwrap();
        assert_eq!(reply.code, ReplyCode::SERVICE_READY);
        assert_eq!(reply.message, vec!["mx.example.com ESMTP"]);
    }

    #[test]
    fn test_parse_multi_line() {
        let reply = parse_reply(&lines(&[
            "250-mx.example.com greets you",
            "250-SIZE 1000000",
            "250 STARTTLS",
        ]))
        .unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(
            reply.message,
            vec!["mx.example.com greets you", "SIZE 1000000", "STARTTLS"]
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&lines(&["250"])).unwrap();
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
        assert!(parse_reply(&lines(&["250-one", "251 two"])).is_err());
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-more"));
    }

    #[tokio::test]
    async fn test_read_reply_multi_line() {
        let mock = Builder::new()
            .read(b"250-mx.example.com\r\n250-")
            .read(b"PIPELINING\r\n250 SIZE 10\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.message, vec!["mx.example.com", "PIPELINING", "SIZE 10"]);
    }

    #[tokio::test]
    async fn test_read_reply_sequence() {
        let mock = Builder::new()
            .read(b"220 ready\r\n\r\n250 OK\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_reply(&mut reader).await.unwrap().code.as_u16(), 220);
        assert_eq!(read_reply(&mut reader).await.unwrap().code.as_u16(), 250);
    }

    #[tokio::test]
    async fn test_read_reply_eof() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut reader = BufReader::new(mock);

        let result = read_reply(&mut reader).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
