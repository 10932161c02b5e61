//! SMTP commands and DATA encoding.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO, the fallback for servers that reject EHLO.
    Helo {
        /// Client hostname.
        hostname: String,
    },
    /// EHLO.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS.
    StartTls,
    /// AUTH with an optional initial response.
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// A bare base64 line answering a 334 challenge.
    AuthResponse(String),
    /// MAIL FROM.
    MailFrom {
        /// Envelope sender.
        from: Address,
        /// Message size announced with the SIZE extension.
        size: Option<usize>,
    },
    /// RCPT TO.
    RcptTo {
        /// Envelope recipient.
        to: Address,
    },
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// QUIT.
    Quit,
}

impl Command {
    /// Returns the command verb, safe to log.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "AUTH-RESPONSE",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to a CRLF-terminated line.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {} {response}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(response) => response.clone(),
            Self::MailFrom { from, size: None } => format!("MAIL FROM:<{from}>"),
            Self::MailFrom {
                from,
                size: Some(size),
            } => format!("MAIL FROM:<{from}> SIZE={size}"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Quit => "QUIT".to_string(),
        };

        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth { mechanism, .. } => write!(f, "AUTH {} <redacted>", mechanism.as_str()),
            Self::AuthResponse(_) => f.write_str("<redacted>"),
            _ => {
                let line = self.serialize();
                f.write_str(String::from_utf8_lossy(&line).trim_end())
            }
        }
    }
}

/// Encodes a message for the DATA phase.
///
/// Line endings are normalized to CRLF, lines starting with `.` get an
/// extra `.` (RFC 5321 section 4.5.2), and the `.` terminator line is
/// appended.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
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

    fn addr(value: &str) -> Address {
        Address::new(value).unwrap()
    }

    #[test]
    fn test_greetings() {
        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(ehlo.serialize(), b"EHLO client.example.com\r\n");
        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(helo.serialize(), b"HELO client.example.com\r\n");
    }

    #[test]
    fn test_auth() {
        let plain = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(plain.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");

        let login = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(login.serialize(), b"AUTH LOGIN\r\n");
        assert_eq!(
            Command::AuthResponse("dXNlcg==".to_string()).serialize(),
            b"dXNlcg==\r\n"
        );
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let plain = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert!(!format!("{plain:?}").contains("AHVz"));
        assert!(!format!("{:?}", Command::AuthResponse("c2VjcmV0".into())).contains("c2Vj"));
        assert_eq!(format!("{:?}", Command::Data), "DATA");
    }

    #[test]
    fn test_envelope_commands() {
        let mail = Command::MailFrom {
            from: addr("sender@example.com"),
            size: None,
        };
        assert_eq!(mail.serialize(), b"MAIL FROM:<sender@example.com>\r\n");

        let sized = Command::MailFrom {
            from: addr("sender@example.com"),
            size: Some(4096),
        };
        assert_eq!(sized.serialize(), b"MAIL FROM:<sender@example.com> SIZE=4096\r\n");

        let rcpt = Command::RcptTo {
            to: addr("rcpt@example.com"),
        };
        assert_eq!(rcpt.serialize(), b"RCPT TO:<rcpt@example.com>\r\n");
        assert_eq!(rcpt.verb(), "RCPT");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(
            dot_stuff(b"Subject: x\r\n\r\n.hidden\r\nok\r\n"),
            b"Subject: x\r\n\r\n..hidden\r\nok\r\n.\r\n"
        );
    }

    #[test]
    fn test_dot_stuff_normalizes_line_endings() {
        assert_eq!(dot_stuff(b"a\nb\r\n.\nc"), b"a\r\nb\r\n..\r\nc\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_empty() {
        assert_eq!(dot_stuff(b""), b".\r\n");
        assert_eq!(dot_stuff(b"\r\n"), b"\r\n.\r\n");
    }
}
