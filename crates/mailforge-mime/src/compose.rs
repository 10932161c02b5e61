//! Top-level header composition.

use crate::error::Result;
use crate::header::Headers;
use crate::id;
use crate::message::Message;
use chrono::{DateTime, FixedOffset};

/// Fields generated from the message model, in output order.
const GENERATED_FIELDS: &[&str] = &[
    "From",
    "Reply-To",
    "To",
    "Cc",
    "Subject",
    "Date",
    "Message-ID",
    "MIME-Version",
    "Disposition-Notification-To",
];

/// Builds the top-level header set of `message`.
///
/// Generated fields come first in a fixed order (`From`, `Reply-To`, `To`,
/// `Cc`, `Subject`, `Date`, `Message-ID`, `MIME-Version`,
/// `Disposition-Notification-To`); a caller-supplied header of the same
/// name replaces the generated value in place. Remaining caller headers
/// follow in insertion order. `Bcc` is only emitted if the caller put it in
/// the extra headers.
///
/// A Message-ID is generated only when the caller did not supply one.
///
/// # Errors
///
/// Returns [`crate::Error::Entropy`] if a Message-ID cannot be generated.
pub fn message_headers(message: &Message, date: DateTime<FixedOffset>) -> Result<Headers> {
    let extra = &message.headers;
    let mut headers = Headers::new();

    let mut put = |name: &str, generated: Option<String>| {
        let supplied = extra.get_all(name);
        if supplied.is_empty() {
            if let Some(value) = generated {
                headers.set(name, value);
            }
        } else {
            for value in supplied {
                headers.add(name, value);
            }
        }
    };

    put("From", non_empty(message.from.trim()));
    put("Reply-To", joined(&message.reply_to));
    put("To", joined(&message.to));
    put("Cc", joined(&message.cc));
    put("Subject", Some(message.subject.clone()));
    put("Date", Some(date.to_rfc2822()));
    let message_id = if extra.contains("Message-ID") {
        None
    } else {
        Some(id::message_id()?)
    };
    put("Message-ID", message_id);
    put("MIME-Version", Some("1.0".to_string()));
    put("Disposition-Notification-To", joined(&message.read_receipt));

    for (name, value) in extra.iter() {
        if !GENERATED_FIELDS.iter().any(|field| field.eq_ignore_ascii_case(name)) {
            headers.add(name, value);
        }
    }

    Ok(headers)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn joined(addresses: &[String]) -> Option<String> {
    let present: Vec<&str> = addresses
        .iter()
        .map(|address| address.trim())
        .filter(|address| !address.is_empty())
        .collect();
    (!present.is_empty()).then(|| present.join(", "))
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
    use chrono::TimeZone;

    fn date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .unwrap()
    }

    fn names(headers: &Headers) -> Vec<&str> {
        let mut names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        names.dedup();
        names
    }

    #[test]
    fn test_generated_fields() {
        let message = Message::new()
            .from("Alice <alice@example.com>")
            .to("bob@example.com")
            .to("carol@example.com")
            .cc("dave@example.com")
            .bcc("eve@example.com")
            .reply_to("replies@example.com")
            .subject("Hello");
        let headers = message_headers(&message, date()).unwrap();

        assert_eq!(
            names(&headers),
            vec![
                "From",
                "Reply-To",
                "To",
                "Cc",
                "Subject",
                "Date",
                "Message-ID",
                "MIME-Version"
            ]
        );
        assert_eq!(headers.get("To"), Some("bob@example.com, carol@example.com"));
        assert_eq!(headers.get("Date"), Some("Fri, 1 Mar 2024 09:30:00 +0200"));
        assert_eq!(headers.get("MIME-Version"), Some("1.0"));
        assert!(!headers.contains("Bcc"));
        assert!(headers.get("Message-ID").unwrap().starts_with('<'));
    }

    #[test]
    fn test_caller_headers_take_precedence() {
        let message = Message::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .subject("Generated")
            .header("subject", "Supplied")
            .header("Message-Id", "<fixed@example.com>")
            .header("X-Mailer", "mailforge");
        let headers = message_headers(&message, date()).unwrap();

        assert_eq!(headers.get_all("Subject"), vec!["Supplied"]);
        assert_eq!(headers.get("Message-ID"), Some("<fixed@example.com>"));
        assert_eq!(headers.get("X-Mailer"), Some("mailforge"));
        assert_eq!(names(&headers).last(), Some(&"X-Mailer"));
    }

    #[test]
    fn test_multi_valued_extra_header() {
        let message = Message::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .header("X-Tag", "one")
            .header("X-Tag", "two");
        let headers = message_headers(&message, date()).unwrap();
        assert_eq!(headers.get_all("X-Tag"), vec!["one", "two"]);
    }

    #[test]
    fn test_read_receipt() {
        let message = Message::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .read_receipt("alice@example.com");
        let headers = message_headers(&message, date()).unwrap();
        assert_eq!(
            headers.get("Disposition-Notification-To"),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_empty_lists_omitted() {
        let message = Message::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .cc("  ");
        let headers = message_headers(&message, date()).unwrap();
        assert!(!headers.contains("Cc"));
        assert!(!headers.contains("Reply-To"));
    }
}
