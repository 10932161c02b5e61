//! Message-ID, Content-ID and multipart boundary generation.
//!
//! Identifiers have the shape `<timestamp.pid.random@context>`, where the
//! timestamp has nanosecond resolution and the random component is drawn
//! from the operating system's entropy source. Collisions within a process
//! are improbable, not impossible.

use crate::error::Result;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// Context used for Message-IDs when the hostname is unavailable.
const FALLBACK_HOSTNAME: &str = "localhost.localdomain";

/// Raw random bytes in a multipart boundary (hex encoded, so twice as many chars).
const BOUNDARY_BYTES: usize = 24;

/// Generates a new identifier scoped to `context`.
///
/// # Errors
///
/// Returns [`crate::Error::Entropy`] if the OS entropy source fails.
pub fn new_identifier(context: &str) -> Result<String> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let pid = std::process::id();
    let random = random_non_negative()?;
    Ok(format!("<{nanos}.{pid}.{random}@{context}>"))
}

/// Generates a Message-ID scoped to the local hostname.
///
/// # Errors
///
/// Returns [`crate::Error::Entropy`] if the OS entropy source fails.
pub fn message_id() -> Result<String> {
    new_identifier(&local_hostname())
}

/// Generates a Content-ID scoped to an attachment name.
///
/// Characters that cannot appear in a msg-id are replaced with `_`.
///
/// # Errors
///
/// Returns [`crate::Error::Entropy`] if the OS entropy source fails.
pub fn content_id(name: &str) -> Result<String> {
    let scoped: String = name
        .chars()
        .map(|c| if is_id_char(c) { c } else { '_' })
        .collect();
    if scoped.is_empty() {
        new_identifier("attachment")
    } else {
        new_identifier(&scoped)
    }
}

/// Generates a multipart boundary token.
///
/// # Errors
///
/// Returns [`crate::Error::Entropy`] if the OS entropy source fails.
pub fn boundary() -> Result<String> {
    let mut bytes = [0u8; BOUNDARY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    let mut token = String::with_capacity(BOUNDARY_BYTES * 2);
    for byte in bytes {
        let _ = write!(token, "{byte:02x}");
    }
    Ok(token)
}

fn random_non_negative() -> Result<u64> {
    let mut bytes = [0u8; 8];
    OsRng.try_fill_bytes(&mut bytes)?;
    // Drop the top bit so the value fits in a signed 64-bit range.
    Ok(u64::from_be_bytes(bytes) >> 1)
}

fn local_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|host| !host.is_empty() && host.chars().all(is_id_char))
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// RFC 5322 `atext` plus `.`.
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c)
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

    /// Splits `<a.b.c@ctx>` into its numeric fields and context.
    fn fields(id: &str) -> (Vec<&str>, &str) {
        let inner = id.strip_prefix('<').unwrap().strip_suffix('>').unwrap();
        let (numbers, context) = inner.split_once('@').unwrap();
        (numbers.split('.').collect(), context)
    }

    #[test]
    fn test_identifier_shape() {
        let id = new_identifier("example.com").unwrap();
        let (numbers, context) = fields(&id);
        assert_eq!(numbers.len(), 3);
        for number in numbers {
            assert!(!number.is_empty());
            assert!(number.bytes().all(|b| b.is_ascii_digit()), "{id}");
        }
        assert_eq!(context, "example.com");
    }

    #[test]
    fn test_identifier_pid() {
        let id = new_identifier("x").unwrap();
        let (numbers, _) = fields(&id);
        assert_eq!(numbers[1], std::process::id().to_string());
    }

    #[test]
    fn test_sequential_identifiers_differ() {
        let first = new_identifier("example.com").unwrap();
        let second = new_identifier("example.com").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_random_fits_signed_range() {
        for _ in 0..64 {
            let id = new_identifier("x").unwrap();
            let (numbers, _) = fields(&id);
            let random: u64 = numbers[2].parse().unwrap();
            assert!(random <= i64::MAX as u64);
        }
    }

    #[test]
    fn test_message_id_has_host() {
        let id = message_id().unwrap();
        let (_, context) = fields(&id);
        assert!(!context.is_empty());
    }

    #[test]
    fn test_content_id_scoped_to_name() {
        let id = content_id("logo.png").unwrap();
        assert!(id.ends_with("@logo.png>"));

        let id = content_id("my photo (1).jpg").unwrap();
        assert!(id.ends_with("@my_photo__1_.jpg>"));

        let id = content_id("").unwrap();
        assert!(id.ends_with("@attachment>"));
    }

    #[test]
    fn test_boundary() {
        let first = boundary().unwrap();
        let second = boundary().unwrap();
        assert_eq!(first.len(), BOUNDARY_BYTES * 2);
        assert!(first.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
