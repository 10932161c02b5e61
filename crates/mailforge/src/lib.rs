//! # mailforge
//!
//! Compose RFC 5322 / MIME messages and deliver them over SMTP.
//!
//! [`Mailer`] ties the two halves together: [`mailforge_mime`] builds the
//! message bytes and envelope, and a [`Transport`] (by default
//! [`mailforge_smtp::SmtpTransport`]) delivers them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailforge::{Mailer, Message};
//! use mailforge::smtp::{Config, Security};
//!
//! #[tokio::main]
//! async fn main() -> mailforge::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("alice@example.com", "app-password")
//!         .build();
//!     let mailer = Mailer::smtp(config);
//!
//!     let message = Message::new()
//!         .from("Alice <alice@example.com>")
//!         .to("bob@example.com")
//!         .subject("Hello")
//!         .text("Hi Bob")
//!         .html("<p>Hi Bob</p>");
//!
//!     mailer.send(&message).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod mailer;
mod transport;

pub use error::{Error, Result};
pub use mailer::Mailer;
pub use transport::{Transport, TransportError};

pub use mailforge_mime::{Attachment, Envelope, Message};

/// Re-export of the MIME composition crate.
pub use mailforge_mime as mime;
/// Re-export of the SMTP client crate.
pub use mailforge_smtp as smtp;
