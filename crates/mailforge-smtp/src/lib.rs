//! # mailforge-smtp
//!
//! Async SMTP submission client (RFC 5321).
//!
//! ## Features
//!
//! - **One-shot delivery**: [`SmtpTransport`] runs a complete session per message
//! - **Type-state client**: compile-time ordering of EHLO, AUTH, MAIL, RCPT, DATA
//! - **TLS**: implicit TLS (port 465) and STARTTLS (port 587) via rustls
//! - **Authentication**: PLAIN, falling back to LOGIN
//! - **Extensions**: SIZE limits are checked before any data is sent
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailforge_smtp::{Config, Security, SmtpTransport};
//!
//! #[tokio::main]
//! async fn main() -> mailforge_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("user@example.com", "password")
//!         .build();
//!
//!     let transport = SmtpTransport::new(config);
//!     let message = b"From: user@example.com\r\nSubject: Test\r\n\r\nHello\r\n";
//!     transport
//!         .send("user@example.com", &["friend@example.com".to_string()], message)
//!         .await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ─── authenticate() ───→ Authenticated
//!     │                                  │
//!     └──────────── mail_from() ─────────┘
//!                       │
//!                       ▼
//!     MailTransaction ─ rcpt_to() ─→ RecipientAdded ─ data() ─→ Data
//!                                                                 │
//!     Connected ←──────────────── send_message() ─────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
mod transport;
pub mod types;

pub use command::dot_stuff;
pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpConnection,
};
pub use error::{Error, Result};
pub use transport::SmtpTransport;
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
