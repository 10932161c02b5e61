//! # mailforge-mime
//!
//! RFC 5322 / MIME composition for outgoing email.
//!
//! ## Features
//!
//! - **Message model**: addresses, subject, text and HTML bodies, extra headers
//! - **Attachments**: standalone and inline (`cid:`) parts from readers or files
//! - **Multipart planning**: mixed, alternative and related nesting
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Envelope**: bare sender and recipient addresses for SMTP
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailforge_mime::{Attachment, Message};
//!
//! let message = Message::new()
//!     .from("Alice <alice@example.com>")
//!     .to("bob@example.com")
//!     .subject("Quarterly report")
//!     .text("See attached.")
//!     .html("<p>See attached. <img src=\"cid:logo\"></p>")
//!     .attachment(Attachment::from_file("report.pdf")?)
//!     .attachment(
//!         Attachment::new("logo.png", None, logo_bytes)
//!             .inline()
//!             .with_content_id("logo"),
//!     );
//!
//! let envelope = message.envelope()?;
//! let bytes = message.to_bytes()?;
//! ```
//!
//! The structure is decided once by [`Plan::build`] and written by a single
//! recursive walk; see the [`plan`] module for the decision table.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod attachment;
mod compose;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;
pub mod id;
pub mod plan;

pub use address::{Mailbox, format_list};
pub use attachment::Attachment;
pub use compose::message_headers;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Headers, canonical_name};
pub use message::{Envelope, Message};
pub use plan::{BodyKind, MultipartKind, Plan};
