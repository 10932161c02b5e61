#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: compose a message with an attachment and send it over SMTP
//!
//! ## Running
//!
//! ```bash
//! MAILFORGE_SMTP_HOST=smtp.example.com \
//! MAILFORGE_SMTP_USER=alice@example.com \
//! MAILFORGE_SMTP_PASSWORD=app-password \
//! MAILFORGE_FROM="Alice <alice@example.com>" \
//! MAILFORGE_TO=bob@example.com \
//! cargo run --package mailforge --example send
//! ```
//!
//! `MAILFORGE_SMTP_PORT` overrides the port (587 by default; 465 switches to
//! implicit TLS). Set `RUST_LOG=mailforge_smtp=debug` to follow the session.

use std::env;

use anyhow::Context;
use mailforge::smtp::{Config, Security};
use mailforge::{Attachment, Mailer, Message};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailforge=info,mailforge_smtp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = env::var("MAILFORGE_SMTP_HOST").context("MAILFORGE_SMTP_HOST is not set")?;
    let from = env::var("MAILFORGE_FROM").context("MAILFORGE_FROM is not set")?;
    let to = env::var("MAILFORGE_TO").context("MAILFORGE_TO is not set")?;

    let mut builder = Config::builder(host);
    if let Ok(port) = env::var("MAILFORGE_SMTP_PORT") {
        let port: u16 = port.parse().context("MAILFORGE_SMTP_PORT is not a port")?;
        builder = builder.port(port);
        if port == Security::Implicit.default_port() {
            builder = builder.security(Security::Implicit);
        }
    }
    if let (Ok(user), Ok(password)) = (
        env::var("MAILFORGE_SMTP_USER"),
        env::var("MAILFORGE_SMTP_PASSWORD"),
    ) {
        builder = builder.credentials(user, password);
    }
    let mailer = Mailer::smtp(builder.build());

    let report = "date,status\n2024-03-01,ok\n";
    let message = Message::new()
        .from(from)
        .to(to)
        .subject("mailforge test message")
        .text("Hello from mailforge.\n\nThe daily report is attached.")
        .html("<p>Hello from <b>mailforge</b>.</p><p>The daily report is attached.</p>")
        .attachment(Attachment::new(
            "report.csv",
            Some("text/csv"),
            report.as_bytes().to_vec(),
        ));

    let envelope = mailer.send(&message).await?;
    println!(
        "Sent from {} to {} recipient(s)",
        envelope.sender,
        envelope.recipients.len()
    );
    Ok(())
}
