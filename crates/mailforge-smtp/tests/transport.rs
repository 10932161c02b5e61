//! Integration tests for `SmtpTransport`.
//!
//! Each test runs a scripted SMTP server on a local `TcpListener` and
//! checks the commands the transport sends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mailforge_smtp::{Config, Error, Security, SmtpTransport};

/// Overrides the default reply for a command line.
type Responder = fn(&str) -> Option<&'static str>;

#[derive(Debug, Default)]
struct Session {
    commands: Vec<String>,
    data: String,
}

fn no_overrides(_: &str) -> Option<&'static str> {
    None
}

fn default_reply(command: &str, extensions: &[&str]) -> String {
    let verb = command
        .split([' ', ':'])
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match verb.as_str() {
        "EHLO" => {
            let mut lines = vec!["mx.test greets you"];
            lines.extend_from_slice(extensions);
            let last = lines.len() - 1;
            lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let separator = if i == last { ' ' } else { '-' };
                    format!("250{separator}{line}\r\n")
                })
                .collect()
        }
        "HELO" => "250 mx.test\r\n".to_string(),
        "AUTH" if command.eq_ignore_ascii_case("AUTH LOGIN") => "334 VXNlcm5hbWU6\r\n".to_string(),
        "AUTH" => "235 2.7.0 Authentication successful\r\n".to_string(),
        "MAIL" | "RCPT" | "RSET" => "250 2.1.0 OK\r\n".to_string(),
        "DATA" => "354 End data with <CR><LF>.<CR><LF>\r\n".to_string(),
        "QUIT" => "221 2.0.0 Bye\r\n".to_string(),
        // LOGIN exchange: username, then password.
        "DXNLCG==" => "334 UGFzc3dvcmQ6\r\n".to_string(),
        _ => "235 2.7.0 Authentication successful\r\n".to_string(),
    }
}

async fn spawn_server(
    extensions: &'static [&'static str],
    custom: Responder,
) -> (u16, JoinHandle<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        write.write_all(b"220 mx.test ESMTP ready\r\n").await.unwrap();

        let mut session = Session::default();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let command = line.trim_end().to_string();
            session.commands.push(command.clone());

            let reply =
                custom(&command).map_or_else(|| default_reply(&command, extensions), String::from);
            write.write_all(reply.as_bytes()).await.unwrap();

            if command == "DATA" && reply.starts_with("354") {
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await.unwrap() == 0 || line == ".\r\n" {
                        break;
                    }
                    session.data.push_str(&line);
                }
                write.write_all(b"250 2.0.0 Queued\r\n").await.unwrap();
            }
            if command == "QUIT" {
                break;
            }
        }
        session
    });

    (port, handle)
}

fn config(port: u16) -> mailforge_smtp::ConfigBuilder {
    Config::builder("127.0.0.1")
        .security(Security::None)
        .port(port)
        .client_hostname("client.test")
        .io_timeout(Duration::from_secs(5))
}

fn recipients(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(ToString::to_string).collect()
}

const MESSAGE: &[u8] = b"Subject: Hi\r\n\r\nline one\r\n.leading dot\r\n";

#[tokio::test]
async fn test_send_without_auth() {
    let (port, server) = spawn_server(&["SIZE 10000", "8BITMIME"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).build());

    transport
        .send(
            "alice@example.com",
            &recipients(&["bob@example.com", "carol@example.com"]),
            MESSAGE,
        )
        .await
        .unwrap();

    let session = server.await.unwrap();
    assert_eq!(
        session.commands,
        vec![
            "EHLO client.test".to_string(),
            format!("MAIL FROM:<alice@example.com> SIZE={}", MESSAGE.len()),
            "RCPT TO:<bob@example.com>".to_string(),
            "RCPT TO:<carol@example.com>".to_string(),
            "DATA".to_string(),
            "QUIT".to_string(),
        ]
    );
    assert_eq!(
        session.data,
        "Subject: Hi\r\n\r\nline one\r\n..leading dot\r\n"
    );
}

#[tokio::test]
async fn test_no_size_parameter_without_extension() {
    let (port, server) = spawn_server(&[], no_overrides).await;
    let transport = SmtpTransport::new(config(port).build());

    transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await
        .unwrap();

    let session = server.await.unwrap();
    assert_eq!(session.commands[1], "MAIL FROM:<alice@example.com>");
}

#[tokio::test]
async fn test_auth_plain() {
    let (port, server) = spawn_server(&["AUTH LOGIN PLAIN"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).credentials("user", "secret").build());

    transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await
        .unwrap();

    let session = server.await.unwrap();
    assert_eq!(session.commands[1], "AUTH PLAIN AHVzZXIAc2VjcmV0");
    assert!(session.commands[2].starts_with("MAIL FROM:"));
}

#[tokio::test]
async fn test_auth_login_fallback() {
    let (port, server) = spawn_server(&["AUTH LOGIN"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).credentials("user", "secret").build());

    transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await
        .unwrap();

    let session = server.await.unwrap();
    assert_eq!(
        &session.commands[1..4],
        &["AUTH LOGIN", "dXNlcg==", "c2VjcmV0"]
    );
}

#[tokio::test]
async fn test_auth_rejected() {
    fn reject_auth(command: &str) -> Option<&'static str> {
        command
            .starts_with("AUTH")
            .then_some("535 5.7.8 Authentication credentials invalid\r\n")
    }

    let (port, server) = spawn_server(&["AUTH PLAIN"], reject_auth).await;
    let transport = SmtpTransport::new(config(port).credentials("user", "wrong").build());

    let result = transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(result, Err(Error::Authentication(_))));

    let session = server.await.unwrap();
    assert!(!session.commands.iter().any(|c| c.starts_with("MAIL")));
}

#[tokio::test]
async fn test_auth_not_offered() {
    let (port, server) = spawn_server(&["SIZE 1000"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).credentials("user", "secret").build());

    let result = transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(result, Err(Error::NotSupported(_))));
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_recipient_rejected() {
    fn reject_rcpt(command: &str) -> Option<&'static str> {
        command
            .contains("nobody@")
            .then_some("550 5.1.1 No such user\r\n")
    }

    let (port, server) = spawn_server(&[], reject_rcpt).await;
    let transport = SmtpTransport::new(config(port).build());

    let error = transport
        .send(
            "alice@example.com",
            &recipients(&["bob@example.com", "nobody@example.com"]),
            MESSAGE,
        )
        .await
        .unwrap_err();
    assert!(error.is_permanent());
    assert!(matches!(error, Error::SmtpError { code: 550, .. }));

    let session = server.await.unwrap();
    assert!(!session.commands.iter().any(|c| c == "DATA"));
}

#[tokio::test]
async fn test_message_too_large() {
    let (port, server) = spawn_server(&["SIZE 10"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).build());

    let result = transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(
        result,
        Err(Error::MessageTooLarge { limit: 10, .. })
    ));

    let session = server.await.unwrap();
    assert_eq!(session.commands, vec!["EHLO client.test", "QUIT"]);
}

#[tokio::test]
async fn test_helo_fallback() {
    fn reject_ehlo(command: &str) -> Option<&'static str> {
        command
            .starts_with("EHLO")
            .then_some("502 5.5.1 Command not implemented\r\n")
    }

    let (port, server) = spawn_server(&[], reject_ehlo).await;
    let transport = SmtpTransport::new(config(port).build());

    transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await
        .unwrap();

    let session = server.await.unwrap();
    assert_eq!(session.commands[0], "EHLO client.test");
    assert_eq!(session.commands[1], "HELO client.test");
    assert_eq!(session.commands[2], "MAIL FROM:<alice@example.com>");
}

#[tokio::test]
async fn test_starttls_required_but_not_offered() {
    let (port, server) = spawn_server(&["SIZE 1000"], no_overrides).await;
    let transport = SmtpTransport::new(config(port).security(Security::StartTls).build());

    let result = transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(result, Err(Error::NotSupported(_))));
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_greeting_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(socket);
    });

    let transport = SmtpTransport::new(
        config(port)
            .io_timeout(Duration::from_millis(100))
            .build(),
    );
    let result = transport
        .send("alice@example.com", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(result, Err(Error::Timeout(_))));
    server.abort();
}

#[tokio::test]
async fn test_rejects_bad_envelope_before_connecting() {
    // Nothing listens on this port; errors must come before any connect.
    let transport = SmtpTransport::new(config(1).build());

    let result = transport.send("alice@example.com", &[], MESSAGE).await;
    assert!(matches!(result, Err(Error::NoRecipients)));

    let result = transport
        .send("not an address", &recipients(&["bob@example.com"]), MESSAGE)
        .await;
    assert!(matches!(result, Err(Error::InvalidAddress(_))));
}
