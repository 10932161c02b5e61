//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream, with_timeout};
use crate::command::{Command, dot_stuff};
use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;

/// Type-state marker: greeted, no transaction in progress.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: AUTH succeeded.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker: DATA accepted, waiting for the message.
#[derive(Debug)]
pub struct Data;

/// SMTP client whose state is tracked in the type.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// Every later reply must arrive within `io_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the session.
    pub async fn from_stream(mut stream: SmtpStream, io_timeout: Duration) -> Result<Self> {
        let greeting = with_timeout(io_timeout, stream.read_reply()).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::smtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        let hostname = greeting
            .message
            .first()
            .and_then(|text| text.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %hostname, "smtp greeting");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            io_timeout,
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// Falls back to HELO (with no extensions) if the server rejects EHLO
    /// with a permanent error.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.server_info.extensions = reply
                .message
                .iter()
                .skip(1)
                .map(String::as_str)
                .map(Extension::parse)
                .collect();
            return Ok(self);
        }
        if !reply.code.is_permanent() {
            return Err(reply_error(&reply));
        }

        tracing::debug!(code = reply.code.as_u16(), "EHLO rejected, falling back to HELO");
        let reply = self
            .send_command(Command::Helo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        expect_success(&reply)?;
        self.server_info.extensions.clear();
        Ok(self)
    }

    /// Upgrades the connection with STARTTLS and greets again.
    ///
    /// Extensions advertised before the upgrade are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised, refused, or the
    /// handshake fails.
    pub async fn starttls(mut self, server_hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(Command::StartTls).await?;
        expect_success(&reply)?;

        self.stream = with_timeout(
            self.io_timeout,
            self.stream.upgrade_to_tls(server_hostname),
        )
        .await?;
        tracing::debug!(server = server_hostname, "TLS established");

        self.server_info.extensions.clear();
        self.ehlo(client_hostname).await
    }

    /// Authenticates with the best mechanism both sides support: PLAIN,
    /// otherwise LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server offers neither
    /// mechanism, or [`Error::Authentication`] if it rejects the
    /// credentials.
    pub async fn authenticate(
        self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let Some(mechanisms) = self.server_info.auth_mechanisms() else {
            return Err(Error::NotSupported("AUTH".into()));
        };

        if mechanisms.contains(&AuthMechanism::Plain) {
            self.auth_plain(username, password).await
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password).await
        } else {
            Err(Error::NotSupported("AUTH PLAIN or LOGIN".into()))
        }
    }

    /// Authenticates using PLAIN with an initial response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the server rejects the
    /// credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let encoded = STANDARD.encode(format!("\0{username}\0{password}"));
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;
        expect_authenticated(&reply)?;

        Ok(self.into_state())
    }

    /// Authenticates using LOGIN: username and password each answer a 334
    /// challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if any step is refused.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;
        expect_challenge(&reply)?;

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(username)))
            .await?;
        expect_challenge(&reply)?;

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(password)))
            .await?;
        expect_authenticated(&reply)?;

        Ok(self.into_state())
    }

    /// Starts a mail transaction without authenticating.
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is refused.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.begin_mail(from, size).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is refused.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.begin_mail(from, size).await
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is refused.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        expect_success(&reply)?;
        Ok(self.into_state())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(self) -> Result<Client<Connected>> {
        self.abort().await
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is refused.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        expect_success(&reply)?;
        Ok(self)
    }

    /// Sends DATA.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply_error(&reply));
        }
        Ok(self.into_state())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(self) -> Result<Client<Connected>> {
        self.abort().await
    }
}

impl Client<Data> {
    /// Sends the message and completes the transaction.
    ///
    /// `message` is RFC 5322 text; line endings are normalized to CRLF,
    /// leading dots are doubled and the terminating `.` line is added.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let data = dot_stuff(message);
        tracing::debug!(bytes = data.len(), "sending message data");
        with_timeout(self.io_timeout, self.stream.write_all(&data)).await?;

        let reply = with_timeout(self.io_timeout, self.stream.read_reply()).await?;
        expect_success(&reply)?;
        Ok(self.into_state())
    }
}

impl<S> Client<S> {
    fn into_state<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }

    async fn begin_mail(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        let size = size.filter(|_| self.server_info.supports_size());
        let reply = self.send_command(Command::MailFrom { from, size }).await?;
        expect_success(&reply)?;
        Ok(self.into_state())
    }

    async fn abort(mut self) -> Result<Client<Connected>> {
        let reply = self.send_command(Command::Rset).await?;
        expect_success(&reply)?;
        Ok(self.into_state())
    }

    async fn send_command(&mut self, command: Command) -> Result<Reply> {
        tracing::debug!(command = command.verb(), "smtp command");
        let data = command.serialize();
        with_timeout(self.io_timeout, self.stream.write_all(&data)).await?;
        with_timeout(self.io_timeout, self.stream.read_reply()).await
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        expect_success(&reply)
    }
}

fn reply_error(reply: &Reply) -> Error {
    Error::smtp_error(reply.code.as_u16(), reply.message_text())
}

fn expect_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(reply_error(reply))
    }
}

fn expect_challenge(reply: &Reply) -> Result<()> {
    if reply.code == ReplyCode::AUTH_CONTINUE {
        Ok(())
    } else {
        Err(Error::Authentication(reply.to_string()))
    }
}

fn expect_authenticated(reply: &Reply) -> Result<()> {
    if reply.code == ReplyCode::AUTH_SUCCESS {
        Ok(())
    } else {
        Err(Error::Authentication(reply.to_string()))
    }
}
