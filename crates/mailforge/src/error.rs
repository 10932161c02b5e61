//! Error type for composing and sending.

/// Result type alias for mailer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Mailer error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message could not be composed; nothing was sent.
    #[error("Compose error: {0}")]
    Compose(#[from] mailforge_mime::Error),

    /// The transport failed to deliver the composed message.
    #[error("Transport error: {0}")]
    Transport(#[from] mailforge_smtp::Error),
}

impl Error {
    /// Returns true if retrying the same send later might succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Compose(_) => false,
            Self::Transport(error) => error.is_transient(),
        }
    }
}
