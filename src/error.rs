//! Error types for mailscout

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Message parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl Error {
    /// HTTP-style status code for the caller-facing layer.
    ///
    /// Transport, configuration, and store failures all surface as
    /// server faults; the remaining variants carry their usual codes.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Imap(_)
            | Self::Parse(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Tls(_)
            | Self::Store(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
