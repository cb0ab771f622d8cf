//! Error handling for the QueryPrep access client

use std::fmt;
use thiserror::Error;

/// Unified error type for the QueryPrep access client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The platform rejected the credentials or the session token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The platform returned a non-success status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// An operation that needs a session was called without one
    #[error("Missing session")]
    MissingSession,

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new API error
    pub fn api<T: fmt::Display>(status: u16, msg: T) -> Self {
        Error::Api {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether this error is the platform's authentication-invalid signal.
    ///
    /// Callers use this to decide when a cached session must be cleared.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
