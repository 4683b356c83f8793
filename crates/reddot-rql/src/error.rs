//! Error types for the RQL protocol layer.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static ERROR_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"RDError(\d+)").unwrap());

/// Errors that can occur while talking RQL to a server.
#[derive(Debug, Error)]
pub enum RqlError {
    /// The server could not be reached or answered with something unusable
    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// The server reported an error for an otherwise delivered request
    #[error("Server error from {server}: {message}")]
    Server {
        server: String,
        /// Numeric part of an `RDError<n>` code, if the message carried one
        code: Option<u32>,
        message: String,
        /// Raw result text returned alongside the error
        response: String,
    },

    /// The SOAP layer could not be parsed
    #[error("Malformed SOAP response: {0}")]
    Soap(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] reddot_core::Error),
}

impl RqlError {
    /// A server error; the `RDError<n>` code is taken from `message`.
    pub fn server(server: impl Into<String>, message: impl Into<String>, response: impl Into<String>) -> Self {
        let message = message.into();
        RqlError::Server {
            server: server.into(),
            code: error_code(&message),
            message,
            response: response.into(),
        }
    }

    /// The `RDError` code, if this is a server error that carried one
    pub fn code(&self) -> Option<u32> {
        match self {
            RqlError::Server { code, .. } => *code,
            _ => None,
        }
    }
}

/// Extract `n` from the first `RDError<n>` in `message`
pub fn error_code(message: &str) -> Option<u32> {
    ERROR_CODE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub type Result<T> = std::result::Result<T, RqlError>;
