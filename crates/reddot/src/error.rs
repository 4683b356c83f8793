//! Errors surfaced by sessions and remote objects.

use std::time::Duration;

use reddot_core::{Guid, ServerVersion, VersionRequirement};
use reddot_rql::{redact::redact, RqlError};

/// Errors from a session or one of its objects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("[{server}] Connection failure: {message}")]
    ConnectionFailure {
        server: String,
        message: String,
        /// The query being sent, passwords masked
        query: String,
    },

    #[error("[{server}] User {user} is already logged in")]
    AlreadyLoggedIn { server: String, user: String },

    #[error("[{server}] Could not login: {message}")]
    CouldNotLogin { server: String, message: String },

    #[error("[{server}] Couldn't select project {project}")]
    ProjectSelection {
        server: String,
        project: Guid,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("[{server}] Server returned error: {message}")]
    Protocol {
        server: String,
        /// Numeric part of an `RDError<n>` code
        code: Option<u32>,
        message: String,
        response: String,
        query: String,
    },

    #[error("[{server}] Illegal response from server: {message}")]
    IllegalResponse {
        server: String,
        message: String,
        response: String,
        query: String,
    },

    #[error("Invalid value in server reply: {0}")]
    InvalidValue(#[source] reddot_core::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation '{operation}' requires server version {requirement}, server is {actual}")]
    UnsupportedVersion {
        operation: &'static str,
        actual: ServerVersion,
        requirement: VersionRequirement,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Map a transport error onto the taxonomy, tagging it with `server`
    /// and the `query` that failed.
    ///
    /// An undecodable SOAP envelope is a transport fault and becomes a
    /// connection failure; malformed RQL inside a decoded envelope is
    /// reported as [`Error::IllegalResponse`] by the session instead.
    pub fn from_rql(server: &str, query: &str, err: RqlError) -> Self {
        let server = server.to_string();
        let query = redacted(query);
        match err {
            RqlError::Connection { url, message } => Error::ConnectionFailure {
                server,
                message: format!("{url}: {message}"),
                query,
            },
            RqlError::Server {
                code,
                message,
                response,
                ..
            } => Error::Protocol {
                server,
                code,
                message,
                response,
                query,
            },
            RqlError::Soap(message) => Error::ConnectionFailure {
                server,
                message: format!("malformed response: {message}"),
                query,
            },
            RqlError::Http(e) => Error::ConnectionFailure {
                server,
                message: e.to_string(),
                query,
            },
            RqlError::Core(e) => Error::from(e),
        }
    }

    /// The query this error concerns, if it names one
    pub fn query(&self) -> Option<&str> {
        match self {
            Error::ConnectionFailure { query, .. }
            | Error::Protocol { query, .. }
            | Error::IllegalResponse { query, .. } => Some(query),
            _ => None,
        }
    }

    /// The raw reply that carried the error, if any
    pub fn response(&self) -> Option<&str> {
        match self {
            Error::Protocol { response, .. } | Error::IllegalResponse { response, .. } => {
                Some(response)
            }
            _ => None,
        }
    }

    /// The server this error concerns, if it names one
    pub fn server(&self) -> Option<&str> {
        match self {
            Error::ConnectionFailure { server, .. }
            | Error::AlreadyLoggedIn { server, .. }
            | Error::CouldNotLogin { server, .. }
            | Error::ProjectSelection { server, .. }
            | Error::Protocol { server, .. }
            | Error::IllegalResponse { server, .. } => Some(server),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<reddot_core::Error> for Error {
    fn from(err: reddot_core::Error) -> Self {
        use reddot_core::Error as Core;
        match err {
            Core::NotFound(msg) => Error::NotFound(msg),
            Core::Timeout(after) => Error::Timeout(after),
            Core::Internal(msg) => Error::Internal(msg),
            Core::UnsupportedVersion {
                operation,
                actual,
                requirement,
            } => Error::UnsupportedVersion {
                operation,
                actual,
                requirement,
            },
            other => Error::InvalidValue(other),
        }
    }
}

/// `query` with passwords masked, for error context
pub(crate) fn redacted(query: &str) -> String {
    redact(query).into_owned()
}

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
