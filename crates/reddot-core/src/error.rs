//! Error types for reddot-core

use std::time::Duration;

use thiserror::Error;

use crate::version::{ServerVersion, VersionRequirement};

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reddot-core
#[derive(Debug, Error)]
pub enum Error {
    /// Text could not be parsed as XML
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Invalid guid text
    #[error("Invalid guid: {0:?}")]
    InvalidGuid(String),

    /// Invalid version text
    #[error("Invalid server version: {0:?}")]
    InvalidVersion(String),

    /// An attribute held a value that does not convert to the requested type
    #[error("Invalid value {value:?} for attribute '{attribute}': expected {expected}")]
    InvalidAttribute {
        attribute: String,
        value: String,
        expected: &'static str,
    },

    /// A lookup by key or guid found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server version does not satisfy an operation's requirement
    #[error("Operation '{operation}' requires server version {requirement}, server is {actual}")]
    UnsupportedVersion {
        operation: &'static str,
        actual: ServerVersion,
        requirement: VersionRequirement,
    },

    /// A polling wait ran out of time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// An internal invariant was violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error with a message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a new not-found error with a message
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }
}
