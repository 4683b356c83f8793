//! Guid type used to identify every remote object.
//!
//! The server writes guids as 32 uppercase hex digits without separators
//! (`"4E2C3A1F0B8D4D6A9E7F112233445566"`). The nil guid stands for "none",
//! e.g. no project selected.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Error, Result};

/// A remote object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(Uuid);

impl Guid {
    /// The nil guid
    pub const fn nil() -> Self {
        Guid(Uuid::nil())
    }

    /// Build a guid from its 128-bit value
    pub const fn from_u128(value: u128) -> Self {
        Guid(Uuid::from_u128(value))
    }

    /// Whether this is the nil guid
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse RQL (`simple`) or hyphenated text. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        Uuid::try_parse(trimmed)
            .map(Guid)
            .map_err(|_| Error::InvalidGuid(text.to_string()))
    }

    /// Parse optional attribute text; empty text maps to `None`.
    pub fn parse_optional(text: Option<&str>) -> Result<Option<Self>> {
        match text.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Self::parse(s).map(Some),
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.simple())
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Guid::parse(s)
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Guid(value)
    }
}

/// Anything identified by a guid
pub trait HasGuid {
    fn guid(&self) -> Guid;
}
