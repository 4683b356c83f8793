//! Server versions and per-operation version requirements.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A four part server build version (`major.minor.build.revision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse `major.minor[.build[.revision]]`
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(text.to_string());

        let parts = text
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        if parts.len() < 2 || parts.len() > 4 {
            return Err(invalid());
        }

        let at = |i: usize| parts.get(i).copied().unwrap_or(0);
        Ok(Self::new(at(0), at(1), at(2), at(3)))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServerVersion::parse(s)
    }
}

/// Version bounds an operation declares for itself.
///
/// `at_least` is inclusive, `below` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionRequirement {
    pub at_least: Option<ServerVersion>,
    pub below: Option<ServerVersion>,
}

impl VersionRequirement {
    /// No constraint
    pub const ANY: VersionRequirement = VersionRequirement {
        at_least: None,
        below: None,
    };

    pub const fn at_least(version: ServerVersion) -> Self {
        Self {
            at_least: Some(version),
            below: None,
        }
    }

    pub const fn below(version: ServerVersion) -> Self {
        Self {
            at_least: None,
            below: Some(version),
        }
    }

    pub fn is_satisfied_by(&self, version: &ServerVersion) -> bool {
        self.at_least.map_or(true, |min| *version >= min)
            && self.below.map_or(true, |max| *version < max)
    }

    /// Check `version` against this requirement on behalf of `operation`.
    pub fn check(&self, operation: &'static str, version: &ServerVersion) -> Result<()> {
        if self.is_satisfied_by(version) {
            Ok(())
        } else {
            Err(Error::UnsupportedVersion {
                operation,
                actual: *version,
                requirement: *self,
            })
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.at_least, self.below) {
            (Some(min), Some(max)) => write!(f, ">= {min}, < {max}"),
            (Some(min), None) => write!(f, ">= {min}"),
            (None, Some(max)) => write!(f, "< {max}"),
            (None, None) => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_and_short() {
        assert_eq!(
            ServerVersion::parse("11.2.1.5124").unwrap(),
            ServerVersion::new(11, 2, 1, 5124)
        );
        assert_eq!(
            ServerVersion::parse("10.1").unwrap(),
            ServerVersion::new(10, 1, 0, 0)
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(ServerVersion::parse("11").is_err());
        assert!(ServerVersion::parse("11.x").is_err());
        assert!(ServerVersion::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ServerVersion::new(10, 9, 9, 9) < ServerVersion::new(11, 0, 0, 0));
        assert!(ServerVersion::new(11, 0, 1, 0) > ServerVersion::new(11, 0, 0, 900));
    }

    #[test]
    fn test_requirement_bounds() {
        let req = VersionRequirement {
            at_least: Some(ServerVersion::new(10, 0, 0, 0)),
            below: Some(ServerVersion::new(12, 0, 0, 0)),
        };
        assert!(req.is_satisfied_by(&ServerVersion::new(10, 0, 0, 0)));
        assert!(req.is_satisfied_by(&ServerVersion::new(11, 5, 0, 0)));
        assert!(!req.is_satisfied_by(&ServerVersion::new(12, 0, 0, 0)));
        assert!(!req.is_satisfied_by(&ServerVersion::new(9, 8, 0, 0)));
        assert!(VersionRequirement::ANY.is_satisfied_by(&ServerVersion::default()));
    }

    #[test]
    fn test_check_reports_operation() {
        let req = VersionRequirement::at_least(ServerVersion::new(11, 0, 0, 0));
        let err = req
            .check("dialog_locales", &ServerVersion::new(10, 1, 0, 0))
            .unwrap_err();
        match err {
            Error::UnsupportedVersion { operation, .. } => assert_eq!(operation, "dialog_locales"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
