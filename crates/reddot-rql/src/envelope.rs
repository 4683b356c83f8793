//! IODATA envelopes.
//!
//! Every RQL query travels inside an `IODATA` element. Which credentials the
//! element carries, and where, depends on the query:
//!
//! | format                       | envelope                                                                    |
//! |------------------------------|-----------------------------------------------------------------------------|
//! | `LogonGuidOnly`              | `<IODATA loginguid="G">Q</IODATA>`                                          |
//! | `SessionKeyAndLogonGuid`     | `<IODATA sessionkey="K" loginguid="G">Q</IODATA>`                           |
//! | `SessionKeyInProjectElement` | `<IODATA loginguid="G"><PROJECT sessionkey="K">Q</PROJECT></IODATA>`        |
//! | `Plain`                      | `<IODATA>Q</IODATA>`                                                        |
//! | `FormattedText`              | `<IODATA loginguid="G" sessionkey="K" format="1">Q</IODATA>`                |
//! | `SessionKeyOnly`             | `<IODATA sessionkey="K" loginguid="">Q</IODATA>`                            |

use std::fmt;
use std::str::FromStr;

/// Placeholder that queries may contain before a session key is known
pub const SESSION_KEY_PLACEHOLDER: &str = "#__SESSION_KEY__#";

/// Shape of the `IODATA` envelope around a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoDataFormat {
    LogonGuidOnly,
    SessionKeyAndLogonGuid,
    SessionKeyInProjectElement,
    Plain,
    FormattedText,
    SessionKeyOnly,
}

impl IoDataFormat {
    pub const ALL: [IoDataFormat; 6] = [
        IoDataFormat::LogonGuidOnly,
        IoDataFormat::SessionKeyAndLogonGuid,
        IoDataFormat::SessionKeyInProjectElement,
        IoDataFormat::Plain,
        IoDataFormat::FormattedText,
        IoDataFormat::SessionKeyOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IoDataFormat::LogonGuidOnly => "logon-guid-only",
            IoDataFormat::SessionKeyAndLogonGuid => "session-key-and-logon-guid",
            IoDataFormat::SessionKeyInProjectElement => "session-key-in-project-element",
            IoDataFormat::Plain => "plain",
            IoDataFormat::FormattedText => "formatted-text",
            IoDataFormat::SessionKeyOnly => "session-key-only",
        }
    }
}

impl fmt::Display for IoDataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IoDataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IoDataFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown IODATA format '{s}'"))
    }
}

/// Credentials placed into an envelope. Missing values are written as empty strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub login_guid: &'a str,
    pub session_key: &'a str,
}

/// Replace the session-key placeholder in `query` with `#` + the key
pub fn substitute_session_key(query: &str, session_key: &str) -> String {
    query.replace(SESSION_KEY_PLACEHOLDER, &format!("#{session_key}"))
}

/// Wrap `query` into the envelope `format`, substituting the placeholder first.
pub fn wrap(query: &str, format: IoDataFormat, credentials: Credentials<'_>) -> String {
    let Credentials {
        login_guid: g,
        session_key: k,
    } = credentials;
    let q = substitute_session_key(query, k);

    match format {
        IoDataFormat::LogonGuidOnly => format!(r#"<IODATA loginguid="{g}">{q}</IODATA>"#),
        IoDataFormat::SessionKeyAndLogonGuid => {
            format!(r#"<IODATA sessionkey="{k}" loginguid="{g}">{q}</IODATA>"#)
        }
        IoDataFormat::SessionKeyInProjectElement => {
            format!(r#"<IODATA loginguid="{g}"><PROJECT sessionkey="{k}">{q}</PROJECT></IODATA>"#)
        }
        IoDataFormat::Plain => format!("<IODATA>{q}</IODATA>"),
        IoDataFormat::FormattedText => {
            format!(r#"<IODATA loginguid="{g}" sessionkey="{k}" format="1">{q}</IODATA>"#)
        }
        IoDataFormat::SessionKeyOnly => {
            format!(r#"<IODATA sessionkey="{k}" loginguid="">{q}</IODATA>"#)
        }
    }
}
