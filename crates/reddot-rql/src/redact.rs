//! Credential redaction for logged payloads.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static PASSWORD_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(password\s*=\s*")[^"]*(")"#).unwrap());

/// Replace the value of every `password="..."` attribute with `*****`
pub fn redact(payload: &str) -> Cow<'_, str> {
    PASSWORD_ATTRIBUTE.replace_all(payload, "${1}*****${2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_password_is_hidden() {
        let query = r#"<ADMINISTRATION action="login" name="admin" password="s3cr&amp;t"></ADMINISTRATION>"#;
        assert_eq!(
            redact(query),
            r#"<ADMINISTRATION action="login" name="admin" password="*****"></ADMINISTRATION>"#
        );
    }

    #[test]
    fn test_other_payloads_untouched() {
        let query = r#"<PROJECT guid="0A0B"/>"#;
        assert!(matches!(redact(query), Cow::Borrowed(_)));
    }
}
