//! Server version probe.
//!
//! `ioVersionInfo.asp` returns a small HTML page containing the build number,
//! e.g. `Management Server 11.2&nbsp;Build&nbsp;11.2.1.5124`.

use once_cell::sync::Lazy;
use regex::Regex;
use reddot_core::ServerVersion;

/// Path of the version page relative to the base URL
pub const VERSION_INFO_PATH: &str = "ioVersionInfo.asp";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Management Server.*&nbsp;|CMS Version )\d+(\.\d+)*&nbsp;Build&nbsp;(\d+\.\d+\.\d+\.\d+)")
        .unwrap()
});

/// Extract the build version from the version page
pub fn parse_version_info(html: &str) -> Option<ServerVersion> {
    let caps = VERSION_PATTERN.captures(html)?;
    ServerVersion::parse(caps.get(3)?.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_server_page() {
        let html = "<html><body>Management Server 11.2&nbsp;Build&nbsp;11.2.1.5124</body></html>";
        assert_eq!(
            parse_version_info(html),
            Some(ServerVersion::new(11, 2, 1, 5124))
        );
    }

    #[test]
    fn test_cms_version_page() {
        let html = "<b>CMS Version 10.1&nbsp;Build&nbsp;10.1.3.104</b>";
        assert_eq!(
            parse_version_info(html),
            Some(ServerVersion::new(10, 1, 3, 104))
        );
    }

    #[test]
    fn test_unrelated_page() {
        assert_eq!(parse_version_info("<html>404 Not Found</html>"), None);
    }
}
