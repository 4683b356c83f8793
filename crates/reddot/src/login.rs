//! Login configuration.

use std::fmt;

/// User name and password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordAuthentication {
    pub username: String,
    pub password: String,
}

impl PasswordAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuthentication")
            .field("username", &self.username)
            .field("password", &"*****")
            .finish()
    }
}

/// Where and as whom to log in. Immutable for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLogin {
    /// Display name of the server, used in errors and logs
    pub name: String,
    /// Base URL, e.g. `http://cms.example.com/cms/`
    pub address: String,
    pub auth: PasswordAuthentication,
    /// Evict an existing login of the same user instead of failing
    pub force_login: bool,
}

impl ServerLogin {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        auth: PasswordAuthentication,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            auth,
            force_login: true,
        }
    }

    pub fn with_force_login(mut self, force_login: bool) -> Self {
        self.force_login = force_login;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_login_defaults_to_true() {
        let login = ServerLogin::new("cms", "http://cms/", PasswordAuthentication::new("u", "p"));
        assert!(login.force_login);
        assert!(!login.with_force_login(false).force_login);
    }

    #[test]
    fn test_debug_hides_password() {
        let auth = PasswordAuthentication::new("admin", "geheim");
        let debug = format!("{auth:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("geheim"));
    }
}
