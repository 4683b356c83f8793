//! Login state and query execution for one server session.
//!
//! [`SessionContext`] owns everything a query needs: the transport, the login
//! guid, the session key and the selected project. It is shared through an
//! `Arc` by the [`Session`](crate::Session) and referenced weakly by every
//! remote object, so objects never keep a session alive.
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticating ──▶ Authenticated ──logout──▶ LoggedOut
//!        │                          │
//!        └──────────adopt───────────┴──────────▶ Authenticated
//! ```
//!
//! State is mutated in place. Selecting a project changes what subsequent
//! queries mean, so one session must not serve two flows that need different
//! projects at the same time.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use quick_xml::escape::escape;
use reddot_core::{Guid, ServerVersion, VersionRequirement, XmlDocument, XmlElement};
use reddot_rql::{Credentials, IoDataFormat, RqlError, Transport};

use crate::error::{redacted, Error, Result};
use crate::login::ServerLogin;

/// `RDError101`: the login reply is still usable (user already logged in)
const ALREADY_LOGGED_IN_CODE: u32 = 101;

const PROJECT_NO_LONGER_AVAILABLE: &str = "The project you have selected is no longer available";

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    LoggedOut,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    login_guid: Option<Guid>,
    session_key: Option<String>,
    /// Nil when no project is selected
    selected_project: Guid,
    server_version: Option<ServerVersion>,
    current_user: Option<Guid>,
    current_user_name: Option<String>,
}

/// Shared state of one logged in session.
pub struct SessionContext {
    login: ServerLogin,
    transport: Box<dyn Transport>,
    state: Mutex<SessionState>,
}

impl SessionContext {
    pub(crate) fn new(login: ServerLogin, transport: Box<dyn Transport>) -> Self {
        Self {
            login,
            transport,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn server_login(&self) -> &ServerLogin {
        &self.login
    }

    pub fn server_name(&self) -> &str {
        &self.login.name
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn login_guid(&self) -> Option<Guid> {
        self.lock().login_guid
    }

    /// The current session key; only available once a project was selected.
    pub fn session_key(&self) -> Result<String> {
        self.lock()
            .session_key
            .clone()
            .ok_or_else(|| Error::internal("No session key available"))
    }

    /// The selected project, nil if none
    pub fn selected_project_guid(&self) -> Guid {
        self.lock().selected_project
    }

    /// The server's version, probed once per session.
    pub fn server_version(&self) -> Result<ServerVersion> {
        if let Some(version) = self.lock().server_version {
            return Ok(version);
        }
        let version = self
            .transport
            .server_version()
            .map_err(|e| self.rql_error("", e))?;
        self.lock().server_version = Some(version);
        Ok(version)
    }

    /// Fail with [`Error::UnsupportedVersion`] unless the server satisfies `requirement`.
    pub fn ensure_version(&self, operation: &'static str, requirement: VersionRequirement) -> Result<()> {
        requirement.check(operation, &self.server_version()?)?;
        Ok(())
    }

    /// Guid of the logged in user, asking the server if it is not known yet.
    pub fn current_user_guid(&self) -> Result<Guid> {
        if let Some(user) = self.lock().current_user {
            return Ok(user);
        }
        let info = self.session_info()?;
        let user = info.required_guid("guid")?;
        let mut state = self.lock();
        state.current_user = Some(user);
        state.current_user_name = info.name_attribute().map(str::to_string);
        Ok(user)
    }

    pub(crate) fn current_user_name(&self) -> Option<String> {
        self.lock().current_user_name.clone()
    }

    fn rql_error(&self, query: &str, err: RqlError) -> Error {
        Error::from_rql(self.server_name(), query, err)
    }

    // ========================================================================
    // Query execution
    // ========================================================================

    /// Send `query` wrapped in `format` and return the raw reply.
    pub fn execute_rql(&self, query: &str, format: IoDataFormat) -> Result<String> {
        let (login_guid, session_key) = {
            let state = self.lock();
            (
                state.login_guid.map(|g| g.to_string()).unwrap_or_default(),
                state.session_key.clone().unwrap_or_default(),
            )
        };
        self.transport
            .execute(
                query,
                format,
                Credentials {
                    login_guid: &login_guid,
                    session_key: &session_key,
                },
            )
            .map_err(|e| self.rql_error(query, e))
    }

    /// Send `query` and parse the reply.
    ///
    /// An empty reply is an empty document. An `ERROR` element with text
    /// directly below the root is reported as [`Error::Protocol`].
    pub fn execute_query(&self, query: &str, format: IoDataFormat) -> Result<XmlDocument> {
        let reply = self.execute_rql(query, format)?;
        let document = self.parse_reply(query, &reply)?;
        self.check_inline_error(query, &document, &reply)?;
        Ok(document)
    }

    /// [`execute_query`](Self::execute_query) with the login guid envelope
    pub fn execute(&self, query: &str) -> Result<XmlDocument> {
        self.execute_query(query, IoDataFormat::LogonGuidOnly)
    }

    /// Select `project`, then run `query` with session key and login guid.
    pub fn execute_in_project(&self, project: Guid, query: &str) -> Result<XmlDocument> {
        self.select_project(project)?;
        self.execute_query(query, IoDataFormat::SessionKeyAndLogonGuid)
    }

    /// Select `project`, then run `query` inside a `PROJECT` element.
    pub fn execute_in_project_element(&self, project: Guid, query: &str) -> Result<XmlDocument> {
        self.select_project(project)?;
        self.execute_query(query, IoDataFormat::SessionKeyInProjectElement)
    }

    fn parse_reply(&self, query: &str, reply: &str) -> Result<XmlDocument> {
        XmlDocument::parse(reply).map_err(|e| {
            tracing::error!("Illegal response from server: '{}'", reply);
            Error::IllegalResponse {
                server: self.server_name().to_string(),
                message: e.to_string(),
                response: reply.to_string(),
                query: redacted(query),
            }
        })
    }

    fn check_inline_error(&self, query: &str, document: &XmlDocument, reply: &str) -> Result<()> {
        let Some(error) = document.root().and_then(|root| root.child("ERROR")) else {
            return Ok(());
        };
        let message = error.inner_text();
        let message = message.trim();
        if message.is_empty() {
            return Ok(());
        }
        Err(Error::Protocol {
            server: self.server_name().to_string(),
            code: reddot_rql::error::error_code(message),
            message: message.to_string(),
            response: reply.to_string(),
            query: redacted(query),
        })
    }

    // ========================================================================
    // Login / logout
    // ========================================================================

    pub(crate) fn login(&self) -> Result<()> {
        self.lock().phase = SessionPhase::Authenticating;
        let result = self.login_inner();
        if result.is_err() {
            self.lock().phase = SessionPhase::Unauthenticated;
        }
        result
    }

    fn login_inner(&self) -> Result<()> {
        let version = self.server_version()?;
        let user = &self.login.auth.username;
        tracing::info!(
            "Logging in to {} ({}, version {}) as {}",
            self.server_name(),
            self.login.address,
            version,
            user
        );

        let mut document = self.send_login(None)?;

        let old_login = document
            .elements_by_tag_name("LOGIN")
            .first()
            .and_then(|login| login.attribute("loginguid"))
            .filter(|guid| !guid.is_empty())
            .map(str::to_string);

        if let Some(old_login) = old_login {
            if !self.login.force_login {
                return Err(Error::AlreadyLoggedIn {
                    server: self.server_name().to_string(),
                    user: user.clone(),
                });
            }
            tracing::info!("User login will be forced. Old login guid was: {}", old_login);
            document = self.send_login(Some(&old_login))?;
        }

        let could_not_login = |message: &str| Error::CouldNotLogin {
            server: self.server_name().to_string(),
            message: message.to_string(),
        };

        let login = document
            .elements_by_tag_name("LOGIN")
            .first()
            .copied()
            .ok_or_else(|| could_not_login("no LOGIN element in reply"))?;

        let login_guid = login
            .guid()
            .ok()
            .flatten()
            .ok_or_else(|| could_not_login("reply carries no login guid"))?;

        let user_guid = match login.guid_attribute("userguid").ok().flatten() {
            Some(guid) => guid,
            None => {
                let users = document.elements_by_tag_name("USER");
                match users.as_slice() {
                    [user] => user
                        .guid()
                        .ok()
                        .flatten()
                        .ok_or_else(|| could_not_login("Invalid user data"))?,
                    _ => return Err(could_not_login("Invalid user data")),
                }
            }
        };

        {
            let mut state = self.lock();
            state.login_guid = Some(login_guid);
            state.current_user = Some(user_guid);
            state.phase = SessionPhase::Authenticated;
        }
        tracing::info!("Logged in to {} with login guid {}", self.server_name(), login_guid);

        self.load_selected_project(&document)
    }

    fn send_login(&self, old_login: Option<&str>) -> Result<XmlDocument> {
        let name = escape(self.login.auth.username.as_str());
        let password = escape(self.login.auth.password.as_str());
        let query = match old_login {
            None => format!(
                r#"<ADMINISTRATION action="login" name="{name}" password="{password}"></ADMINISTRATION>"#
            ),
            Some(old) => format!(
                r#"<ADMINISTRATION action="login" name="{name}" password="{password}" loginguid="{old}"/>"#
            ),
        };

        let reply = match self
            .transport
            .execute(&query, IoDataFormat::Plain, Credentials::default())
        {
            Ok(reply) => reply,
            Err(RqlError::Server { code, response, .. }) if code == Some(ALREADY_LOGGED_IN_CODE) => {
                response
            }
            Err(RqlError::Server { message, .. }) => {
                return Err(Error::CouldNotLogin {
                    server: self.server_name().to_string(),
                    message,
                })
            }
            Err(e) => return Err(self.rql_error(&query, e)),
        };
        self.parse_reply(&query, &reply)
    }

    /// Select the project the user worked in last, if the login reply names one.
    fn load_selected_project(&self, document: &XmlDocument) -> Result<()> {
        let project = document
            .root()
            .and_then(|root| root.path(&["USER", "LASTMODULES"]))
            .and_then(|modules| {
                modules
                    .children()
                    .find(|m| m.name() == "MODULE" && m.attribute("last") == Some("1"))
            })
            .and_then(|module| module.attribute("project"));

        let Some(project) = Guid::parse_optional(project)? else {
            return Ok(());
        };

        match self.select_project(project) {
            Ok(()) => Ok(()),
            Err(Error::ProjectSelection {
                source: Some(cause),
                ..
            }) if cause.to_string().contains(PROJECT_NO_LONGER_AVAILABLE) => {
                tracing::info!("Last used project {} is no longer available", project);
                self.lock().selected_project = Guid::nil();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Take over an existing login (e.g. from a plugin call).
    pub(crate) fn adopt(&self, login_guid: Guid, session_key: &str, project: Guid) -> Result<()> {
        self.server_version()?;
        {
            let mut state = self.lock();
            state.login_guid = Some(login_guid);
            state.session_key = Some(session_key.to_string());
            state.phase = SessionPhase::Authenticated;
        }

        let info = self.session_info()?;
        {
            let mut state = self.lock();
            state.selected_project = info.guid_attribute("projectguid")?.unwrap_or_default();
            state.current_user = info.guid()?;
            state.current_user_name = info.name_attribute().map(str::to_string);
        }
        tracing::info!(
            "Adopted session {} on {} (selected project {})",
            login_guid,
            self.server_name(),
            self.selected_project_guid()
        );

        self.select_project(project)
    }

    /// The `USER` element of the session info reply
    fn session_info(&self) -> Result<XmlElement> {
        let key = self.lock().session_key.clone().unwrap_or_default();
        let query = format!(r#"<PROJECT sessionkey="{key}"><USER action="sessioninfo"/></PROJECT>"#);
        let reply = self.execute_rql(&query, IoDataFormat::Plain)?;
        let document = self.parse_reply(&query, &reply)?;
        document
            .root()
            .and_then(|root| root.child("USER"))
            .cloned()
            .ok_or_else(|| Error::IllegalResponse {
                server: self.server_name().to_string(),
                message: "session info without USER element".into(),
                response: reply,
                query: redacted(&query),
            })
    }

    /// Close the login on the server.
    ///
    /// Failures are logged and otherwise ignored; the session is unusable
    /// afterwards either way.
    pub fn logout(&self) {
        let login_guid = {
            let state = self.lock();
            if state.phase != SessionPhase::Authenticated {
                return;
            }
            state.login_guid
        };

        if let Some(guid) = login_guid {
            let query = format!(r#"<ADMINISTRATION><LOGOUT guid="{guid}"/></ADMINISTRATION>"#);
            match self.execute_rql(&query, IoDataFormat::LogonGuidOnly) {
                Ok(_) => tracing::info!("Logged out of {}", self.server_name()),
                Err(e) => tracing::warn!("Logout from {} failed: {}", self.server_name(), e),
            }
        }

        let mut state = self.lock();
        state.phase = SessionPhase::LoggedOut;
        state.login_guid = None;
        state.session_key = None;
        state.selected_project = Guid::nil();
    }

    // ========================================================================
    // Project selection
    // ========================================================================

    /// Make `project` the context of subsequent project queries.
    ///
    /// Does nothing if it is already selected.
    pub fn select_project(&self, project: Guid) -> Result<()> {
        if self.selected_project_guid() == project {
            return Ok(());
        }

        let login_guid = self.lock().login_guid.unwrap_or_default();
        let query = format!(
            r#"<ADMINISTRATION action="validate" guid="{login_guid}" useragent="script"><PROJECT guid="{project}"/></ADMINISTRATION>"#
        );

        let (reply, mut cause) = match self.execute_rql(&query, IoDataFormat::LogonGuidOnly) {
            Ok(reply) => (reply, None),
            Err(e @ Error::Protocol { .. }) => {
                let response = e.response().unwrap_or_default().to_string();
                (response, Some(e))
            }
            Err(e) => return Err(e),
        };

        let document = match self.parse_reply(&query, &reply) {
            Ok(document) => document,
            Err(e) => {
                return Err(Error::ProjectSelection {
                    server: self.server_name().to_string(),
                    project,
                    source: Some(Box::new(cause.unwrap_or(e))),
                })
            }
        };
        let key = document
            .elements_by_tag_name("SERVER")
            .first()
            .and_then(|server| server.attribute("key"))
            .map(str::to_string);

        if let Some(key) = key {
            let mut state = self.lock();
            state.session_key = Some(key);
            state.selected_project = project;
            tracing::info!("Selected project {} on {}", project, self.server_name());
            return Ok(());
        }

        if cause.is_none() {
            cause = self.check_inline_error(&query, &document, &reply).err();
        }
        Err(Error::ProjectSelection {
            server: self.server_name().to_string(),
            project,
            source: cause.map(Box::new),
        })
    }

    /// Run `f` logged in to the server manager module, then reselect the
    /// previously selected project.
    pub fn with_server_manager<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let previous = self.selected_project_guid();
        let user = self.current_user_guid()?;
        self.execute(&format!(
            r#"<ADMINISTRATION><MODULE action="login" userguid="{user}" projectguid="{previous}" id="servermanager" /></ADMINISTRATION>"#
        ))?;
        self.lock().selected_project = Guid::nil();

        let result = f();

        if !previous.is_nil() {
            if let Err(e) = self.select_project(previous) {
                if result.is_ok() {
                    return Err(e);
                }
                tracing::warn!("Could not reselect project {} after server manager call: {}", previous, e);
            }
        }
        result
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionContext")
            .field("server", &self.login.name)
            .field("phase", &state.phase)
            .field("login_guid", &state.login_guid)
            .field("selected_project", &state.selected_project)
            .finish()
    }
}

/// Non-owning handle to a session, held by remote objects.
#[derive(Clone)]
pub struct SessionRef(Weak<SessionContext>);

impl SessionRef {
    pub fn new(context: &Arc<SessionContext>) -> Self {
        SessionRef(Arc::downgrade(context))
    }

    /// The session, unless it has been dropped
    pub fn upgrade(&self) -> Result<Arc<SessionContext>> {
        self.0
            .upgrade()
            .ok_or_else(|| Error::internal("session has been closed"))
    }
}

impl fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionRef")
    }
}
