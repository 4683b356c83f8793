//! The user facing session handle.

mod context;

pub use context::{SessionContext, SessionPhase, SessionRef};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quick_xml::escape::escape;
use reddot_core::{CachedList, Caching, Guid, IndexedCachedList, ServerVersion, XmlDocument};
use reddot_rql::{HttpTransport, IoDataFormat, Transport, TransportConfig};

use crate::error::{Error, Result};
use crate::login::ServerLogin;
use crate::objects::{
    ApplicationServer, AsyncProcess, DatabaseServer, DialogLocale, Group, Module, ModuleType,
    Project, SystemLocale, User,
};

/// Retry interval of [`Session::wait_for_async_process`]
pub const DEFAULT_ASYNC_RETRY: Duration = Duration::from_secs(1);

/// Poll interval while waiting for a process to show up in the queue
const ASYNC_APPEAR_POLL: Duration = Duration::from_millis(50);

/// A logged in session with one CMS server.
///
/// Remote collections are cached per session. Dropping the session logs out.
///
/// # Example
///
/// ```rust,no_run
/// use reddot::{PasswordAuthentication, ServerLogin, Session};
///
/// let login = ServerLogin::new(
///     "cms",
///     "http://cms.example.com/cms/",
///     PasswordAuthentication::new("admin", "secret"),
/// );
/// let session = Session::login(login)?;
/// for project in session.projects().get()?.iter() {
///     println!("{} {}", project.guid(), project.name()?);
/// }
/// # Ok::<(), reddot::Error>(())
/// ```
pub struct Session {
    context: Arc<SessionContext>,
    projects: IndexedCachedList<String, Project, Error>,
    projects_for_current_user: IndexedCachedList<String, Project, Error>,
    users: IndexedCachedList<String, User, Error>,
    groups: IndexedCachedList<String, Group, Error>,
    locales: IndexedCachedList<i64, SystemLocale, Error>,
    dialog_locales: IndexedCachedList<String, DialogLocale, Error>,
    modules: IndexedCachedList<ModuleType, Module, Error>,
    database_servers: IndexedCachedList<String, DatabaseServer, Error>,
    application_servers: CachedList<ApplicationServer, Error>,
    async_processes: CachedList<AsyncProcess, Error>,
}

impl Session {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Log in over HTTP with the default transport configuration.
    pub fn login(login: ServerLogin) -> Result<Self> {
        Self::login_with_config(login, TransportConfig::default())
    }

    pub fn login_with_config(login: ServerLogin, config: TransportConfig) -> Result<Self> {
        let transport = Self::http_transport(&login, config)?;
        Self::login_with_transport(login, Box::new(transport))
    }

    /// Log in through an arbitrary transport.
    pub fn login_with_transport(login: ServerLogin, transport: Box<dyn Transport>) -> Result<Self> {
        let session = Self::new(login, transport);
        session.context.login()?;
        Ok(session)
    }

    /// Take over an existing login instead of logging in, e.g. inside a
    /// plugin that was handed login guid and session key, and select `project`.
    pub fn adopt(
        login: ServerLogin,
        login_guid: Guid,
        session_key: &str,
        project: Guid,
    ) -> Result<Self> {
        let transport = Self::http_transport(&login, TransportConfig::default())?;
        Self::adopt_with_transport(login, Box::new(transport), login_guid, session_key, project)
    }

    pub fn adopt_with_transport(
        login: ServerLogin,
        transport: Box<dyn Transport>,
        login_guid: Guid,
        session_key: &str,
        project: Guid,
    ) -> Result<Self> {
        let session = Self::new(login, transport);
        session.context.adopt(login_guid, session_key, project)?;
        Ok(session)
    }

    fn http_transport(login: &ServerLogin, config: TransportConfig) -> Result<HttpTransport> {
        HttpTransport::new(login.name.clone(), &login.address, config)
            .map_err(|e| Error::from_rql(&login.name, "", e))
    }

    fn new(login: ServerLogin, transport: Box<dyn Transport>) -> Self {
        let context = Arc::new(SessionContext::new(login, transport));
        let session = SessionRef::new(&context);

        let name_of_project = |p: &Project| p.known_name();

        Self {
            projects: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || Project::list_all(&session)
                },
                name_of_project,
                Caching::Enabled,
            ),
            projects_for_current_user: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || {
                        let user = session.upgrade()?.current_user_guid()?;
                        Project::list_for_user(&session, user)
                    }
                },
                name_of_project,
                Caching::Enabled,
            ),
            users: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || User::list(&session)
                },
                User::known_name,
                Caching::Enabled,
            ),
            groups: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || Group::list(&session)
                },
                Group::known_name,
                Caching::Enabled,
            ),
            locales: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || SystemLocale::list(&session)
                },
                |locale: &SystemLocale| locale.lcid,
                Caching::Enabled,
            ),
            dialog_locales: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || DialogLocale::list(&session)
                },
                |locale: &DialogLocale| locale.abbreviation.clone(),
                Caching::Enabled,
            ),
            modules: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || Module::list(&session)
                },
                |module: &Module| module.module_type.clone(),
                Caching::Enabled,
            ),
            database_servers: IndexedCachedList::new(
                {
                    let session = session.clone();
                    move || DatabaseServer::list(&session)
                },
                DatabaseServer::known_name,
                Caching::Enabled,
            ),
            application_servers: CachedList::new(
                {
                    let session = session.clone();
                    move || ApplicationServer::list(&session)
                },
                Caching::Enabled,
            ),
            async_processes: CachedList::new(
                move || AsyncProcess::list(&session),
                Caching::Disabled,
            ),
            context,
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// The shared state objects of this session refer to
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn session_ref(&self) -> SessionRef {
        SessionRef::new(&self.context)
    }

    pub fn server_login(&self) -> &ServerLogin {
        self.context.server_login()
    }

    pub fn phase(&self) -> SessionPhase {
        self.context.phase()
    }

    pub fn login_guid(&self) -> Option<Guid> {
        self.context.login_guid()
    }

    pub fn session_key(&self) -> Result<String> {
        self.context.session_key()
    }

    pub fn selected_project_guid(&self) -> Guid {
        self.context.selected_project_guid()
    }

    pub fn server_version(&self) -> Result<ServerVersion> {
        self.context.server_version()
    }

    pub fn select_project(&self, project: Guid) -> Result<()> {
        self.context.select_project(project)
    }

    /// Log out now instead of on drop.
    pub fn logout(&self) {
        self.context.logout();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Send raw RQL and return the raw reply.
    pub fn execute_rql(&self, query: &str, format: IoDataFormat) -> Result<String> {
        self.context.execute_rql(query, format)
    }

    pub fn execute_query(&self, query: &str, format: IoDataFormat) -> Result<XmlDocument> {
        self.context.execute_query(query, format)
    }

    pub fn execute_in_project(&self, project: Guid, query: &str) -> Result<XmlDocument> {
        self.context.execute_in_project(project, query)
    }

    pub fn execute_in_project_element(&self, project: Guid, query: &str) -> Result<XmlDocument> {
        self.context.execute_in_project_element(project, query)
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// All projects, by name
    pub fn projects(&self) -> &IndexedCachedList<String, Project, Error> {
        &self.projects
    }

    /// Projects of the logged in user, by name
    pub fn projects_for_current_user(&self) -> &IndexedCachedList<String, Project, Error> {
        &self.projects_for_current_user
    }

    pub fn users(&self) -> &IndexedCachedList<String, User, Error> {
        &self.users
    }

    pub fn groups(&self) -> &IndexedCachedList<String, Group, Error> {
        &self.groups
    }

    /// System locales, by LCID
    pub fn locales(&self) -> &IndexedCachedList<i64, SystemLocale, Error> {
        &self.locales
    }

    /// User interface languages, by abbreviation; needs server version 10 or later
    pub fn dialog_locales(&self) -> &IndexedCachedList<String, DialogLocale, Error> {
        &self.dialog_locales
    }

    pub fn modules(&self) -> &IndexedCachedList<ModuleType, Module, Error> {
        &self.modules
    }

    pub fn database_servers(&self) -> &IndexedCachedList<String, DatabaseServer, Error> {
        &self.database_servers
    }

    pub fn application_servers(&self) -> &CachedList<ApplicationServer, Error> {
        &self.application_servers
    }

    /// The asynchronous process queue; never cached
    pub fn async_processes(&self) -> &CachedList<AsyncProcess, Error> {
        &self.async_processes
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get_project(&self, guid: Guid) -> Result<Project> {
        self.projects
            .try_get_by_guid(guid)?
            .ok_or_else(|| Error::NotFound(format!("no project with guid {guid}")))
    }

    pub fn projects_for_user(&self, user: Guid) -> Result<Vec<Project>> {
        Project::list_for_user(&self.session_ref(), user)
    }

    /// The user with `guid`; fails with [`Error::NotFound`] if there is none.
    pub fn get_user(&self, guid: Guid) -> Result<User> {
        let session = self.session_ref();
        let element = User::load_element(&session, guid)?;
        User::from_element(session, &element)
    }

    pub fn current_user(&self) -> Result<User> {
        let guid = self.context.current_user_guid()?;
        let name = self.context.current_user_name().unwrap_or_default();
        Ok(User::with_name(self.session_ref(), guid, &name))
    }

    /// The selected project, if any
    pub fn selected_project(&self) -> Result<Option<Project>> {
        let guid = self.selected_project_guid();
        if guid.is_nil() {
            return Ok(None);
        }
        let project = self
            .projects
            .try_get_by_guid(guid)?
            .unwrap_or_else(|| Project::new(self.session_ref(), guid));
        Ok(Some(project))
    }

    pub fn standard_locale(&self) -> Result<SystemLocale> {
        self.locales
            .find(|locale| locale.is_standard)?
            .ok_or_else(|| Error::NotFound("no standard locale".into()))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a user group and return it.
    pub fn create_group(&self, name: &str, email: &str) -> Result<Group> {
        self.context.execute(&format!(
            r#"<ADMINISTRATION><GROUP action="addnew" name="{}" email="{}"/></ADMINISTRATION>"#,
            escape(name),
            escape(email)
        ))?;
        tracing::info!("Created group {} on {}", name, self.context.server_name());
        self.groups.invalidate_cache();
        self.groups.get_by_key(&name.to_string())
    }

    pub fn delete_group(&self, guid: Guid) -> Result<()> {
        self.context.execute(&format!(
            r#"<ADMINISTRATION><GROUP action="delete" guid="{guid}"/></ADMINISTRATION>"#
        ))?;
        tracing::info!("Deleted group {} on {}", guid, self.context.server_name());
        self.groups.invalidate_cache();
        Ok(())
    }

    // ========================================================================
    // Asynchronous processes
    // ========================================================================

    /// Wait until a process matching `predicate` has appeared in the queue
    /// and finished (left the queue again), polling once per second.
    pub fn wait_for_async_process<P>(&self, max_wait: Duration, predicate: P) -> Result<()>
    where
        P: Fn(&AsyncProcess) -> bool,
    {
        self.wait_for_async_process_with_retry(max_wait, DEFAULT_ASYNC_RETRY, predicate)
    }

    /// Like [`wait_for_async_process`](Self::wait_for_async_process) with an
    /// explicit poll interval for the second phase.
    ///
    /// Both phases share `max_wait`.
    pub fn wait_for_async_process_with_retry<P>(
        &self,
        max_wait: Duration,
        retry: Duration,
        predicate: P,
    ) -> Result<()>
    where
        P: Fn(&AsyncProcess) -> bool,
    {
        let start = Instant::now();
        let present = |processes: &[AsyncProcess]| processes.iter().any(&predicate);

        self.async_processes
            .wait_for(present, max_wait, ASYNC_APPEAR_POLL)?;
        tracing::debug!("Async process appeared after {:?}", start.elapsed());

        let remaining = max_wait.saturating_sub(start.elapsed());
        self.async_processes
            .wait_for(|processes| !present(processes), remaining, retry)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.context.logout();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
