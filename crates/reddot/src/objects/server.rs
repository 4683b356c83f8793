//! Server management objects: modules, database and application servers,
//! and the asynchronous process queue.

use std::fmt;

use reddot_core::{EntityCore, Guid, HasGuid, Materialize, PartialObject, XmlElement};
use reddot_rql::IoDataFormat;

use crate::error::{Error, Result};
use crate::session::SessionRef;

// ============================================================================
// Modules
// ============================================================================

/// A licensable server module, identified by its `id` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleType {
    Cms,
    ServerManager,
    SmartEdit,
    SmartTree,
    Tasks,
    Asset,
    /// An id this client does not know; kept verbatim
    Other(String),
}

impl ModuleType {
    pub fn from_id(id: &str) -> Self {
        match id.to_ascii_lowercase().as_str() {
            "cms" => ModuleType::Cms,
            "servermanager" => ModuleType::ServerManager,
            "smartedit" => ModuleType::SmartEdit,
            "smarttree" => ModuleType::SmartTree,
            "tasks" => ModuleType::Tasks,
            "asset" => ModuleType::Asset,
            _ => ModuleType::Other(id.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ModuleType::Cms => "cms",
            ModuleType::ServerManager => "servermanager",
            ModuleType::SmartEdit => "smartedit",
            ModuleType::SmartTree => "smarttree",
            ModuleType::Tasks => "tasks",
            ModuleType::Asset => "asset",
            ModuleType::Other(id) => id,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub guid: Guid,
    pub name: String,
    pub module_type: ModuleType,
}

impl Module {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            guid: element.required_guid("guid")?,
            name: element.name_attribute().unwrap_or_default().to_string(),
            module_type: ModuleType::from_id(element.attribute("id").unwrap_or_default()),
        })
    }

    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session
            .upgrade()?
            .execute(r#"<ADMINISTRATION><MODULES action="list" /></ADMINISTRATION>"#)?;
        document
            .elements_by_tag_name("MODULE")
            .into_iter()
            .map(Self::from_element)
            .collect()
    }
}

impl HasGuid for Module {
    fn guid(&self) -> Guid {
        self.guid
    }
}

// ============================================================================
// Database servers
// ============================================================================

/// Database engine of a [`DatabaseServer`] (`dbtypeid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbType {
    Jet3,
    Jet4,
    MsSqlServer,
    MsOracleOledb,
    Odbc,
    OracleOledb,
    Other(i64),
    #[default]
    Unknown,
}

impl DbType {
    pub fn from_id(id: i64) -> Self {
        match id {
            1 => DbType::Jet3,
            2 => DbType::Jet4,
            3 => DbType::MsSqlServer,
            4 => DbType::MsOracleOledb,
            5 => DbType::Odbc,
            8 => DbType::OracleOledb,
            other => DbType::Other(other),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DatabaseServerFields {
    pub db_type: DbType,
    pub is_create_allowed: Option<bool>,
    pub product_guid: Option<Guid>,
}

impl DatabaseServerFields {
    fn read(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            db_type: element
                .int_attribute("dbtypeid")?
                .map(DbType::from_id)
                .unwrap_or_default(),
            is_create_allowed: element.bool_attribute("createallowed")?,
            product_guid: element.guid_attribute("productguid")?,
        })
    }
}

/// A database server entry of the server manager.
#[derive(Clone)]
pub struct DatabaseServer {
    core: EntityCore<DatabaseServerFields>,
    session: SessionRef,
}

super::remote_object!(DatabaseServer);

impl DatabaseServer {
    pub fn new(session: SessionRef, guid: Guid) -> Self {
        Self {
            core: EntityCore::stub(guid),
            session,
        }
    }

    fn list_elements(session: &SessionRef) -> Result<Vec<XmlElement>> {
        let context = session.upgrade()?;
        context.with_server_manager(|| {
            let document = context.execute_query(
                r#"<ADMINISTRATION><DATABASESERVERS action="list" /></ADMINISTRATION>"#,
                IoDataFormat::SessionKeyAndLogonGuid,
            )?;
            Ok(document
                .elements_by_tag_name("DATABASESERVER")
                .into_iter()
                .cloned()
                .collect())
        })
    }

    /// All database servers; listed in the server manager context.
    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        Self::list_elements(session)?
            .into_iter()
            .map(|element| {
                let fields = DatabaseServerFields::read(&element)?;
                Ok(Self {
                    core: EntityCore::loaded(element, fields)?,
                    session: session.clone(),
                })
            })
            .collect()
    }

    pub fn db_type(&self) -> Result<DbType> {
        self.lazy_load(|f| &f.db_type)
    }

    pub fn is_create_allowed(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.is_create_allowed)?.unwrap_or(false))
    }

    pub fn product_guid(&self) -> Result<Option<Guid>> {
        self.lazy_load(|f| &f.product_guid)
    }
}

impl Materialize for DatabaseServer {
    type Fields = DatabaseServerFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<DatabaseServerFields> {
        &self.core
    }

    /// There is no load query; the fragment comes from the list.
    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let guid = self.guid();
        Self::list_elements(&self.session)?
            .into_iter()
            .find(|element| element.guid().ok().flatten() == Some(guid))
            .ok_or_else(|| Error::NotFound(format!("no database server with guid {guid}")))
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<DatabaseServerFields> {
        DatabaseServerFields::read(element)
    }
}

// ============================================================================
// Application servers
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplicationServerFields {
    /// Sender address of mails from this server
    pub from: String,
    pub ip_address: String,
}

/// An application (editorial) server.
#[derive(Clone)]
pub struct ApplicationServer {
    core: EntityCore<ApplicationServerFields>,
    session: SessionRef,
}

super::remote_object!(ApplicationServer);

impl ApplicationServer {
    pub fn new(session: SessionRef, guid: Guid) -> Self {
        Self {
            core: EntityCore::stub(guid),
            session,
        }
    }

    /// All application servers, as stubs knowing name and IP address.
    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session
            .upgrade()?
            .execute(r#"<ADMINISTRATION><EDITORIALSERVERS action="list"/></ADMINISTRATION>"#)?;
        document
            .elements_by_tag_name("EDITORIALSERVER")
            .into_iter()
            .map(|element| {
                let fields = ApplicationServerFields {
                    from: String::new(),
                    ip_address: element.attribute("ip").unwrap_or_default().to_string(),
                };
                Ok(Self {
                    core: EntityCore::stub_with(
                        element.required_guid("guid")?,
                        element.name_attribute().unwrap_or_default(),
                        fields,
                    ),
                    session: session.clone(),
                })
            })
            .collect()
    }

    pub fn from_address(&self) -> Result<String> {
        self.lazy_load(|f| &f.from)
    }

    pub fn ip_address(&self) -> Result<String> {
        self.lazy_load(|f| &f.ip_address)
    }
}

impl Materialize for ApplicationServer {
    type Fields = ApplicationServerFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<ApplicationServerFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.session.upgrade()?.execute(&format!(
            r#"<ADMINISTRATION><EDITORIALSERVER action="load" guid="{}"/></ADMINISTRATION>"#,
            self.guid()
        ))?;
        Ok(document.single_element("EDITORIALSERVER")?.clone())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<ApplicationServerFields> {
        // sic: the server spells it "adress"
        Ok(ApplicationServerFields {
            from: element.attribute("adress").unwrap_or_default().to_string(),
            ip_address: element.attribute("ip").unwrap_or_default().to_string(),
        })
    }
}

// ============================================================================
// Asynchronous processes
// ============================================================================

/// An entry of the server's asynchronous job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncProcess {
    pub guid: Guid,
    pub name: String,
    pub status: Option<i64>,
    pub category: Option<i64>,
    pub project: Option<Guid>,
    pub user_name: String,
}

impl AsyncProcess {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            guid: element.required_guid("guid")?,
            name: element.name_attribute().unwrap_or_default().to_string(),
            status: element.int_attribute("status")?,
            category: element.int_attribute("category")?,
            project: element.guid_attribute("projectguid")?,
            user_name: element.attribute("username").unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session.upgrade()?.execute(
            r#"<ADMINISTRATION><ASYNCQUEUE action="list" project=""/></ADMINISTRATION>"#,
        )?;
        document
            .elements_by_tag_name("ASYNCQUEUE")
            .into_iter()
            .filter(|element| element.has_attribute("guid"))
            .map(Self::from_element)
            .collect()
    }
}

impl HasGuid for AsyncProcess {
    fn guid(&self) -> Guid {
        self.guid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_module_type_keeps_unknown_ids() {
        assert_eq!(ModuleType::from_id("ServerManager"), ModuleType::ServerManager);
        assert_eq!(
            ModuleType::from_id("homepage"),
            ModuleType::Other("homepage".into())
        );
        assert_eq!(ModuleType::from_id("homepage").id(), "homepage");
        assert_eq!(ModuleType::SmartEdit.to_string(), "smartedit");
    }

    #[test]
    fn test_db_type_ids() {
        assert_eq!(DbType::from_id(3), DbType::MsSqlServer);
        assert_eq!(DbType::from_id(8), DbType::OracleOledb);
        assert_eq!(DbType::from_id(6), DbType::Other(6));
    }

    #[test]
    fn test_async_process_from_element() {
        let element = XmlElement::parse(
            r#"<ASYNCQUEUE guid="0A0B0C0D0E0F10111213141516171819" name="Publish" status="2" category="1" username="admin"/>"#,
        )
        .unwrap();
        let process = AsyncProcess::from_element(&element).unwrap();
        assert_eq!(process.name, "Publish");
        assert_eq!(process.status, Some(2));
        assert_eq!(process.project, None);
        assert_eq!(process.user_name, "admin");
    }
}
