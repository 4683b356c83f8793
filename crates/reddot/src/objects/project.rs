use std::sync::Arc;

use reddot_core::{
    Caching, EntityCore, Guid, IndexedCachedList, Materialize, PartialObject, XmlDocument,
    XmlElement,
};

use super::{ContentClass, Folder, LanguageVariant, ProjectScope};
use crate::error::{Error, Result};
use crate::session::SessionRef;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProjectFields {
    pub description: String,
    /// `inhibitlevel`: 0 unlocked, higher values lock out more user levels
    pub locked_level: Option<i64>,
    pub is_test_project: Option<bool>,
    pub versioning: Option<bool>,
    pub database_name: String,
}

impl ProjectFields {
    fn read(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            description: element.attribute("description").unwrap_or_default().to_string(),
            locked_level: element.int_attribute("inhibitlevel")?,
            is_test_project: element.bool_attribute("testproject")?,
            versioning: element.bool_attribute("versioning")?,
            database_name: element.attribute("databasename").unwrap_or_default().to_string(),
        })
    }
}

struct ProjectLists {
    folders: IndexedCachedList<String, Folder, Error>,
    content_classes: IndexedCachedList<String, ContentClass, Error>,
    language_variants: IndexedCachedList<String, LanguageVariant, Error>,
}

impl ProjectLists {
    fn new(scope: &ProjectScope) -> Self {
        Self {
            folders: IndexedCachedList::new(
                {
                    let scope = scope.clone();
                    move || Folder::list(&scope)
                },
                Folder::known_name,
                Caching::Enabled,
            ),
            content_classes: IndexedCachedList::new(
                {
                    let scope = scope.clone();
                    move || ContentClass::list(&scope)
                },
                ContentClass::known_name,
                Caching::Enabled,
            ),
            language_variants: IndexedCachedList::new(
                {
                    let scope = scope.clone();
                    move || LanguageVariant::list(&scope)
                },
                |variant: &LanguageVariant| variant.abbreviation().to_string(),
                Caching::Enabled,
            ),
        }
    }
}

/// A CMS project.
#[derive(Clone)]
pub struct Project {
    core: EntityCore<ProjectFields>,
    scope: ProjectScope,
    lists: Arc<ProjectLists>,
}

super::remote_object!(Project);

impl Project {
    /// A project known only by guid; loaded on first access.
    pub fn new(session: SessionRef, guid: Guid) -> Self {
        Self::with_core(session, EntityCore::stub(guid))
    }

    pub(crate) fn from_element(session: SessionRef, element: &XmlElement) -> Result<Self> {
        let fields = ProjectFields::read(element)?;
        Ok(Self::with_core(session, EntityCore::loaded(element.clone(), fields)?))
    }

    fn with_core(session: SessionRef, core: EntityCore<ProjectFields>) -> Self {
        let scope = ProjectScope::new(session, core.guid());
        let lists = Arc::new(ProjectLists::new(&scope));
        Self { core, scope, lists }
    }

    fn from_reply(session: &SessionRef, document: &XmlDocument) -> Result<Vec<Self>> {
        document
            .elements_by_tag_name("PROJECT")
            .into_iter()
            .map(|element| Self::from_element(session.clone(), element))
            .collect()
    }

    /// All projects on the server
    pub(crate) fn list_all(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session
            .upgrade()?
            .execute(r#"<ADMINISTRATION><PROJECTS action="list"/></ADMINISTRATION>"#)?;
        Self::from_reply(session, &document)
    }

    /// The projects `user` has access to
    pub(crate) fn list_for_user(session: &SessionRef, user: Guid) -> Result<Vec<Self>> {
        let document = session.upgrade()?.execute(&format!(
            r#"<ADMINISTRATION><USER guid="{user}"><PROJECTS action="list" extendedinfo="1"/></USER></ADMINISTRATION>"#
        ))?;
        Self::from_reply(session, &document)
    }

    pub fn description(&self) -> Result<String> {
        self.lazy_load(|f| &f.description)
    }

    pub fn locked_level(&self) -> Result<Option<i64>> {
        self.lazy_load(|f| &f.locked_level)
    }

    pub fn is_test_project(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.is_test_project)?.unwrap_or(false))
    }

    pub fn is_versioning_active(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.versioning)?.unwrap_or(false))
    }

    pub fn database_name(&self) -> Result<String> {
        self.lazy_load(|f| &f.database_name)
    }

    /// Folders, indexed by name
    pub fn folders(&self) -> &IndexedCachedList<String, Folder, Error> {
        &self.lists.folders
    }

    /// Content classes, indexed by name
    pub fn content_classes(&self) -> &IndexedCachedList<String, ContentClass, Error> {
        &self.lists.content_classes
    }

    /// Language variants, indexed by abbreviation
    pub fn language_variants(&self) -> &IndexedCachedList<String, LanguageVariant, Error> {
        &self.lists.language_variants
    }

    /// Run `query` in this project's context
    pub fn execute_rql(&self, query: &str) -> Result<XmlDocument> {
        self.scope.execute(query)
    }

    /// Run `query` inside a `PROJECT` element in this project's context
    pub fn execute_rql_in_project_element(&self, query: &str) -> Result<XmlDocument> {
        self.scope.execute_in_element(query)
    }

    /// Run `f` with the language variant `abbreviation` active.
    pub fn with_language_variant<R>(
        &self,
        abbreviation: &str,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        self.scope.with_language_variant(abbreviation, f)
    }
}

impl Materialize for Project {
    type Fields = ProjectFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<ProjectFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.scope.context()?.execute(&format!(
            r#"<ADMINISTRATION><PROJECT action="load" guid="{}"/></ADMINISTRATION>"#,
            self.guid()
        ))?;
        Ok(document.single_element("PROJECT")?.clone())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<ProjectFields> {
        ProjectFields::read(element)
    }
}
