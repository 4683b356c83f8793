use reddot_core::{EntityCore, Guid, Materialize, PartialObject, XmlElement};

use super::Project;
use crate::error::{Error, Result};
use crate::session::SessionRef;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserFields {
    pub full_name: String,
    pub email: String,
    pub description: String,
    pub lcid: Option<i64>,
    /// Abbreviation of the user interface language, e.g. `ENG`
    pub user_language: String,
}

impl UserFields {
    fn read(element: &XmlElement) -> Result<Self> {
        let text = |name: &str| element.attribute(name).unwrap_or_default().to_string();
        Ok(Self {
            full_name: text("fullname"),
            email: text("email"),
            description: text("description"),
            lcid: element.int_attribute("lcid")?,
            user_language: text("userlanguage"),
        })
    }
}

/// A CMS user account.
#[derive(Clone)]
pub struct User {
    core: EntityCore<UserFields>,
    session: SessionRef,
}

super::remote_object!(User);

impl User {
    /// A user known only by guid; loaded on first access.
    pub fn new(session: SessionRef, guid: Guid) -> Self {
        Self {
            core: EntityCore::stub(guid),
            session,
        }
    }

    pub(crate) fn with_name(session: SessionRef, guid: Guid, name: &str) -> Self {
        Self {
            core: EntityCore::stub_with(guid, name, UserFields::default()),
            session,
        }
    }

    pub(crate) fn from_element(session: SessionRef, element: &XmlElement) -> Result<Self> {
        let fields = UserFields::read(element)?;
        Ok(Self {
            core: EntityCore::loaded(element.clone(), fields)?,
            session,
        })
    }

    /// All users; list replies carry name, full name and email.
    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session
            .upgrade()?
            .execute(r#"<ADMINISTRATION><USERS action="list"/></ADMINISTRATION>"#)?;
        document
            .elements_by_tag_name("USER")
            .into_iter()
            .map(|element| {
                let fields = UserFields {
                    full_name: element.attribute("fullname").unwrap_or_default().to_string(),
                    email: element.attribute("email").unwrap_or_default().to_string(),
                    ..UserFields::default()
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

    /// The `USER` fragment of a load reply for `guid`.
    pub(crate) fn load_element(session: &SessionRef, guid: Guid) -> Result<XmlElement> {
        let document = session.upgrade()?.execute(&format!(
            r#"<ADMINISTRATION><USER action="load" guid="{guid}"/></ADMINISTRATION>"#
        ))?;
        match document.elements_by_tag_name("USER").as_slice() {
            [user] => Ok((*user).clone()),
            [] => Err(Error::NotFound(format!("no user with guid {guid}"))),
            _ => Err(Error::internal(format!(
                "multiple users with guid {guid} in load reply"
            ))),
        }
    }

    pub fn full_name(&self) -> Result<String> {
        self.lazy_load(|f| &f.full_name)
    }

    pub fn email(&self) -> Result<String> {
        self.lazy_load(|f| &f.email)
    }

    pub fn description(&self) -> Result<String> {
        self.lazy_load(|f| &f.description)
    }

    pub fn lcid(&self) -> Result<Option<i64>> {
        self.lazy_load(|f| &f.lcid)
    }

    pub fn user_language(&self) -> Result<String> {
        self.lazy_load(|f| &f.user_language)
    }

    /// Projects this user has access to
    pub fn projects(&self) -> Result<Vec<Project>> {
        Project::list_for_user(&self.session, self.guid())
    }
}

impl Materialize for User {
    type Fields = UserFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<UserFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        Self::load_element(&self.session, self.guid())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<UserFields> {
        UserFields::read(element)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupFields {
    pub email: String,
}

/// A user group.
#[derive(Clone)]
pub struct Group {
    core: EntityCore<GroupFields>,
    session: SessionRef,
}

super::remote_object!(Group);

impl Group {
    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session
            .upgrade()?
            .execute(r#"<ADMINISTRATION><GROUPS action="list"/></ADMINISTRATION>"#)?;
        document
            .elements_by_tag_name("GROUP")
            .into_iter()
            .map(|element| {
                let fields = GroupFields {
                    email: element.attribute("email").unwrap_or_default().to_string(),
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

    pub fn email(&self) -> Result<String> {
        self.lazy_load(|f| &f.email)
    }
}

impl Materialize for Group {
    type Fields = GroupFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<GroupFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.session.upgrade()?.execute(&format!(
            r#"<ADMINISTRATION><GROUP action="load" guid="{}"/></ADMINISTRATION>"#,
            self.guid()
        ))?;
        Ok(document.single_element("GROUP")?.clone())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<GroupFields> {
        Ok(GroupFields {
            email: element.attribute("email").unwrap_or_default().to_string(),
        })
    }
}
