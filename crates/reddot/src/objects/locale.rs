use reddot_core::{ServerVersion, VersionRequirement, XmlElement};
use reddot_rql::IoDataFormat;

use crate::error::{Error, Result};
use crate::session::SessionRef;

/// Dialog languages can only be listed from 10.0 on
pub const DIALOG_LOCALES_REQUIREMENT: VersionRequirement =
    VersionRequirement::at_least(ServerVersion::new(10, 0, 0, 0));

/// A locale of the server (`LANGUAGE action="list"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLocale {
    pub lcid: i64,
    pub name: String,
    /// e.g. `DEU`
    pub abbreviation: String,
    pub country: String,
    pub is_standard: bool,
}

impl SystemLocale {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            lcid: element.int_attribute("id")?.ok_or_else(|| {
                Error::internal(format!("locale without id: {}", element.to_xml_string()))
            })?,
            name: element.name_attribute().unwrap_or_default().to_string(),
            abbreviation: element.attribute("language").unwrap_or_default().to_string(),
            country: element.attribute("country").unwrap_or_default().to_string(),
            is_standard: element.bool_attribute("isstandardlanguage")?.unwrap_or(false),
        })
    }

    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let document = session.upgrade()?.execute(r#"<LANGUAGE action="list"/>"#)?;
        let languages = document
            .elements_by_tag_name("LANGUAGES")
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("Could not load languages"))?;
        languages
            .elements_by_tag_name("LIST")
            .into_iter()
            .map(Self::from_element)
            .collect()
    }
}

/// A language of the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogLocale {
    pub lcid: Option<i64>,
    pub name: String,
    pub abbreviation: String,
}

impl DialogLocale {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            lcid: element.int_attribute("id")?,
            name: element.name_attribute().unwrap_or_default().to_string(),
            abbreviation: element.attribute("language").unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn list(session: &SessionRef) -> Result<Vec<Self>> {
        let context = session.upgrade()?;
        context.ensure_version("dialog_locales", DIALOG_LOCALES_REQUIREMENT)?;
        let document = context.execute_query(
            r#"<DIALOG action="listlanguages" orderby="2"/>"#,
            IoDataFormat::LogonGuidOnly,
        )?;
        document
            .elements_by_tag_name("LIST")
            .into_iter()
            .map(Self::from_element)
            .collect()
    }
}
