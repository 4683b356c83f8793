use std::fmt;

use reddot_core::{Guid, HasGuid, XmlElement};

use super::ProjectScope;
use crate::error::Result;

/// A language variant of a project, complete from its list fragment.
#[derive(Clone)]
pub struct LanguageVariant {
    guid: Guid,
    name: String,
    abbreviation: String,
    is_main_language: bool,
    is_current: bool,
    scope: ProjectScope,
}

impl LanguageVariant {
    fn from_element(scope: &ProjectScope, element: &XmlElement) -> Result<Self> {
        Ok(Self {
            guid: element.required_guid("guid")?,
            name: element.name_attribute().unwrap_or_default().to_string(),
            abbreviation: element.attribute("language").unwrap_or_default().to_string(),
            is_main_language: element.bool_attribute("ismainlanguage")?.unwrap_or(false),
            is_current: element.bool_attribute("checked")?.unwrap_or(false),
            scope: scope.clone(),
        })
    }

    pub(crate) fn list(scope: &ProjectScope) -> Result<Vec<Self>> {
        let document =
            scope.execute(r#"<PROJECT><LANGUAGEVARIANTS action="list"/></PROJECT>"#)?;
        document
            .elements_by_tag_name("LANGUAGEVARIANT")
            .into_iter()
            .map(|element| Self::from_element(scope, element))
            .collect()
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Language abbreviation, e.g. `DEU` or `ENG`
    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }

    pub fn is_main_language(&self) -> bool {
        self.is_main_language
    }

    /// Whether this variant was active when the list was fetched
    pub fn is_current(&self) -> bool {
        self.is_current
    }

    /// Make this the active language variant of the session.
    pub fn select(&self) -> Result<()> {
        tracing::debug!("Activating language variant {}", self.abbreviation);
        self.scope.execute(&format!(
            r#"<PROJECT><LANGUAGEVARIANT action="setactive" guid="{}"/></PROJECT>"#,
            self.guid
        ))?;
        Ok(())
    }
}

impl HasGuid for LanguageVariant {
    fn guid(&self) -> Guid {
        self.guid
    }
}

impl PartialEq for LanguageVariant {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
    }
}

impl fmt::Debug for LanguageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageVariant")
            .field("guid", &self.guid)
            .field("abbreviation", &self.abbreviation)
            .field("is_main_language", &self.is_main_language)
            .finish()
    }
}
