use std::sync::Arc;

use quick_xml::escape::escape;
use reddot_core::{
    Caching, EntityCore, Guid, IndexedCachedList, LanguageDependent, LanguageFragments,
    Materialize, PartialObject, XmlElement,
};

use super::{Folder, ProjectScope};
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContentClassFields {
    pub description: String,
    pub folder: Option<Guid>,
}

impl ContentClassFields {
    fn read(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            description: element.attribute("description").unwrap_or_default().to_string(),
            folder: element.guid_attribute("folderguid")?,
        })
    }
}

/// A content class (`TEMPLATE`). Its description differs per language variant.
#[derive(Clone)]
pub struct ContentClass {
    core: EntityCore<ContentClassFields>,
    scope: ProjectScope,
    fragments: LanguageFragments,
    variants: Arc<IndexedCachedList<String, TemplateVariant, Error>>,
}

super::remote_object!(ContentClass);

impl ContentClass {
    /// List replies carry name and folder only; everything else loads lazily.
    pub(crate) fn list(scope: &ProjectScope) -> Result<Vec<Self>> {
        let document = scope.execute(r#"<PROJECT><TEMPLATES action="list"/></PROJECT>"#)?;
        document
            .elements_by_tag_name("TEMPLATE")
            .into_iter()
            .map(|element| {
                let fields = ContentClassFields {
                    description: String::new(),
                    folder: element.guid_attribute("folderguid")?,
                };
                let core = EntityCore::stub_with(
                    element.required_guid("guid")?,
                    element.name_attribute().unwrap_or_default(),
                    fields,
                );
                Ok(Self::with_core(scope, core))
            })
            .collect()
    }

    fn with_core(scope: &ProjectScope, core: EntityCore<ContentClassFields>) -> Self {
        let variants = {
            let scope = scope.clone();
            let content_class = core.guid();
            IndexedCachedList::new(
                move || TemplateVariant::list(&scope, content_class),
                TemplateVariant::known_name,
                Caching::Enabled,
            )
        };
        Self {
            core,
            scope: scope.clone(),
            fragments: LanguageFragments::new(),
            variants: Arc::new(variants),
        }
    }

    /// Description in the currently active language variant
    pub fn description(&self) -> Result<String> {
        self.lazy_load(|f| &f.description)
    }

    /// Description in language variant `abbreviation`
    pub fn description_in(&self, abbreviation: &str) -> Result<String> {
        let fragment = self.language_fragment(abbreviation)?;
        Ok(fragment.attribute("description").unwrap_or_default().to_string())
    }

    /// Change the description; sent on [`commit`](Self::commit).
    pub fn set_description(&self, description: &str) -> Result<()> {
        self.set_attribute("description", description)?;
        self.core
            .update_fields(|f| f.description = description.to_string());
        Ok(())
    }

    pub fn folder(&self) -> Result<Option<Folder>> {
        Ok(self
            .lazy_load(|f| &f.folder)?
            .map(|guid| Folder::stub(&self.scope, guid)))
    }

    /// Send all pending attribute writes.
    pub fn commit(&self) -> Result<()> {
        let pending = self.core.pending_writes();
        if pending.is_empty() {
            return Ok(());
        }
        let attributes: String = pending
            .iter()
            .map(|(name, value)| format!(r#" {name}="{}""#, escape(value.as_str())))
            .collect();
        self.scope.execute(&format!(
            r#"<PROJECT><TEMPLATE action="save" guid="{}"{attributes}/></PROJECT>"#,
            self.guid()
        ))?;
        self.core.clear_pending_writes();
        Ok(())
    }

    /// Template variants, indexed by name
    pub fn template_variants(&self) -> &IndexedCachedList<String, TemplateVariant, Error> {
        &self.variants
    }
}

impl Materialize for ContentClass {
    type Fields = ContentClassFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<ContentClassFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.scope.execute(&format!(
            r#"<PROJECT><TEMPLATE action="load" guid="{}"/></PROJECT>"#,
            self.guid()
        ))?;
        Ok(document.single_element("TEMPLATE")?.clone())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<ContentClassFields> {
        ContentClassFields::read(element)
    }

    fn before_refresh(&self) {
        self.fragments.clear();
    }
}

impl LanguageDependent for ContentClass {
    fn language_fragments(&self) -> &LanguageFragments {
        &self.fragments
    }

    fn in_language_context<R>(
        &self,
        abbreviation: &str,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        self.scope.with_language_variant(abbreviation, f)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TemplateVariantFields {
    pub description: String,
    pub file_extension: String,
    pub inserts_stylesheet: Option<bool>,
    pub is_locked: Option<bool>,
}

impl TemplateVariantFields {
    fn read(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            description: element.attribute("description").unwrap_or_default().to_string(),
            file_extension: element.attribute("fileextension").unwrap_or_default().to_string(),
            inserts_stylesheet: element.bool_attribute("insertstylesheetinpage")?,
            is_locked: element.bool_attribute("lock")?,
        })
    }
}

/// One output variant of a content class.
#[derive(Clone)]
pub struct TemplateVariant {
    core: EntityCore<TemplateVariantFields>,
    scope: ProjectScope,
    content_class: Guid,
}

super::remote_object!(TemplateVariant);

impl TemplateVariant {
    fn list(scope: &ProjectScope, content_class: Guid) -> Result<Vec<Self>> {
        let document = scope.execute(&format!(
            r#"<PROJECT><TEMPLATE guid="{content_class}"><TEMPLATEVARIANTS action="list"/></TEMPLATE></PROJECT>"#
        ))?;
        document
            .elements_by_tag_name("TEMPLATEVARIANT")
            .into_iter()
            .map(|element| {
                Ok(Self {
                    core: EntityCore::stub_with(
                        element.required_guid("guid")?,
                        element.name_attribute().unwrap_or_default(),
                        TemplateVariantFields::default(),
                    ),
                    scope: scope.clone(),
                    content_class,
                })
            })
            .collect()
    }

    pub fn content_class_guid(&self) -> Guid {
        self.content_class
    }

    pub fn description(&self) -> Result<String> {
        self.lazy_load(|f| &f.description)
    }

    pub fn file_extension(&self) -> Result<String> {
        self.lazy_load(|f| &f.file_extension)
    }

    pub fn inserts_stylesheet(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.inserts_stylesheet)?.unwrap_or(false))
    }

    pub fn is_locked(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.is_locked)?.unwrap_or(false))
    }
}

impl Materialize for TemplateVariant {
    type Fields = TemplateVariantFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<TemplateVariantFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.scope.execute(&format!(
            r#"<PROJECT><TEMPLATE guid="{}"><TEMPLATEVARIANT action="load" readonly="1" guid="{}"/></TEMPLATE></PROJECT>"#,
            self.content_class,
            self.guid()
        ))?;
        Ok(document.single_element("TEMPLATEVARIANT")?.clone())
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<TemplateVariantFields> {
        TemplateVariantFields::read(element)
    }
}
