use reddot_core::{EntityCore, Guid, Materialize, PartialObject, XmlElement};

use super::ProjectScope;
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FolderFields {
    pub is_asset_manager_folder: Option<bool>,
    pub linked_project: Option<Guid>,
    pub linked_folder: Option<Guid>,
}

impl FolderFields {
    fn read(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            is_asset_manager_folder: element.bool_attribute("catalog")?,
            linked_project: element.guid_attribute("linkedprojectguid")?,
            linked_folder: element.guid_attribute("linkedfolderguid")?,
        })
    }
}

/// A folder of a project's file system.
#[derive(Clone)]
pub struct Folder {
    core: EntityCore<FolderFields>,
    scope: ProjectScope,
}

super::remote_object!(Folder);

impl Folder {
    pub(crate) fn list(scope: &ProjectScope) -> Result<Vec<Self>> {
        let document =
            scope.execute(r#"<PROJECT><FOLDERS action="list" withsubfolders="0"/></PROJECT>"#)?;
        document
            .elements_by_tag_name("FOLDER")
            .into_iter()
            .map(|element| {
                let fields = FolderFields::read(element)?;
                Ok(Self {
                    core: EntityCore::loaded(element.clone(), fields)?,
                    scope: scope.clone(),
                })
            })
            .collect()
    }

    /// A folder known only by guid; loaded on first access.
    pub(crate) fn stub(scope: &ProjectScope, guid: Guid) -> Self {
        Self {
            core: EntityCore::stub(guid),
            scope: scope.clone(),
        }
    }

    pub fn is_asset_manager_folder(&self) -> Result<bool> {
        Ok(self.lazy_load(|f| &f.is_asset_manager_folder)?.unwrap_or(false))
    }

    /// Project this folder links to, if it is a linked folder
    pub fn linked_project(&self) -> Result<Option<Guid>> {
        self.lazy_load(|f| &f.linked_project)
    }

    pub fn linked_folder(&self) -> Result<Option<Guid>> {
        self.lazy_load(|f| &f.linked_folder)
    }
}

impl Materialize for Folder {
    type Fields = FolderFields;
    type Error = Error;

    fn core(&self) -> &EntityCore<FolderFields> {
        &self.core
    }

    fn retrieve_whole_object(&self) -> Result<XmlElement> {
        let document = self.scope.execute(&format!(
            r#"<PROJECT><FOLDER action="load" guid="{}"/></PROJECT>"#,
            self.guid()
        ))?;
        match document.elements_by_tag_name("FOLDER").as_slice() {
            [folder] => Ok((*folder).clone()),
            _ => Err(Error::NotFound(format!(
                "no folder with guid {} in project {}",
                self.guid(),
                self.scope.project_guid()
            ))),
        }
    }

    fn load_whole_object(&self, element: &XmlElement) -> Result<FolderFields> {
        FolderFields::read(element)
    }
}
