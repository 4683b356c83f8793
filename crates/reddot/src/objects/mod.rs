//! Remote object kinds.
//!
//! Objects with a load query ([`Project`], [`User`], [`Folder`], ...) are lazy:
//! they hold an [`EntityCore`](reddot_core::EntityCore) and load their
//! complete fragment on first access to something the list reply did not
//! contain. Objects that list replies always describe completely
//! ([`SystemLocale`], [`Module`], [`AsyncProcess`], ...) are plain values.

use std::sync::Arc;

use reddot_core::{Guid, XmlDocument};

use crate::error::{Error, Result};
use crate::session::{SessionContext, SessionRef};

mod content_class;
mod folder;
mod language_variant;
mod locale;
mod project;
mod server;
mod user;

pub use content_class::{ContentClass, ContentClassFields, TemplateVariant, TemplateVariantFields};
pub use folder::{Folder, FolderFields};
pub use language_variant::LanguageVariant;
pub use locale::{DialogLocale, SystemLocale, DIALOG_LOCALES_REQUIREMENT};
pub use project::{Project, ProjectFields};
pub use server::{
    ApplicationServer, ApplicationServerFields, AsyncProcess, DatabaseServer,
    DatabaseServerFields, DbType, Module, ModuleType,
};
pub use user::{Group, GroupFields, User, UserFields};

/// Guid accessor, lazy name, `HasGuid`, equality by guid and `Debug` for a
/// type holding `core: EntityCore<_>`.
macro_rules! remote_object {
    ($ty:ident) => {
        impl $ty {
            pub fn guid(&self) -> reddot_core::Guid {
                self.core.guid()
            }

            /// The name, loading the object if it is not known yet
            pub fn name(&self) -> crate::error::Result<String> {
                reddot_core::PartialObject::lazy_name(self)
            }

            /// The name as far as known without loading
            #[allow(dead_code)]
            pub(crate) fn known_name(&self) -> String {
                self.core.known_name().unwrap_or_default()
            }
        }

        impl reddot_core::HasGuid for $ty {
            fn guid(&self) -> reddot_core::Guid {
                self.core.guid()
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.core.guid() == other.core.guid()
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("guid", &self.core.guid())
                    .field("name", &self.core.known_name())
                    .field("initialized", &self.core.is_initialized())
                    .finish()
            }
        }
    };
}
pub(crate) use remote_object;

/// Query context of one project: selects the project before each query.
#[derive(Debug, Clone)]
pub(crate) struct ProjectScope {
    session: SessionRef,
    project: Guid,
}

impl ProjectScope {
    pub(crate) fn new(session: SessionRef, project: Guid) -> Self {
        Self { session, project }
    }

    pub(crate) fn project_guid(&self) -> Guid {
        self.project
    }

    pub(crate) fn context(&self) -> Result<Arc<SessionContext>> {
        self.session.upgrade()
    }

    /// Run `query` with session key and login guid in this project
    pub(crate) fn execute(&self, query: &str) -> Result<XmlDocument> {
        self.context()?.execute_in_project(self.project, query)
    }

    /// Run `query` inside a `PROJECT` element in this project
    pub(crate) fn execute_in_element(&self, query: &str) -> Result<XmlDocument> {
        self.context()?.execute_in_project_element(self.project, query)
    }

    /// Run `f` with language variant `abbreviation` active, then switch back.
    pub(crate) fn with_language_variant<R>(
        &self,
        abbreviation: &str,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let variants = LanguageVariant::list(self)?;
        let target = variants
            .iter()
            .find(|v| v.abbreviation() == abbreviation)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no language variant '{abbreviation}' in project {}",
                    self.project
                ))
            })?;
        let previous = variants.iter().find(|v| v.is_current());

        if previous.map(LanguageVariant::guid) == Some(target.guid()) {
            return f();
        }

        target.select()?;
        let result = f();
        if let Some(previous) = previous {
            if let Err(e) = previous.select() {
                if result.is_ok() {
                    return Err(e);
                }
                tracing::warn!(
                    "Could not reactivate language variant {}: {}",
                    previous.abbreviation(),
                    e
                );
            }
        }
        result
    }
}
