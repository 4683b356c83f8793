//! Client for the RedDot / OpenText Management Server RQL interface.
//!
//! A [`Session`] logs in to one server and tracks the login guid, session key
//! and selected project. Remote objects ([`Project`], [`User`],
//! [`ContentClass`], ...) are cheap handles that load lazily and run their
//! queries through the session that created them.
//!
//! # Layers
//!
//! ```text
//! reddot       Session, error taxonomy, remote object kinds
//!   └── reddot-rql    envelopes, SOAP framing, HTTP transport
//!   └── reddot-core   guids, XML fragments, cached lists, lazy entities
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use reddot::{PasswordAuthentication, PartialObject, ServerLogin, Session};
//!
//! fn main() -> reddot::Result<()> {
//!     let login = ServerLogin::new(
//!         "cms",
//!         "http://cms.example.com/cms/",
//!         PasswordAuthentication::new("admin", "secret"),
//!     );
//!     let session = Session::login(login)?;
//!     println!("server version {}", session.server_version()?);
//!
//!     let project = session.projects().get_by_key(&"Intranet".to_string())?;
//!     for class in project.content_classes().get()?.iter() {
//!         println!("{}: {}", class.name()?, class.description()?);
//!     }
//!     project.refresh()?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod login;
pub mod objects;
pub mod session;

pub use error::{Error, Result};
pub use login::{PasswordAuthentication, ServerLogin};
pub use objects::{
    ApplicationServer, AsyncProcess, ContentClass, DatabaseServer, DbType, DialogLocale, Folder,
    Group, LanguageVariant, Module, ModuleType, Project, SystemLocale, TemplateVariant, User,
};
pub use session::{Session, SessionContext, SessionPhase, SessionRef, DEFAULT_ASYNC_RETRY};

pub use reddot_core::{
    CachedList, Caching, Guid, HasGuid, IndexedCachedList, LanguageDependent, PartialObject,
    ServerVersion, VersionRequirement, XmlDocument, XmlElement,
};
pub use reddot_rql::{HttpTransport, IoDataFormat, RqlError, Transport, TransportConfig};
