//! # reddot-core
//!
//! Protocol-independent building blocks of the reddot client library.
//!
//! This crate provides the types shared by the transport and session crates:
//! - [`Guid`] and [`ServerVersion`] - identity and version values as the server writes them
//! - [`XmlDocument`], [`XmlElement`] - an owned DOM for RQL replies
//! - [`CachedList`], [`IndexedCachedList`] - lazily fetched, optionally cached remote lists
//! - [`EntityCore`], [`PartialObject`] - lazily materialized remote objects
//!
//! ## Example
//!
//! ```rust
//! use reddot_core::{Caching, IndexedCachedList, XmlDocument};
//!
//! let reply = XmlDocument::parse(
//!     r#"<IODATA><PROJECTS><PROJECT guid="0A0B0C0D0E0F10111213141516171819" name="Intranet"/></PROJECTS></IODATA>"#,
//! )
//! .unwrap();
//!
//! let names: IndexedCachedList<String, String> = IndexedCachedList::new(
//!     move || {
//!         Ok(reply
//!             .elements_by_tag_name("PROJECT")
//!             .into_iter()
//!             .filter_map(|e| e.name_attribute().map(str::to_string))
//!             .collect())
//!     },
//!     |name: &String| name.clone(),
//!     Caching::Enabled,
//! );
//!
//! assert!(names.contains_key(&"Intranet".to_string()).unwrap());
//! ```

pub mod collection;
pub mod error;
pub mod guid;
pub mod lazy;
pub mod version;
pub mod xml;

// Re-exports for convenience
pub use collection::{CachedList, Caching, IndexedCachedList};
pub use error::{Error, Result};
pub use guid::{Guid, HasGuid};
pub use lazy::{
    EntityCore, LanguageDependent, LanguageFragment, LanguageFragments, Materialize,
    PartialObject,
};
pub use version::{ServerVersion, VersionRequirement};
pub use xml::{XmlDocument, XmlElement, XmlNode};
