//! Lazily materialized remote objects.
//!
//! List replies describe objects only partially, load replies completely.
//! An entity therefore starts either *loaded* (built from a complete
//! fragment) or as a *stub* (guid only, maybe a few values the list reply
//! already had) and fetches its full fragment the first time something
//! missing is read.
//!
//! An entity type holds one [`EntityCore`] and implements [`Materialize`]
//! with the two object-specific steps: fetching its full fragment and turning
//! a fragment into typed fields. [`PartialObject`] then provides
//! `ensure_initialization`, `refresh`, `lazy_load` and attribute access for
//! free.
//!
//! ```text
//! Stub ──(first lazy read / ensure_initialization)──▶ Loaded
//!                                    Loaded ──refresh──▶ Loaded
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Error;
use crate::guid::Guid;
use crate::xml::XmlElement;

struct CoreState<F> {
    initialized: bool,
    name: String,
    element: Option<XmlElement>,
    fields: F,
    /// Attribute writes not yet sent to the server
    pending: BTreeMap<String, String>,
}

/// Materialization state of one remote object.
///
/// Clones share state: an entity handed out from a cached list and its
/// clones load at most once between them.
pub struct EntityCore<F> {
    guid: Guid,
    state: Arc<Mutex<CoreState<F>>>,
}

impl<F> Clone for EntityCore<F> {
    fn clone(&self) -> Self {
        Self {
            guid: self.guid,
            state: Arc::clone(&self.state),
        }
    }
}

impl<F: Default> EntityCore<F> {
    /// A guid-only stub
    pub fn stub(guid: Guid) -> Self {
        Self::stub_with(guid, String::new(), F::default())
    }

    /// A stub that already knows some values (e.g. from a list reply).
    ///
    /// Non-default values are served by [`PartialObject::lazy_load`] without
    /// loading; anything else triggers a load.
    pub fn stub_with(guid: Guid, name: impl Into<String>, fields: F) -> Self {
        Self::with_state(
            guid,
            CoreState {
                initialized: false,
                name: name.into(),
                element: None,
                fields,
                pending: BTreeMap::new(),
            },
        )
    }
}

impl<F> EntityCore<F> {
    /// A fully initialized entity from a complete fragment.
    ///
    /// The fragment must carry the entity's `guid`.
    pub fn loaded(element: XmlElement, fields: F) -> Result<Self, Error> {
        let guid = element.required_guid("guid")?;
        Ok(Self::loaded_with_guid(guid, element, fields))
    }

    /// Like [`EntityCore::loaded`] for fragments that carry their identity
    /// somewhere other than a `guid` attribute.
    pub fn loaded_with_guid(guid: Guid, element: XmlElement, fields: F) -> Self {
        let name = element.name_attribute().unwrap_or_default().to_string();
        Self::with_state(
            guid,
            CoreState {
                initialized: true,
                name,
                element: Some(element),
                fields,
                pending: BTreeMap::new(),
            },
        )
    }

    fn with_state(guid: Guid, state: CoreState<F>) -> Self {
        Self {
            guid,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState<F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Whether two handles share the same state
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Replace fragment and fields and mark the entity loaded.
    ///
    /// Pending writes are discarded; the fragment is the server's truth now.
    pub fn install(&self, element: XmlElement, fields: F) -> Result<(), Error> {
        if let Some(guid) = element.guid()? {
            if guid != self.guid {
                return Err(Error::internal(format!(
                    "fragment for {} carries guid {guid}",
                    self.guid
                )));
            }
        }

        let mut state = self.lock();
        if let Some(name) = element.name_attribute() {
            state.name = name.to_string();
        }
        state.element = Some(element);
        state.fields = fields;
        state.pending.clear();
        state.initialized = true;
        Ok(())
    }

    /// Read the typed fields without triggering a load
    pub fn with_fields<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.lock().fields)
    }

    /// Mutate the typed fields without triggering a load
    pub fn update_fields(&self, f: impl FnOnce(&mut F)) {
        f(&mut self.lock().fields)
    }

    /// The name, if already known
    pub fn known_name(&self) -> Option<String> {
        let state = self.lock();
        (!state.name.is_empty()).then(|| state.name.clone())
    }

    /// The stored fragment, if any, without triggering a load
    pub fn known_element(&self) -> Option<XmlElement> {
        self.lock().element.clone()
    }

    pub fn pending_writes(&self) -> BTreeMap<String, String> {
        self.lock().pending.clone()
    }

    pub fn clear_pending_writes(&self) {
        self.lock().pending.clear();
    }

    fn read_if<T, G>(&self, get: &G) -> Option<T>
    where
        T: Clone + Default + PartialEq,
        G: Fn(&F) -> &T,
    {
        let state = self.lock();
        let value = get(&state.fields);
        (state.initialized || *value != T::default()).then(|| value.clone())
    }

    fn write_attribute(&self, name: &str, value: &str) {
        let mut state = self.lock();
        if let Some(element) = state.element.as_mut() {
            element.set_attribute(name, value);
        }
        state.pending.insert(name.to_string(), value.to_string());
    }
}

impl<F: fmt::Debug> fmt::Debug for EntityCore<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EntityCore")
            .field("guid", &self.guid)
            .field("initialized", &state.initialized)
            .field("name", &state.name)
            .field("fields", &state.fields)
            .finish()
    }
}

/// The object-specific half of a lazily loaded entity.
pub trait Materialize {
    /// Typed values read from the fragment
    type Fields: Default;
    type Error: From<Error>;

    fn core(&self) -> &EntityCore<Self::Fields>;

    /// Fetch the complete fragment of this object.
    ///
    /// Zero or several matches in the reply must be reported as errors.
    fn retrieve_whole_object(&self) -> Result<XmlElement, Self::Error>;

    /// Read all typed fields from a complete fragment.
    fn load_whole_object(&self, element: &XmlElement) -> Result<Self::Fields, Self::Error>;

    /// Called at the start of every refresh.
    fn before_refresh(&self) {}
}

/// Lazy-loading operations available on every [`Materialize`] type.
pub trait PartialObject: Materialize {
    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    /// Load the object unless it is already loaded.
    fn ensure_initialization(&self) -> Result<(), Self::Error> {
        if self.core().is_initialized() {
            return Ok(());
        }
        self.refresh()
    }

    /// Fetch the complete fragment again and re-read all fields.
    fn refresh(&self) -> Result<(), Self::Error> {
        tracing::trace!("refreshing {}", self.core().guid());
        self.before_refresh();
        let element = self.retrieve_whole_object()?;
        let fields = self.load_whole_object(&element)?;
        self.core().install(element, fields)?;
        Ok(())
    }

    /// Read a field, loading the object first if the object is a stub and the
    /// field still holds its default value.
    fn lazy_load<T, G>(&self, get: G) -> Result<T, Self::Error>
    where
        T: Clone + Default + PartialEq,
        G: Fn(&Self::Fields) -> &T,
    {
        if let Some(value) = self.core().read_if(&get) {
            return Ok(value);
        }
        self.refresh()?;
        Ok(self.core().with_fields(|fields| get(fields).clone()))
    }

    /// The `name` attribute, loading the object if it is not known yet.
    fn lazy_name(&self) -> Result<String, Self::Error> {
        if let Some(name) = self.core().known_name() {
            return Ok(name);
        }
        self.ensure_initialization()?;
        Ok(self.core().known_name().unwrap_or_default())
    }

    /// The complete fragment
    fn element(&self) -> Result<XmlElement, Self::Error> {
        self.ensure_initialization()?;
        self.core()
            .known_element()
            .ok_or_else(|| Error::internal("loaded entity without fragment").into())
    }

    /// Read a raw attribute of the complete fragment
    fn attribute(&self, name: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.element()?.attribute(name).map(str::to_string))
    }

    /// Write a raw attribute; it stays pending until the owner sends it.
    fn set_attribute(&self, name: &str, value: &str) -> Result<(), Self::Error> {
        self.ensure_initialization()?;
        self.core().write_attribute(name, value);
        Ok(())
    }
}

impl<T: Materialize + ?Sized> PartialObject for T {}

// ============================================================================
// Language dependent objects
// ============================================================================

/// One language variant's fragment plus the writes carried into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFragment {
    element: XmlElement,
    written: BTreeMap<String, String>,
}

impl LanguageFragment {
    pub fn element(&self) -> &XmlElement {
        &self.element
    }

    /// Attribute value, preferring writes not yet sent
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.written
            .get(name)
            .map(String::as_str)
            .or_else(|| self.element.attribute(name))
    }

    pub fn written(&self) -> &BTreeMap<String, String> {
        &self.written
    }
}

/// Per-language fragment cache, keyed by language abbreviation.
#[derive(Clone, Default)]
pub struct LanguageFragments {
    inner: Arc<Mutex<HashMap<String, LanguageFragment>>>,
}

impl LanguageFragments {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LanguageFragment>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached fragment for `abbreviation`, retrieving it on first access.
    pub fn get_or_retrieve<E>(
        &self,
        abbreviation: &str,
        written: BTreeMap<String, String>,
        retrieve: impl FnOnce() -> Result<XmlElement, E>,
    ) -> Result<LanguageFragment, E> {
        if let Some(fragment) = self.lock().get(abbreviation) {
            return Ok(fragment.clone());
        }

        let fragment = LanguageFragment {
            element: retrieve()?,
            written,
        };
        self.lock()
            .insert(abbreviation.to_string(), fragment.clone());
        Ok(fragment)
    }

    pub fn contains(&self, abbreviation: &str) -> bool {
        self.lock().contains_key(abbreviation)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl fmt::Debug for LanguageFragments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("LanguageFragments")
            .field("languages", &keys)
            .finish()
    }
}

/// An entity whose fragment differs per language variant.
///
/// Implementors must clear their [`LanguageFragments`] in
/// [`Materialize::before_refresh`].
pub trait LanguageDependent: Materialize {
    fn language_fragments(&self) -> &LanguageFragments;

    /// Run `f` while the language variant `abbreviation` is active.
    fn in_language_context<R>(
        &self,
        abbreviation: &str,
        f: impl FnOnce() -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;

    /// The fragment as seen in language variant `abbreviation`.
    ///
    /// Retrieved once per language; writes pending on the base fragment at
    /// that moment are carried forward.
    fn language_fragment(&self, abbreviation: &str) -> Result<LanguageFragment, Self::Error> {
        self.language_fragments().get_or_retrieve(
            abbreviation,
            self.core().pending_writes(),
            || self.in_language_context(abbreviation, || self.retrieve_whole_object()),
        )
    }
}
