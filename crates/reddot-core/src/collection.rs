//! Cached remote listings.
//!
//! Every listing the server offers (projects, users, locales, ...) is exposed
//! through a [`CachedList`]: a fetch function plus an optional snapshot of its
//! last result. [`IndexedCachedList`] adds lookup by a key derived from each
//! element.
//!
//! Lists are shared by reference and mutate their snapshot through a mutex,
//! so all methods take `&self`. The fetch function runs without the lock held.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::guid::{Guid, HasGuid};

/// Whether a list keeps its last fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caching {
    Enabled,
    Disabled,
}

type Fetch<V, E> = Box<dyn Fn() -> Result<Vec<V>, E> + Send + Sync>;

struct ListState<V> {
    caching: Caching,
    snapshot: Option<Arc<Vec<V>>>,
}

/// A remote listing with an optional cached snapshot.
///
/// Elements come back in whatever order the fetch function yields them.
pub struct CachedList<V, E = Error> {
    fetch: Fetch<V, E>,
    state: Mutex<ListState<V>>,
}

impl<V, E> CachedList<V, E>
where
    E: From<Error>,
{
    pub fn new<F>(fetch: F, caching: Caching) -> Self
    where
        F: Fn() -> Result<Vec<V>, E> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            state: Mutex::new(ListState {
                caching,
                snapshot: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current elements.
    ///
    /// With caching enabled the same snapshot is returned until it is
    /// invalidated; otherwise every call fetches.
    pub fn get(&self) -> Result<Arc<Vec<V>>, E> {
        {
            let state = self.lock();
            if state.caching == Caching::Enabled {
                if let Some(snapshot) = &state.snapshot {
                    tracing::trace!("cached list hit ({} elements)", snapshot.len());
                    return Ok(Arc::clone(snapshot));
                }
            }
        }
        self.fetch_and_store()
    }

    /// Fetch now, regardless of any snapshot.
    pub fn refresh(&self) -> Result<Arc<Vec<V>>, E> {
        self.fetch_and_store()
    }

    fn fetch_and_store(&self) -> Result<Arc<Vec<V>>, E> {
        let items = Arc::new((self.fetch)()?);
        tracing::trace!("cached list fetched {} elements", items.len());
        let mut state = self.lock();
        if state.caching == Caching::Enabled {
            state.snapshot = Some(Arc::clone(&items));
        }
        Ok(items)
    }

    /// Drop the snapshot; the next access fetches again.
    pub fn invalidate_cache(&self) {
        self.lock().snapshot = None;
    }

    pub fn caching(&self) -> Caching {
        self.lock().caching
    }

    /// Switch caching on or off. Turning it off drops the snapshot.
    pub fn set_caching(&self, caching: Caching) {
        let mut state = self.lock();
        state.caching = caching;
        if caching == Caching::Disabled {
            state.snapshot = None;
        }
    }

    /// Whether a snapshot is currently held
    pub fn is_cached(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    pub fn len(&self) -> Result<usize, E> {
        Ok(self.get()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, E> {
        Ok(self.get()?.is_empty())
    }

    /// First element matching `predicate`
    pub fn find<P>(&self, predicate: P) -> Result<Option<V>, E>
    where
        P: Fn(&V) -> bool,
        V: Clone,
    {
        Ok(self.get()?.iter().find(|v| predicate(v)).cloned())
    }

    /// Poll until `predicate` holds for the whole list.
    ///
    /// Each round drops the snapshot and fetches again, so the predicate always
    /// sees fresh data. Gives up with [`Error::Timeout`] once `max_wait` has
    /// elapsed; a predicate that holds on the first fetch returns immediately.
    pub fn wait_for<P>(&self, predicate: P, max_wait: Duration, retry: Duration) -> Result<(), E>
    where
        P: Fn(&[V]) -> bool,
    {
        let start = Instant::now();
        loop {
            self.invalidate_cache();
            let items = self.get()?;
            if predicate(&items) {
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                return Err(Error::Timeout(max_wait).into());
            }
            thread::sleep(retry.min(max_wait - elapsed));
        }
    }
}

impl<V, E> CachedList<V, E>
where
    V: HasGuid + Clone,
    E: From<Error>,
{
    pub fn try_get_by_guid(&self, guid: Guid) -> Result<Option<V>, E> {
        self.find(|v| v.guid() == guid)
    }

    pub fn get_by_guid(&self, guid: Guid) -> Result<V, E> {
        self.try_get_by_guid(guid)?
            .ok_or_else(|| Error::not_found(format!("no element with guid {guid}")).into())
    }
}

impl<V, E> fmt::Debug for CachedList<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CachedList")
            .field("caching", &state.caching)
            .field("cached", &state.snapshot.as_ref().map(|s| s.len()))
            .finish()
    }
}

struct Index<K, V> {
    /// The snapshot the index was built from
    source: Arc<Vec<V>>,
    positions: HashMap<K, usize>,
}

/// A [`CachedList`] whose elements can be looked up by a derived key.
///
/// Keys are expected to be unique. When two elements share a key the one
/// that comes later in the fetched order wins the lookup.
pub struct IndexedCachedList<K, V, E = Error> {
    list: CachedList<V, E>,
    key_of: Box<dyn Fn(&V) -> K + Send + Sync>,
    index: Mutex<Option<Index<K, V>>>,
}

impl<K, V, E> IndexedCachedList<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    E: From<Error>,
{
    pub fn new<F, G>(fetch: F, key_of: G, caching: Caching) -> Self
    where
        F: Fn() -> Result<Vec<V>, E> + Send + Sync + 'static,
        G: Fn(&V) -> K + Send + Sync + 'static,
    {
        Self {
            list: CachedList::new(fetch, caching),
            key_of: Box::new(key_of),
            index: Mutex::new(None),
        }
    }

    /// The underlying list
    pub fn list(&self) -> &CachedList<V, E> {
        &self.list
    }

    pub fn get(&self) -> Result<Arc<Vec<V>>, E> {
        self.list.get()
    }

    pub fn refresh(&self) -> Result<Arc<Vec<V>>, E> {
        self.list.refresh()
    }

    pub fn invalidate_cache(&self) {
        self.list.invalidate_cache();
    }

    pub fn set_caching(&self, caching: Caching) {
        self.list.set_caching(caching);
    }

    pub fn is_cached(&self) -> bool {
        self.list.is_cached()
    }

    pub fn try_get_by_key(&self, key: &K) -> Result<Option<V>, E> {
        let items = self.list.get()?;
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);

        let stale = match index.as_ref() {
            Some(built) => !Arc::ptr_eq(&built.source, &items),
            None => true,
        };
        if stale {
            let mut positions = HashMap::with_capacity(items.len());
            for (pos, item) in items.iter().enumerate() {
                if let Some(previous) = positions.insert((self.key_of)(item), pos) {
                    tracing::debug!("duplicate key in indexed list, position {previous} replaced by {pos}");
                }
            }
            *index = Some(Index {
                source: Arc::clone(&items),
                positions,
            });
        }

        Ok(index
            .as_ref()
            .and_then(|built| built.positions.get(key))
            .map(|&pos| items[pos].clone()))
    }

    /// Look up an element by key; a missing key is [`Error::NotFound`].
    pub fn get_by_key(&self, key: &K) -> Result<V, E> {
        self.try_get_by_key(key)?
            .ok_or_else(|| Error::not_found(format!("no element with key {key:?}")).into())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, E> {
        Ok(self.try_get_by_key(key)?.is_some())
    }

    pub fn find<P>(&self, predicate: P) -> Result<Option<V>, E>
    where
        P: Fn(&V) -> bool,
    {
        self.list.find(predicate)
    }

    pub fn wait_for<P>(&self, predicate: P, max_wait: Duration, retry: Duration) -> Result<(), E>
    where
        P: Fn(&[V]) -> bool,
    {
        self.list.wait_for(predicate, max_wait, retry)
    }
}

impl<K, V, E> IndexedCachedList<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: HasGuid + Clone,
    E: From<Error>,
{
    pub fn try_get_by_guid(&self, guid: Guid) -> Result<Option<V>, E> {
        self.list.try_get_by_guid(guid)
    }

    pub fn get_by_guid(&self, guid: Guid) -> Result<V, E> {
        self.list.get_by_guid(guid)
    }
}

impl<K, V, E> fmt::Debug for IndexedCachedList<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCachedList")
            .field("list", &self.list)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_list(
        caching: Caching,
    ) -> (CachedList<u32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let list = CachedList::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(vec![3, 1, 2])
            },
            caching,
        );
        (list, calls)
    }

    #[test]
    fn test_cached_list_fetches_once() {
        let (list, calls) = counting_list(Caching::Enabled);
        let first = list.get().unwrap();
        let second = list.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first, vec![3, 1, 2]);
    }

    #[test]
    fn test_invalidate_refetches_exactly_once() {
        let (list, calls) = counting_list(Caching::Enabled);
        list.get().unwrap();
        list.invalidate_cache();
        assert!(!list.is_cached());
        list.get().unwrap();
        list.get().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_uncached_list_fetches_every_time() {
        let (list, calls) = counting_list(Caching::Disabled);
        list.get().unwrap();
        list.get().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!list.is_cached());
    }

    #[test]
    fn test_disabling_caching_drops_snapshot() {
        let (list, _) = counting_list(Caching::Enabled);
        list.get().unwrap();
        list.set_caching(Caching::Disabled);
        assert!(!list.is_cached());
        assert_eq!(list.caching(), Caching::Disabled);
    }

    #[test]
    fn test_fetch_errors_propagate_and_cache_nothing() {
        let list: CachedList<u32> =
            CachedList::new(|| Err(Error::internal("boom")), Caching::Enabled);
        assert!(list.get().is_err());
        assert!(!list.is_cached());
    }

    #[test]
    fn test_indexed_lookup_and_missing_key() {
        let list: IndexedCachedList<String, (String, u32)> = IndexedCachedList::new(
            || Ok(vec![("a".into(), 1), ("b".into(), 2)]),
            |(name, _): &(String, u32)| name.clone(),
            Caching::Enabled,
        );
        assert_eq!(list.get_by_key(&"b".to_string()).unwrap().1, 2);
        assert!(matches!(
            list.get_by_key(&"zzz".to_string()),
            Err(Error::NotFound(_))
        ));
        assert!(list.contains_key(&"a".to_string()).unwrap());
    }

    #[test]
    fn test_indexed_duplicate_keys_last_wins() {
        let list: IndexedCachedList<u32, (u32, &'static str)> = IndexedCachedList::new(
            || Ok(vec![(1, "first"), (1, "second")]),
            |(k, _)| *k,
            Caching::Enabled,
        );
        assert_eq!(list.get_by_key(&1).unwrap().1, "second");
    }

    #[test]
    fn test_index_rebuilt_after_invalidate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let list: IndexedCachedList<u32, u32> = IndexedCachedList::new(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(vec![n * 10])
            },
            |v| *v,
            Caching::Enabled,
        );
        assert!(list.contains_key(&0).unwrap());
        list.invalidate_cache();
        assert!(!list.contains_key(&0).unwrap());
        assert!(list.contains_key(&10).unwrap());
    }

    #[test]
    fn test_wait_for_immediate() {
        let (list, calls) = counting_list(Caching::Enabled);
        let start = Instant::now();
        list.wait_for(|items| items.contains(&2), Duration::from_secs(5), Duration::from_secs(1))
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_for_times_out() {
        let (list, calls) = counting_list(Caching::Enabled);
        let max_wait = Duration::from_millis(60);
        let start = Instant::now();
        let result = list.wait_for(|items| items.is_empty(), max_wait, Duration::from_millis(10));
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(start.elapsed() >= max_wait);
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[derive(Clone)]
    struct Item(Guid);

    impl HasGuid for Item {
        fn guid(&self) -> Guid {
            self.0
        }
    }

    #[test]
    fn test_get_by_guid() {
        let wanted = Guid::from_u128(7);
        let list: CachedList<Item> =
            CachedList::new(move || Ok(vec![Item(Guid::from_u128(1)), Item(wanted)]), Caching::Enabled);
        assert_eq!(list.get_by_guid(wanted).unwrap().0, wanted);
        assert!(matches!(
            list.get_by_guid(Guid::from_u128(99)),
            Err(Error::NotFound(_))
        ));
    }
}
