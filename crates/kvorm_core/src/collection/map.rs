//! Typed key/value map over a store prefix.

use crate::error::{OrmError, OrmResult};
use crate::index::IndexKey;
use crate::model::Model;
use kvorm_storage::{prefix_iterator, BoxedIterator, KvRead, KvStore, PrefixStore};
use std::marker::PhantomData;
use tracing::trace;

/// Iteration order of a raw map scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending key order.
    #[default]
    Ascending,
    /// Descending key order.
    Descending,
}

/// A typed map storing `prefix ‖ key → value`.
///
/// Keys use the raw [`IndexKey::to_bytes`] form, which preserves key order,
/// and values the [`Model`] codec.
///
/// # Example
///
/// ```rust
/// use kvorm_core::{Map, Model};
/// use kvorm_storage::MemKvStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct Balance {
///     amount: u64,
/// }
///
/// impl Model for Balance {}
///
/// let balances = Map::<String, Balance>::new(vec![0x10]).unwrap();
/// let mut store = MemKvStore::new();
/// balances.set(&mut store, &"alice".to_string(), &Balance { amount: 5 }).unwrap();
/// assert_eq!(balances.get(&store, &"alice".to_string()).unwrap().amount, 5);
/// ```
pub struct Map<K, V> {
    prefix: Vec<u8>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> std::fmt::Debug for Map<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map").field("prefix", &self.prefix).finish()
    }
}

impl<K: IndexKey, V: Model> Map<K, V> {
    /// Creates a map under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] for an empty prefix.
    pub fn new(prefix: impl Into<Vec<u8>>) -> OrmResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(OrmError::invalid_argument("map prefix must not be empty"));
        }
        Ok(Self {
            prefix,
            _marker: PhantomData,
        })
    }

    /// Returns the map prefix.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn raw_key(key: &K) -> OrmResult<Vec<u8>> {
        let bytes = key.to_bytes();
        if bytes.is_empty() {
            return Err(OrmError::EmptyKey);
        }
        Ok(bytes)
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the key is absent.
    pub fn get(&self, store: &dyn KvRead, key: &K) -> OrmResult<V> {
        let raw = Self::raw_key(key)?;
        let bytes = PrefixStore::new(store, self.prefix.as_slice())
            .get(&raw)?
            .ok_or(OrmError::NotFound)?;
        V::decode(&bytes)
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn has(&self, store: &dyn KvRead, key: &K) -> OrmResult<bool> {
        let raw = Self::raw_key(key)?;
        Ok(PrefixStore::new(store, self.prefix.as_slice()).has(&raw)?)
    }

    /// Validates and stores `value` under `key`.
    pub fn set(&self, store: &mut dyn KvStore, key: &K, value: &V) -> OrmResult<()> {
        let raw = Self::raw_key(key)?;
        value.validate()?;
        let encoded = value.encode()?;
        PrefixStore::new(store, self.prefix.as_slice()).set(&raw, &encoded)?;
        trace!(prefix = ?self.prefix, len = encoded.len(), "set map entry");
        Ok(())
    }

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the key is absent.
    pub fn remove(&self, store: &mut dyn KvStore, key: &K) -> OrmResult<()> {
        let raw = Self::raw_key(key)?;
        let mut view = PrefixStore::new(store, self.prefix.as_slice());
        if !view.has(&raw)? {
            return Err(OrmError::NotFound);
        }
        view.delete(&raw)?;
        Ok(())
    }

    /// Iterates entries with raw keys in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start >= end`.
    pub fn iterate_raw<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> OrmResult<MapIterator<'a, K, V>> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(OrmError::invalid_argument("start must be less than end"));
            }
        }
        let it = prefix_iterator(store, &self.prefix, start, end, order == Order::Descending)?;
        Ok(MapIterator {
            it: Some(it),
            _marker: PhantomData,
        })
    }

    /// Iterates entries with `start <= key < end`.
    pub fn iterate<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
        order: Order,
    ) -> OrmResult<MapIterator<'a, K, V>> {
        let start = start.map(IndexKey::to_bytes);
        let end = end.map(IndexKey::to_bytes);
        self.iterate_raw(store, start.as_deref(), end.as_deref(), order)
    }
}

/// Iterator over map entries, decoding keys and values lazily.
pub struct MapIterator<'a, K, V> {
    it: Option<BoxedIterator<'a>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: IndexKey, V: Model> MapIterator<'_, K, V> {
    /// Returns the next `(raw_key, key, value)` entry, `None` when exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidIterator`] after [`MapIterator::close`].
    pub fn next_entry(&mut self) -> OrmResult<Option<(Vec<u8>, K, V)>> {
        let it = self.it.as_mut().ok_or(OrmError::InvalidIterator)?;
        if !it.valid() {
            return match it.error() {
                Some(err) => Err(err.clone().into()),
                None => Ok(None),
            };
        }
        let raw = it.key().to_vec();
        let key = K::from_bytes(&raw)?;
        let value = V::decode(it.value())?;
        it.next();
        Ok(Some((raw, key, value)))
    }

    /// Releases the store cursor.
    pub fn close(&mut self) {
        if let Some(mut it) = self.it.take() {
            it.close();
        }
    }
}

impl<K: IndexKey, V: Model> Iterator for MapIterator<'_, K, V> {
    type Item = OrmResult<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
            .transpose()
            .map(|entry| entry.map(|(_, key, value)| (key, value)))
    }
}
