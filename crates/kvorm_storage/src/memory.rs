//! In-memory ordered key/value store.

use crate::backend::{is_empty_range, BoxedIterator, EmptyIterator, KvIterator, KvRead, KvStore};
use crate::error::{StorageError, StorageResult};
use std::collections::BTreeMap;
use std::ops::Bound;

/// An in-memory, `BTreeMap`-backed ordered store.
///
/// This store is suitable for:
/// - Unit and integration tests
/// - Hosts that keep application state in memory and persist elsewhere
///
/// # Example
///
/// ```rust
/// use kvorm_storage::{KvIterator, KvRead, KvStore, MemKvStore};
///
/// let mut store = MemKvStore::new();
/// store.set(b"b", b"2").unwrap();
/// store.set(b"a", b"1").unwrap();
///
/// let mut it = store.iterator(None, None).unwrap();
/// assert_eq!(it.key(), b"a");
/// it.next();
/// assert_eq!(it.key(), b"b");
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemKvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemKvStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns all entries in key order.
    ///
    /// Useful for byte-for-byte comparisons in tests.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.data.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> std::collections::btree_map::Range<'_, Vec<u8>, Vec<u8>> {
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        self.data.range::<[u8], _>((lower, upper))
    }
}

impl KvRead for MemKvStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.data.contains_key(key))
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        if is_empty_range(start, end) {
            return Ok(Box::new(EmptyIterator));
        }
        let entries = self
            .range(start, end)
            .map(|(k, v)| (k.as_slice(), v.as_slice()));
        Ok(Box::new(RangeIterator::new(Box::new(entries))))
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        if is_empty_range(start, end) {
            return Ok(Box::new(EmptyIterator));
        }
        let entries = self
            .range(start, end)
            .rev()
            .map(|(k, v)| (k.as_slice(), v.as_slice()));
        Ok(Box::new(RangeIterator::new(Box::new(entries))))
    }
}

impl KvStore for MemKvStore {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.data.remove(key);
        Ok(())
    }
}

/// Cursor over borrowed entries produced by an ordered std iterator.
pub(crate) struct RangeIterator<'a> {
    entries: Box<dyn Iterator<Item = (&'a [u8], &'a [u8])> + 'a>,
    current: Option<(&'a [u8], &'a [u8])>,
}

impl<'a> RangeIterator<'a> {
    pub(crate) fn new(mut entries: Box<dyn Iterator<Item = (&'a [u8], &'a [u8])> + 'a>) -> Self {
        let current = entries.next();
        Self { entries, current }
    }
}

impl KvIterator for RangeIterator<'_> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.map_or(&[][..], |(k, _)| k)
    }

    fn value(&self) -> &[u8] {
        self.current.map_or(&[][..], |(_, v)| v)
    }

    fn next(&mut self) {
        if self.current.is_some() {
            self.current = self.entries.next();
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.entries = Box::new(std::iter::empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&[u8]]) -> MemKvStore {
        let mut store = MemKvStore::new();
        for key in keys {
            store.set(key, b"v").unwrap();
        }
        store
    }

    fn collect(mut it: BoxedIterator<'_>) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(it.key().to_vec());
            it.next();
        }
        keys
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemKvStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn memory_set_get_delete() {
        let mut store = MemKvStore::new();
        store.set(b"key", b"value").unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert!(store.has(b"key").unwrap());

        store.delete(b"key").unwrap();
        assert_eq!(store.get(b"key").unwrap(), None);
        assert!(!store.has(b"key").unwrap());
    }

    #[test]
    fn memory_empty_value_is_stored() {
        let mut store = MemKvStore::new();
        store.set(b"key", b"").unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn memory_rejects_empty_key() {
        let mut store = MemKvStore::new();
        assert_eq!(store.set(b"", b"v"), Err(StorageError::EmptyKey));
    }

    #[test]
    fn memory_iterates_half_open_range() {
        let store = store_with(&[b"a", b"b", b"c", b"d"]);
        let keys = collect(store.iterator(Some(b"b"), Some(b"d")).unwrap());
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn memory_reverse_iterates_half_open_range() {
        let store = store_with(&[b"a", b"b", b"c", b"d"]);
        let keys = collect(store.reverse_iterator(Some(b"b"), Some(b"d")).unwrap());
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn memory_unbounded_iteration() {
        let store = store_with(&[b"c", b"a", b"b"]);
        let keys = collect(store.iterator(None, None).unwrap());
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn memory_inverted_range_is_empty() {
        let store = store_with(&[b"a", b"b"]);
        let it = store.iterator(Some(b"b"), Some(b"a")).unwrap();
        assert!(!it.valid());
        let it = store.reverse_iterator(Some(b"b"), Some(b"b")).unwrap();
        assert!(!it.valid());
    }

    #[test]
    fn memory_closed_iterator_is_invalid() {
        let store = store_with(&[b"a", b"b"]);
        let mut it = store.iterator(None, None).unwrap();
        assert!(it.valid());
        it.close();
        assert!(!it.valid());
        it.next();
        assert!(!it.valid());
        assert!(it.key().is_empty());
    }
}
