//! Index with exactly one key per record, unique across rows.

use super::{is_empty_key, IndexCore, IndexIterator, IndexKey};
use crate::error::{OrmError, OrmResult};
use crate::iterator::first;
use crate::model::{Model, Record};
use crate::pagination::PageRequest;
use crate::table::Indexable;
use crate::types::RowId;
use kvorm_storage::KvRead;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// A secondary index that allows at most one row per key.
///
/// A write deriving a key already held by another row fails with
/// [`OrmError::UniqueConstraint`]. Records deriving an empty string or empty
/// bytes are not indexed. The raw row write is not undone by the
/// table, so run such writes inside a discardable transaction.
pub struct UniqueIndex<T, K> {
    core: Arc<IndexCore>,
    _marker: PhantomData<fn() -> (T, K)>,
}

impl<T, K> std::fmt::Debug for UniqueIndex<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UniqueIndex").field(&self.core).finish()
    }
}

impl<T: Model, K: IndexKey> UniqueIndex<T, K> {
    /// Builds the index under `prefix` and attaches it to `table`.
    ///
    /// # Errors
    ///
    /// Same as [`MultiKeyIndex::new`](super::MultiKeyIndex::new).
    pub fn new<I, F>(table: &mut I, prefix: u8, indexer: F) -> OrmResult<Self>
    where
        I: Indexable + ?Sized,
        F: Fn(&T) -> OrmResult<K> + Send + Sync + 'static,
    {
        let derive = Arc::new(move |obj: &T| -> OrmResult<BTreeSet<Vec<u8>>> {
            let key = indexer(obj)?.to_part();
            if is_empty_key(&key) {
                return Ok(BTreeSet::new());
            }
            Ok(BTreeSet::from([key.encode()?]))
        });
        let core = IndexCore::attach::<T, I>(table, prefix, K::SHAPE, true, derive)?;
        Ok(Self {
            core,
            _marker: PhantomData,
        })
    }

    /// Returns `true` if a row is indexed under `key`.
    pub fn has(&self, store: &dyn KvRead, key: &K) -> OrmResult<bool> {
        self.core.has(store, &key.to_part())
    }

    /// Iterates the row indexed under `key`; yields at most one record.
    pub fn get<'a>(&self, store: &'a dyn KvRead, key: &K) -> OrmResult<IndexIterator<'a>> {
        self.core.get(store, &key.to_part(), None)
    }

    /// Loads the row indexed under `key` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if no row holds `key`.
    pub fn get_one(&self, store: &dyn KvRead, key: &K, dest: &mut dyn Record) -> OrmResult<RowId> {
        let mut it = self.get(store, key)?;
        first(&mut it, dest).map_err(|err| match err {
            OrmError::IteratorDone => OrmError::NotFound,
            err => err,
        })
    }

    /// Like [`UniqueIndex::get`], honouring the row id and direction of
    /// `req`.
    pub fn get_paginated<'a>(
        &self,
        store: &'a dyn KvRead,
        key: &K,
        req: &PageRequest,
    ) -> OrmResult<IndexIterator<'a>> {
        self.core.get(store, &key.to_part(), Some(req))
    }

    /// Iterates rows with `start <= key < end` in key order.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start >= end`.
    pub fn prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
    ) -> OrmResult<IndexIterator<'a>> {
        let (start, end) = (start.map(IndexKey::to_part), end.map(IndexKey::to_part));
        self.core.prefix_scan(store, start.as_ref(), end.as_ref(), false)
    }

    /// Like [`UniqueIndex::prefix_scan`], in descending key order.
    pub fn reverse_prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
    ) -> OrmResult<IndexIterator<'a>> {
        let (start, end) = (start.map(IndexKey::to_part), end.map(IndexKey::to_part));
        self.core.prefix_scan(store, start.as_ref(), end.as_ref(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{read_all, RecordIterator};
    use crate::table::AutoUInt64Table;
    use kvorm_storage::{with_branch, MemKvStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        email: String,
        handle: Vec<u8>,
    }

    impl Model for User {}

    fn user(email: &str, handle: &[u8]) -> User {
        User {
            email: email.into(),
            handle: handle.to_vec(),
        }
    }

    struct Fixture {
        table: AutoUInt64Table<User>,
        by_email: UniqueIndex<User, String>,
        by_handle: UniqueIndex<User, Vec<u8>>,
    }

    fn fixture() -> Fixture {
        let mut table = AutoUInt64Table::new([0x01, 0x00], 0x02).unwrap();
        let by_email = UniqueIndex::new(&mut table, 0x03, |u: &User| Ok(u.email.clone())).unwrap();
        let by_handle = UniqueIndex::new(&mut table, 0x04, |u: &User| Ok(u.handle.clone())).unwrap();
        Fixture {
            table,
            by_email,
            by_handle,
        }
    }

    #[test]
    fn get_one_resolves_the_row() {
        let f = fixture();
        let mut store = MemKvStore::new();
        let id = f.table.create(&mut store, &user("a@x", b"a")).unwrap();

        let mut dest = User::default();
        let row = f.by_email.get_one(&store, &"a@x".to_string(), &mut dest).unwrap();
        assert_eq!(row.to_u64().unwrap(), id);
        assert_eq!(dest, user("a@x", b"a"));
        assert!(f
            .by_email
            .get_one(&store, &"b@x".to_string(), &mut dest)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let f = fixture();
        let mut store = MemKvStore::new();
        f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        let err = f.table.create(&mut store, &user("a@x", b"b")).unwrap_err();
        assert!(err.is_unique_constraint());
    }

    #[test]
    fn duplicate_is_atomic_inside_a_branch() {
        let f = fixture();
        let mut store = MemKvStore::new();
        f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        let before = store.clone();

        let result: OrmResult<u64> =
            with_branch(&mut store, |tx| f.table.create(tx, &user("a@x", b"b")));
        assert!(result.unwrap_err().is_unique_constraint());
        assert_eq!(store, before);
    }

    #[test]
    fn empty_keys_are_not_indexed() {
        let f = fixture();
        let mut store = MemKvStore::new();
        f.table.create(&mut store, &user("", b"")).unwrap();
        let id = f.table.create(&mut store, &user("", b"")).unwrap();
        assert_eq!(id, 2);
        assert!(!f.by_email.has(&store, &String::new()).unwrap());
        assert!(!f.by_handle.has(&store, &Vec::new()).unwrap());
        assert_eq!(store.len(), 3);

        let mut dest = User::default();
        assert!(f
            .by_email
            .get_one(&store, &String::new(), &mut dest)
            .unwrap_err()
            .is_not_found());
        let mut it = f.by_handle.get(&store, &Vec::new()).unwrap();
        assert_eq!(it.load_next(&mut dest).unwrap_err(), OrmError::IteratorDone);
    }

    #[test]
    fn clearing_a_key_removes_its_entry() {
        let f = fixture();
        let mut store = MemKvStore::new();
        let id = f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        f.table.update(&mut store, id, &user("", b"a")).unwrap();
        assert!(!f.by_email.has(&store, &"a@x".to_string()).unwrap());
        f.table.create(&mut store, &user("a@x", b"b")).unwrap();
        f.table.update(&mut store, id, &user("", b"")).unwrap();
        assert!(!f.by_handle.has(&store, &b"a".to_vec()).unwrap());
    }

    #[test]
    fn update_keeping_the_key_is_allowed() {
        let f = fixture();
        let mut store = MemKvStore::new();
        let id = f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        f.table.update(&mut store, id, &user("a@x", b"a")).unwrap();
        f.table.update(&mut store, id, &user("a@x", b"z")).unwrap();
        assert!(f.by_handle.has(&store, &b"z".to_vec()).unwrap());
        assert!(!f.by_handle.has(&store, &b"a".to_vec()).unwrap());
    }

    #[test]
    fn update_to_a_taken_key_is_rejected() {
        let f = fixture();
        let mut store = MemKvStore::new();
        f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        let id = f.table.create(&mut store, &user("b@x", b"b")).unwrap();
        assert!(f
            .table
            .update(&mut store, id, &user("a@x", b"b"))
            .unwrap_err()
            .is_unique_constraint());
    }

    #[test]
    fn key_is_free_after_delete() {
        let f = fixture();
        let mut store = MemKvStore::new();
        let id = f.table.create(&mut store, &user("a@x", b"a")).unwrap();
        f.table.delete(&mut store, id).unwrap();
        assert!(!f.by_email.has(&store, &"a@x".to_string()).unwrap());
        f.table.create(&mut store, &user("a@x", b"a")).unwrap();
    }

    #[test]
    fn byte_keys_that_prefix_each_other_are_distinct() {
        let f = fixture();
        let mut store = MemKvStore::new();
        f.table.create(&mut store, &user("a@x", b"ab")).unwrap();
        f.table.create(&mut store, &user("b@x", b"a")).unwrap();
        assert!(f.by_handle.has(&store, &b"a".to_vec()).unwrap());
    }

    #[test]
    fn scans_are_ordered_by_key() {
        let f = fixture();
        let mut store = MemKvStore::new();
        for email in ["c@x", "a@x", "b@x"] {
            f.table.create(&mut store, &user(email, email.as_bytes())).unwrap();
        }
        let mut found = Vec::<User>::new();
        read_all(&mut f.by_email.prefix_scan(&store, None, None).unwrap(), &mut found).unwrap();
        let emails: Vec<_> = found.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x", "b@x", "c@x"]);

        let mut it = f
            .by_email
            .reverse_prefix_scan(&store, None, Some(&"c@x".to_string()))
            .unwrap();
        let mut dest = User::default();
        it.load_next(&mut dest).unwrap();
        assert_eq!(dest.email, "b@x");
    }
}
