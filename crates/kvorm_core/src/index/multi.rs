//! Index with any number of keys per record.

use super::{IndexCore, IndexIterator, IndexKey};
use crate::error::OrmResult;
use crate::model::Model;
use crate::pagination::PageRequest;
use crate::table::Indexable;
use kvorm_storage::KvRead;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// A secondary index mapping derived keys to rows.
///
/// The indexer may return any number of keys per record. Keys whose raw
/// bytes are empty are skipped, so an empty string or empty byte key simply
/// leaves the record out of the index. Several rows may share a key.
///
/// # Example
///
/// ```rust
/// use kvorm_core::{AutoUInt64Table, Model, MultiKeyIndex, read_all};
/// use kvorm_storage::MemKvStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Post {
///     author: String,
/// }
///
/// impl Model for Post {}
///
/// let mut posts = AutoUInt64Table::<Post>::new([0x01, 0x00], 0x02).unwrap();
/// let by_author = MultiKeyIndex::new(&mut posts, 0x03, |p: &Post| Ok(vec![p.author.clone()])).unwrap();
///
/// let mut store = MemKvStore::new();
/// posts.create(&mut store, &Post { author: "ann".into() }).unwrap();
/// posts.create(&mut store, &Post { author: "ann".into() }).unwrap();
///
/// let mut found = Vec::<Post>::new();
/// read_all(&mut by_author.get(&store, &"ann".to_string()).unwrap(), &mut found).unwrap();
/// assert_eq!(found.len(), 2);
/// ```
pub struct MultiKeyIndex<T, K> {
    core: Arc<IndexCore>,
    _marker: PhantomData<fn() -> (T, K)>,
}

impl<T, K> std::fmt::Debug for MultiKeyIndex<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MultiKeyIndex").field(&self.core).finish()
    }
}

impl<T: Model, K: IndexKey> MultiKeyIndex<T, K> {
    /// Builds the index under `prefix` and attaches it to `table`.
    ///
    /// # Errors
    ///
    /// - [`OrmError::InvalidType`](crate::OrmError::InvalidType) if the table
    ///   stores another model
    /// - [`OrmError::InvalidArgument`](crate::OrmError::InvalidArgument) if
    ///   `prefix` collides with the table or its sequence
    /// - [`OrmError::InvalidOperation`](crate::OrmError::InvalidOperation) if
    ///   the table has already been written
    pub fn new<I, F>(table: &mut I, prefix: u8, indexer: F) -> OrmResult<Self>
    where
        I: Indexable + ?Sized,
        F: Fn(&T) -> OrmResult<Vec<K>> + Send + Sync + 'static,
    {
        let derive = Arc::new(move |obj: &T| -> OrmResult<BTreeSet<Vec<u8>>> {
            let mut keys = BTreeSet::new();
            for key in indexer(obj)? {
                if key.to_bytes().is_empty() {
                    continue;
                }
                keys.insert(key.to_part().encode()?);
            }
            Ok(keys)
        });
        let core = IndexCore::attach::<T, I>(table, prefix, K::SHAPE, false, derive)?;
        Ok(Self {
            core,
            _marker: PhantomData,
        })
    }

    /// Returns `true` if any row is indexed under `key`.
    pub fn has(&self, store: &dyn KvRead, key: &K) -> OrmResult<bool> {
        self.core.has(store, &key.to_part())
    }

    /// Iterates the rows indexed under `key`, in row id order.
    pub fn get<'a>(&self, store: &'a dyn KvRead, key: &K) -> OrmResult<IndexIterator<'a>> {
        self.core.get(store, &key.to_part(), None)
    }

    /// Iterates the rows indexed under `key`, starting at the row id in
    /// `req.key` and in the direction of `req.reverse`.
    ///
    /// Pass the iterator to [`paginate_records`](crate::paginate_records)
    /// with the same request to fill a page.
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
    /// Returns [`OrmError::InvalidArgument`](crate::OrmError::InvalidArgument)
    /// if `start >= end`.
    pub fn prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
    ) -> OrmResult<IndexIterator<'a>> {
        self.scan(store, start, end, false)
    }

    /// Like [`MultiKeyIndex::prefix_scan`], in descending key order.
    pub fn reverse_prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
    ) -> OrmResult<IndexIterator<'a>> {
        self.scan(store, start, end, true)
    }

    fn scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&K>,
        end: Option<&K>,
        reverse: bool,
    ) -> OrmResult<IndexIterator<'a>> {
        let start = start.map(IndexKey::to_part);
        let end = end.map(IndexKey::to_part);
        self.core.prefix_scan(store, start.as_ref(), end.as_ref(), reverse)
    }
}
