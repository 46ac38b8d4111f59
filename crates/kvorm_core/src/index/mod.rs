//! Secondary indexes.
//!
//! An index derives keys from each record of a table and keeps one entry
//! `index_prefix ‖ encoded_key ‖ row_id → ∅` per derived key. Entries are
//! maintained by interceptors registered on the table at construction, so
//! every table write keeps its indexes in sync.
//!
//! - [`MultiKeyIndex`]: any number of keys per record, shared keys allowed
//! - [`UniqueIndex`]: one key per record, rejects duplicates across rows

mod iterator;
mod multi;
mod traits;
mod unique;

pub use iterator::IndexIterator;
pub use multi::MultiKeyIndex;
pub use traits::IndexKey;
pub use unique::UniqueIndex;

use crate::error::{OrmError, OrmResult};
use crate::key::{get_start_end_bz, prefix_range, KeyPart, KeyShape};
use crate::model::{downcast, Model, ModelType};
use crate::pagination::PageRequest;
use crate::table::{Indexable, RowGetter};
use crate::types::RowId;
use kvorm_storage::{prefix_iterator, EmptyIterator, KvIterator, KvRead, KvStore, PrefixStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Derives the encoded keys of a record.
type KeyDeriver<T> = Arc<dyn Fn(&T) -> OrmResult<BTreeSet<Vec<u8>>> + Send + Sync>;

/// State shared by an index handle and its interceptors.
pub(crate) struct IndexCore {
    prefix: u8,
    row_getter: RowGetter,
    shape: KeyShape,
    model: ModelType,
    unique: bool,
}

impl std::fmt::Debug for IndexCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCore")
            .field("prefix", &self.prefix)
            .field("shape", &self.shape)
            .field("model", &self.model.name())
            .field("unique", &self.unique)
            .finish()
    }
}

impl IndexCore {
    /// Validates the wiring and registers the maintenance interceptors.
    pub(crate) fn attach<T, I>(
        table: &mut I,
        prefix: u8,
        shape: KeyShape,
        unique: bool,
        derive: KeyDeriver<T>,
    ) -> OrmResult<Arc<Self>>
    where
        T: Model,
        I: Indexable + ?Sized,
    {
        let model = table.model_type();
        if !model.is::<T>() {
            return Err(OrmError::invalid_type(model.name(), std::any::type_name::<T>()));
        }
        if prefix == table.table_prefix()[0] || table.sequence_prefix() == Some(prefix) {
            return Err(OrmError::invalid_argument(format!(
                "index prefix {prefix:#04x} collides with its table"
            )));
        }

        let core = Arc::new(Self {
            prefix,
            row_getter: table.row_getter(),
            shape,
            model,
            unique,
        });

        let on_set = Arc::clone(&core);
        let set_keys = Arc::clone(&derive);
        table.add_after_set_interceptor(Box::new(move |store, row_id, new, old| {
            let new_keys = set_keys(downcast::<T>(new)?)?;
            let old_keys = match old {
                Some(old) => set_keys(downcast::<T>(old)?)?,
                None => BTreeSet::new(),
            };
            for key in old_keys.difference(&new_keys) {
                on_set.remove_entry(store, key, row_id)?;
            }
            for key in new_keys.difference(&old_keys) {
                on_set.add_entry(store, key, row_id)?;
            }
            Ok(())
        }))?;

        let on_delete = Arc::clone(&core);
        table.add_after_delete_interceptor(Box::new(move |store, row_id, old| {
            for key in derive(downcast::<T>(old)?)? {
                on_delete.remove_entry(store, &key, row_id)?;
            }
            Ok(())
        }))?;

        debug!(prefix, ?shape, unique, model = model.name(), "attached index");
        Ok(core)
    }

    fn entry_key(encoded: &[u8], row_id: &RowId) -> Vec<u8> {
        let mut key = Vec::with_capacity(encoded.len() + row_id.as_bytes().len());
        key.extend_from_slice(encoded);
        key.extend_from_slice(row_id.as_bytes());
        key
    }

    fn add_entry(&self, store: &mut dyn KvStore, encoded: &[u8], row_id: &RowId) -> OrmResult<()> {
        if self.unique {
            if encoded.is_empty() {
                return Err(OrmError::invalid_argument("unique index key must not be empty"));
            }
            if self.has_encoded(&*store, encoded)? {
                debug!(prefix = self.prefix, row = %row_id, "unique index violation");
                return Err(OrmError::UniqueConstraint);
            }
        }
        let mut entries = PrefixStore::new(store, vec![self.prefix]);
        entries.set(&Self::entry_key(encoded, row_id), &[])?;
        trace!(prefix = self.prefix, row = %row_id, "added index entry");
        Ok(())
    }

    fn remove_entry(&self, store: &mut dyn KvStore, encoded: &[u8], row_id: &RowId) -> OrmResult<()> {
        let mut entries = PrefixStore::new(store, vec![self.prefix]);
        entries.delete(&Self::entry_key(encoded, row_id))?;
        trace!(prefix = self.prefix, row = %row_id, "removed index entry");
        Ok(())
    }

    fn has_encoded(&self, store: &dyn KvRead, encoded: &[u8]) -> OrmResult<bool> {
        let (start, end) = prefix_range(encoded)?;
        let it = prefix_iterator(store, &[self.prefix], Some(start.as_slice()), end.as_deref(), false)?;
        Ok(it.valid())
    }

    pub(crate) fn has(&self, store: &dyn KvRead, key: &KeyPart) -> OrmResult<bool> {
        if is_empty_key(key) {
            return Ok(false);
        }
        self.has_encoded(store, &key.encode()?)
    }

    /// Iterates the entries of one key, optionally starting at a row id.
    pub(crate) fn get<'a>(
        &self,
        store: &'a dyn KvRead,
        key: &KeyPart,
        req: Option<&PageRequest>,
    ) -> OrmResult<IndexIterator<'a>> {
        if is_empty_key(key) {
            return Ok(IndexIterator::new(
                Box::new(EmptyIterator),
                store,
                Arc::clone(&self.row_getter),
                self.shape,
            ));
        }
        let encoded = key.encode()?;
        let (start, end) = prefix_range(&encoded)?;
        let (page_key, reverse) = req.map_or((&[][..], false), |req| (req.key.as_slice(), req.reverse));

        let (start, end) = match (page_key.is_empty(), reverse) {
            (true, _) => (start, end),
            (false, false) => (Self::entry_key(&encoded, &RowId::from(page_key)), end),
            (false, true) => {
                let mut bound = Self::entry_key(&encoded, &RowId::from(page_key));
                bound.push(0);
                (start, Some(bound))
            }
        };
        self.iterator(store, Some(start.as_slice()), end.as_deref(), reverse)
    }

    pub(crate) fn prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&KeyPart>,
        end: Option<&KeyPart>,
        reverse: bool,
    ) -> OrmResult<IndexIterator<'a>> {
        let (start, end) = get_start_end_bz(start, end)?;
        self.iterator(store, start.as_deref(), end.as_deref(), reverse)
    }

    fn iterator<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> OrmResult<IndexIterator<'a>> {
        let it = prefix_iterator(store, &[self.prefix], start, end, reverse)?;
        Ok(IndexIterator::new(it, store, Arc::clone(&self.row_getter), self.shape))
    }
}

/// Empty strings and byte strings are never indexed.
pub(crate) fn is_empty_key(key: &KeyPart) -> bool {
    match key {
        KeyPart::Bytes(bytes) => bytes.is_empty(),
        KeyPart::Str(s) => s.is_empty(),
        KeyPart::Uint64(_) => false,
    }
}
