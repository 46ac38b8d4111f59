//! Tables keyed by the primary key of their records.

use super::{AfterDeleteInterceptor, AfterSetInterceptor, Indexable, RowGetter, Table};
use crate::error::{OrmError, OrmResult};
use crate::iterator::{RecordIterator, TableIterator};
use crate::model::{primary_key, ModelType, PrimaryKeyed, Record};
use crate::types::RowId;
use kvorm_storage::{KvRead, KvStore};
use std::marker::PhantomData;
use tracing::debug;

/// A table whose row id is the encoded primary key of each record.
pub struct PrimaryKeyTable<T> {
    table: Table,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for PrimaryKeyTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryKeyTable")
            .field("table", &self.table)
            .finish()
    }
}

impl<T: PrimaryKeyed> PrimaryKeyTable<T> {
    /// Creates the table under `prefix`.
    #[must_use]
    pub fn new(prefix: [u8; 2]) -> Self {
        Self {
            table: Table::new(prefix, ModelType::of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Returns the underlying table core.
    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Inserts `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UniqueConstraint`] if its primary key exists.
    pub fn create(&self, store: &mut dyn KvStore, obj: &T) -> OrmResult<()> {
        self.table.create(store, &primary_key(obj)?, obj)
    }

    /// Replaces the stored record with the same primary key.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the primary key does not exist.
    pub fn update(&self, store: &mut dyn KvStore, obj: &T) -> OrmResult<()> {
        self.table.update(store, &primary_key(obj)?, obj)
    }

    /// Replaces the record stored under `key` with `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if the primary key of `obj`
    /// differs from `key`, and [`OrmError::NotFound`] if `key` does not exist.
    pub fn update_by_key(&self, store: &mut dyn KvStore, key: &RowId, obj: &T) -> OrmResult<()> {
        if primary_key(obj)? != *key {
            return Err(OrmError::invalid_argument(
                "primary key of the record does not match the updated key",
            ));
        }
        self.table.update(store, key, obj)
    }

    /// Inserts or replaces `obj`.
    pub fn set(&self, store: &mut dyn KvStore, obj: &T) -> OrmResult<()> {
        self.table.set(store, &primary_key(obj)?, obj)
    }

    /// Deletes the record with the primary key of `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the primary key does not exist.
    pub fn delete(&self, store: &mut dyn KvStore, obj: &T) -> OrmResult<()> {
        self.table.delete(store, &primary_key(obj)?)
    }

    /// Returns `true` if a record is stored under `key`.
    pub fn has(&self, store: &dyn KvRead, key: &RowId) -> OrmResult<bool> {
        self.table.has(store, key)
    }

    /// Returns `true` if `obj` is of the bound type and its primary key
    /// exists.
    pub fn contains(&self, store: &dyn KvRead, obj: &dyn Record) -> OrmResult<bool> {
        let Some(obj) = obj.as_any().downcast_ref::<T>() else {
            return Ok(false);
        };
        self.table.has(store, &primary_key(obj)?)
    }

    /// Loads the record stored under `key` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if no such record exists.
    pub fn get_one(&self, store: &dyn KvRead, key: &RowId, dest: &mut T) -> OrmResult<()> {
        self.table.get_one(store, key, dest)
    }

    /// Iterates records whose primary key lies in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start >= end`.
    pub fn prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> OrmResult<TableIterator<'a>> {
        self.table.prefix_scan(store, start, end)
    }

    /// Like [`PrimaryKeyTable::prefix_scan`], in descending key order.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start >= end`.
    pub fn reverse_prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> OrmResult<TableIterator<'a>> {
        self.table.reverse_prefix_scan(store, start, end)
    }

    /// Returns every record in primary key order.
    pub fn export(&self, store: &dyn KvRead) -> OrmResult<Vec<T>> {
        let mut it = self.table.prefix_scan(store, None, None)?;
        let mut records = Vec::<T>::new();
        crate::iterator::read_all(&mut it, &mut records)?;
        Ok(records)
    }

    /// Replaces the table content with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UniqueConstraint`] if two records share a primary
    /// key.
    pub fn import(&self, store: &mut dyn KvStore, records: &[T]) -> OrmResult<()> {
        self.table.clear(store)?;
        for record in records {
            self.create(store, record)?;
        }
        debug!(table = ?self.table.prefix(), rows = records.len(), "imported primary-key table");
        Ok(())
    }

    /// Returns the first record of a scan, or `None` if it is empty.
    pub fn first(&self, it: &mut dyn RecordIterator) -> OrmResult<Option<T>> {
        let mut dest = T::default();
        match crate::iterator::first(it, &mut dest) {
            Ok(_) => Ok(Some(dest)),
            Err(OrmError::IteratorDone) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<T: PrimaryKeyed> Indexable for PrimaryKeyTable<T> {
    fn row_getter(&self) -> RowGetter {
        self.table.row_getter()
    }

    fn model_type(&self) -> ModelType {
        self.table.model()
    }

    fn table_prefix(&self) -> [u8; 2] {
        self.table.prefix()
    }

    fn add_after_set_interceptor(&mut self, interceptor: AfterSetInterceptor) -> OrmResult<()> {
        self.table.add_after_set_interceptor(interceptor)
    }

    fn add_after_delete_interceptor(
        &mut self,
        interceptor: AfterDeleteInterceptor,
    ) -> OrmResult<()> {
        self.table.add_after_delete_interceptor(interceptor)
    }
}
