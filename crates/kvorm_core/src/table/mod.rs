//! Tables: typed namespaces mapping row ids to records.
//!
//! [`Table`] is the type-erased core. [`AutoUInt64Table`] and
//! [`PrimaryKeyTable`] are typed facades that derive row ids from a sequence
//! or from the record itself.

mod auto_uint64;
mod primary_key;

pub use auto_uint64::AutoUInt64Table;
pub use primary_key::PrimaryKeyTable;

use crate::error::{OrmError, OrmResult};
use crate::iterator::TableIterator;
use crate::key::prefix_range;
use crate::model::{ModelType, Record};
use crate::types::RowId;
use kvorm_storage::{prefix_iterator, KvIterator, KvRead, KvStore, PrefixStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Called after a record was written: `(store, row_id, new, old)`.
///
/// `old` is `None` when the row did not exist before.
pub type AfterSetInterceptor = Box<
    dyn Fn(&mut dyn KvStore, &RowId, &dyn Record, Option<&dyn Record>) -> OrmResult<()>
        + Send
        + Sync,
>;

/// Called after a record was deleted: `(store, row_id, old)`.
pub type AfterDeleteInterceptor =
    Box<dyn Fn(&mut dyn KvStore, &RowId, &dyn Record) -> OrmResult<()> + Send + Sync>;

/// Loads the record stored under a row id into a destination.
pub type RowGetter =
    Arc<dyn Fn(&dyn KvRead, &RowId, &mut dyn Record) -> OrmResult<()> + Send + Sync>;

/// A table that secondary indexes can be attached to.
pub trait Indexable {
    /// Returns a closure that loads rows of this table.
    fn row_getter(&self) -> RowGetter;

    /// Returns the model type bound to the table.
    fn model_type(&self) -> ModelType;

    /// Returns the table prefix.
    fn table_prefix(&self) -> [u8; 2];

    /// Returns the sequence prefix byte, if the table owns a sequence.
    fn sequence_prefix(&self) -> Option<u8> {
        None
    }

    /// Registers an interceptor fired after every set.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidOperation`] once the table has been written.
    fn add_after_set_interceptor(&mut self, interceptor: AfterSetInterceptor) -> OrmResult<()>;

    /// Registers an interceptor fired after every delete.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidOperation`] once the table has been written.
    fn add_after_delete_interceptor(&mut self, interceptor: AfterDeleteInterceptor)
        -> OrmResult<()>;
}

/// Type-erased table core.
///
/// Rows live at `prefix ‖ row_id`. Every write runs, in order: type check,
/// record validation, the raw store write, then the registered interceptors
/// in registration order.
///
/// The raw write is not undone when an interceptor fails. Run mutations
/// inside an enclosing transaction such as
/// [`with_branch`](kvorm_storage::with_branch) and discard it on error to
/// keep the table and its indexes consistent.
pub struct Table {
    prefix: [u8; 2],
    model: ModelType,
    after_set: Vec<AfterSetInterceptor>,
    after_delete: Vec<AfterDeleteInterceptor>,
    sealed: AtomicBool,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("prefix", &self.prefix)
            .field("model", &self.model.name())
            .field("after_set", &self.after_set.len())
            .field("after_delete", &self.after_delete.len())
            .finish()
    }
}

impl Table {
    /// Creates a table for records of type `model` under `prefix`.
    #[must_use]
    pub fn new(prefix: [u8; 2], model: ModelType) -> Self {
        Self {
            prefix,
            model,
            after_set: Vec::new(),
            after_delete: Vec::new(),
            sealed: AtomicBool::new(false),
        }
    }

    /// Returns the table prefix.
    #[must_use]
    pub fn prefix(&self) -> [u8; 2] {
        self.prefix
    }

    /// Returns the bound model type.
    #[must_use]
    pub fn model(&self) -> ModelType {
        self.model
    }

    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    fn ensure_unsealed(&self) -> OrmResult<()> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(OrmError::invalid_operation(
                "interceptors must be registered before the first write",
            ));
        }
        Ok(())
    }

    /// Writes `obj` under a new row id.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UniqueConstraint`] if the row exists, plus every
    /// error of [`Table::set`].
    pub fn create(&self, store: &mut dyn KvStore, row_id: &RowId, obj: &dyn Record) -> OrmResult<()> {
        if self.has(&*store, row_id)? {
            return Err(OrmError::UniqueConstraint);
        }
        self.set(store, row_id, obj)
    }

    /// Writes `obj` under an existing row id.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the row does not exist, plus every
    /// error of [`Table::set`].
    pub fn update(&self, store: &mut dyn KvStore, row_id: &RowId, obj: &dyn Record) -> OrmResult<()> {
        if !self.has(&*store, row_id)? {
            return Err(OrmError::NotFound);
        }
        self.set(store, row_id, obj)
    }

    /// Creates or replaces the row and fires the after-set interceptors.
    ///
    /// # Errors
    ///
    /// - [`OrmError::EmptyKey`] for an empty row id
    /// - [`OrmError::InvalidType`] if `obj` is not of the bound type
    /// - any validation, codec, storage or interceptor error
    pub fn set(&self, store: &mut dyn KvStore, row_id: &RowId, obj: &dyn Record) -> OrmResult<()> {
        if row_id.is_empty() {
            return Err(OrmError::EmptyKey);
        }
        self.model.check(obj)?;
        obj.validate_basic()?;

        let encoded = obj.marshal()?;
        let old = {
            let mut data = PrefixStore::new(&mut *store, self.prefix.to_vec());
            let old = match data.get(row_id.as_bytes())? {
                Some(bytes) => Some(self.model.decode(&bytes)?),
                None => None,
            };
            data.set(row_id.as_bytes(), &encoded)?;
            old
        };
        self.seal();
        trace!(table = ?self.prefix, row = %row_id, len = encoded.len(), replaced = old.is_some(), "set row");

        for (position, interceptor) in self.after_set.iter().enumerate() {
            interceptor(&mut *store, row_id, obj, old.as_deref()).inspect_err(|err| {
                debug!(table = ?self.prefix, row = %row_id, position, %err, "after-set interceptor failed");
            })?;
        }
        Ok(())
    }

    /// Deletes the row and fires the after-delete interceptors.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the row does not exist, or any
    /// storage or interceptor error.
    pub fn delete(&self, store: &mut dyn KvStore, row_id: &RowId) -> OrmResult<()> {
        if row_id.is_empty() {
            return Err(OrmError::NotFound);
        }
        let old = {
            let mut data = PrefixStore::new(&mut *store, self.prefix.to_vec());
            let bytes = data.get(row_id.as_bytes())?.ok_or(OrmError::NotFound)?;
            let old = self.model.decode(&bytes)?;
            data.delete(row_id.as_bytes())?;
            old
        };
        self.seal();
        trace!(table = ?self.prefix, row = %row_id, "deleted row");

        for (position, interceptor) in self.after_delete.iter().enumerate() {
            interceptor(&mut *store, row_id, &*old).inspect_err(|err| {
                debug!(table = ?self.prefix, row = %row_id, position, %err, "after-delete interceptor failed");
            })?;
        }
        Ok(())
    }

    /// Returns `true` if a row is stored under exactly `row_id`.
    ///
    /// The check opens an iterator over the prefix range of `row_id` so that
    /// metered stores account for it like any other scan.
    pub fn has(&self, store: &dyn KvRead, row_id: &RowId) -> OrmResult<bool> {
        if row_id.is_empty() {
            return Ok(false);
        }
        let (start, end) = prefix_range(row_id.as_bytes())?;
        let it = prefix_iterator(store, &self.prefix, Some(start.as_slice()), end.as_deref(), false)?;
        Ok(it.valid() && it.key() == row_id.as_bytes())
    }

    /// Loads the row into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if the row does not exist and
    /// [`OrmError::InvalidType`] if `dest` is not of the bound type.
    pub fn get_one(&self, store: &dyn KvRead, row_id: &RowId, dest: &mut dyn Record) -> OrmResult<()> {
        load_row(store, &self.prefix, self.model, row_id, dest)
    }

    /// Returns a closure that loads rows of this table.
    #[must_use]
    pub fn row_getter(&self) -> RowGetter {
        let prefix = self.prefix;
        let model = self.model;
        Arc::new(move |store, row_id, dest| load_row(store, &prefix, model, row_id, dest))
    }

    /// Iterates rows with `start <= row_id < end`. `None` leaves a side open.
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
        self.scan(store, start, end, false)
    }

    /// Like [`Table::prefix_scan`], in descending row id order.
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
        self.scan(store, start, end, true)
    }

    fn scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> OrmResult<TableIterator<'a>> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(OrmError::invalid_argument("start must be less than end"));
            }
        }
        let it = prefix_iterator(store, &self.prefix, start, end, reverse)?;
        Ok(TableIterator::new(it, self.model))
    }

    /// Returns every row id of the table in ascending order.
    pub(crate) fn row_ids(&self, store: &dyn KvRead) -> OrmResult<Vec<RowId>> {
        let mut it = prefix_iterator(store, &self.prefix, None, None, false)?;
        let mut rows = Vec::new();
        while it.valid() {
            rows.push(RowId::from(it.key()));
            it.next();
        }
        if let Some(err) = it.error() {
            return Err(err.clone().into());
        }
        Ok(rows)
    }

    /// Deletes every row, firing the after-delete interceptors.
    pub(crate) fn clear(&self, store: &mut dyn KvStore) -> OrmResult<()> {
        for row_id in self.row_ids(&*store)? {
            self.delete(store, &row_id)?;
        }
        Ok(())
    }
}

fn load_row(
    store: &dyn KvRead,
    prefix: &[u8],
    model: ModelType,
    row_id: &RowId,
    dest: &mut dyn Record,
) -> OrmResult<()> {
    if row_id.is_empty() {
        return Err(OrmError::NotFound);
    }
    model.check(dest)?;
    let bytes = PrefixStore::new(store, prefix.to_vec())
        .get(row_id.as_bytes())?
        .ok_or(OrmError::NotFound)?;
    dest.unmarshal(&bytes)
}

impl Indexable for Table {
    fn row_getter(&self) -> RowGetter {
        Table::row_getter(self)
    }

    fn model_type(&self) -> ModelType {
        self.model
    }

    fn table_prefix(&self) -> [u8; 2] {
        self.prefix
    }

    fn add_after_set_interceptor(&mut self, interceptor: AfterSetInterceptor) -> OrmResult<()> {
        self.ensure_unsealed()?;
        self.after_set.push(interceptor);
        Ok(())
    }

    fn add_after_delete_interceptor(
        &mut self,
        interceptor: AfterDeleteInterceptor,
    ) -> OrmResult<()> {
        self.ensure_unsealed()?;
        self.after_delete.push(interceptor);
        Ok(())
    }
}
