//! Iteration over index entries.

use crate::error::{OrmError, OrmResult};
use crate::iterator::RecordIterator;
use crate::key::{strip_row_id, KeyShape};
use crate::model::Record;
use crate::table::RowGetter;
use crate::types::RowId;
use kvorm_storage::{BoxedIterator, KvRead};

/// Resolves index entries to the records they point at.
///
/// Each entry key is `encoded_index_key ‖ row_id`; the row id is recovered
/// by stripping the index key according to its shape and handed to the
/// table's row getter.
pub struct IndexIterator<'a> {
    it: Option<BoxedIterator<'a>>,
    store: &'a dyn KvRead,
    row_getter: RowGetter,
    shape: KeyShape,
}

impl std::fmt::Debug for IndexIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexIterator")
            .field("shape", &self.shape)
            .field("open", &self.it.is_some())
            .finish()
    }
}

impl<'a> IndexIterator<'a> {
    pub(crate) fn new(
        it: BoxedIterator<'a>,
        store: &'a dyn KvRead,
        row_getter: RowGetter,
        shape: KeyShape,
    ) -> Self {
        Self {
            it: Some(it),
            store,
            row_getter,
            shape,
        }
    }
}

impl RecordIterator for IndexIterator<'_> {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        let it = self.it.as_mut().ok_or(OrmError::InvalidIterator)?;
        if !it.valid() {
            if let Some(err) = it.error() {
                return Err(err.clone().into());
            }
            return Err(OrmError::IteratorDone);
        }
        let row_id = RowId::from(strip_row_id(it.key(), self.shape)?);
        it.next();
        (self.row_getter)(self.store, &row_id, dest)?;
        Ok(row_id)
    }

    fn close(&mut self) {
        if let Some(mut it) = self.it.take() {
            it.close();
        }
    }
}
