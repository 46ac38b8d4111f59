//! Lazy record iteration.
//!
//! A [`RecordIterator`] decodes one record per [`RecordIterator::load_next`]
//! call and signals the end with [`OrmError::IteratorDone`]. Iterators are
//! single-pass and release their store cursor on [`RecordIterator::close`]
//! or drop.

use crate::error::{OrmError, OrmResult};
use crate::model::{Model, ModelType, Record};
use crate::types::RowId;
use kvorm_storage::BoxedIterator;

/// A lazy, single-pass sequence of records.
pub trait RecordIterator {
    /// Decodes the next record into `dest` and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::IteratorDone`] once exhausted and
    /// [`OrmError::InvalidIterator`] after [`RecordIterator::close`].
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId>;

    /// Releases the iterator. Later calls to `load_next` fail.
    fn close(&mut self);
}

impl<I: RecordIterator + ?Sized> RecordIterator for &mut I {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        (**self).load_next(dest)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

impl<I: RecordIterator + ?Sized> RecordIterator for Box<I> {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        (**self).load_next(dest)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Iterates the rows of one table over a raw store cursor.
pub struct TableIterator<'a> {
    inner: Option<BoxedIterator<'a>>,
    model: ModelType,
}

impl std::fmt::Debug for TableIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableIterator")
            .field("model", &self.model.name())
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl<'a> TableIterator<'a> {
    pub(crate) fn new(inner: BoxedIterator<'a>, model: ModelType) -> Self {
        Self {
            inner: Some(inner),
            model,
        }
    }
}

impl RecordIterator for TableIterator<'_> {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        let inner = self.inner.as_mut().ok_or(OrmError::InvalidIterator)?;
        self.model.check(dest)?;
        if !inner.valid() {
            if let Some(err) = inner.error() {
                return Err(err.clone().into());
            }
            return Err(OrmError::IteratorDone);
        }
        let row_id = RowId::from(inner.key());
        dest.unmarshal(inner.value())?;
        inner.next();
        Ok(row_id)
    }

    fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
    }
}

/// Yields at most `max` records of its parent.
pub struct LimitIterator<I> {
    parent: I,
    remaining: usize,
}

impl<I: RecordIterator> LimitIterator<I> {
    /// Wraps `parent`. A `max` of zero yields nothing.
    pub fn new(parent: I, max: usize) -> Self {
        Self {
            parent,
            remaining: max,
        }
    }

    /// Returns the number of records still allowed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<I: RecordIterator> RecordIterator for LimitIterator<I> {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        if self.remaining == 0 {
            return Err(OrmError::IteratorDone);
        }
        let row_id = self.parent.load_next(dest)?;
        self.remaining -= 1;
        Ok(row_id)
    }

    fn close(&mut self) {
        self.parent.close();
    }
}

/// Yields one encoded record, then ends.
#[derive(Debug)]
pub struct SingleValueIterator {
    entry: Option<(RowId, Vec<u8>)>,
    closed: bool,
}

impl SingleValueIterator {
    /// Creates an iterator over `(row_id, encoded)`.
    pub fn new(row_id: RowId, encoded: Vec<u8>) -> Self {
        Self {
            entry: Some((row_id, encoded)),
            closed: false,
        }
    }
}

impl RecordIterator for SingleValueIterator {
    fn load_next(&mut self, dest: &mut dyn Record) -> OrmResult<RowId> {
        if self.closed {
            return Err(OrmError::InvalidIterator);
        }
        let (row_id, encoded) = self.entry.take().ok_or(OrmError::IteratorDone)?;
        dest.unmarshal(&encoded)?;
        Ok(row_id)
    }

    fn close(&mut self) {
        self.closed = true;
        self.entry = None;
    }
}

/// An iterator that fails every call with [`OrmError::InvalidIterator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InvalidIterator;

impl RecordIterator for InvalidIterator {
    fn load_next(&mut self, _dest: &mut dyn Record) -> OrmResult<RowId> {
        Err(OrmError::InvalidIterator)
    }

    fn close(&mut self) {}
}

/// Loads the first record into `dest` and closes the iterator.
///
/// # Errors
///
/// Returns [`OrmError::IteratorDone`] if the iterator is empty.
pub fn first<I: RecordIterator + ?Sized>(it: &mut I, dest: &mut dyn Record) -> OrmResult<RowId> {
    let result = it.load_next(dest);
    it.close();
    result
}

/// A growable destination for decoded records of type `T`.
///
/// Implemented for `Vec<T>` and `Vec<Box<T>>`.
pub trait RecordSlice<T: Model> {
    /// Appends a record.
    fn push_record(&mut self, record: T);
}

impl<T: Model> RecordSlice<T> for Vec<T> {
    fn push_record(&mut self, record: T) {
        self.push(record);
    }
}

impl<T: Model> RecordSlice<T> for Vec<Box<T>> {
    fn push_record(&mut self, record: T) {
        self.push(Box::new(record));
    }
}

/// Appends every remaining record to `dest` and closes the iterator.
///
/// # Errors
///
/// Propagates any error other than [`OrmError::IteratorDone`]; records
/// decoded before the error stay in `dest`.
pub fn read_all<T, S, I>(it: &mut I, dest: &mut S) -> OrmResult<()>
where
    T: Model,
    S: RecordSlice<T> + ?Sized,
    I: RecordIterator + ?Sized,
{
    let result = loop {
        let mut record = T::default();
        match it.load_next(&mut record) {
            Ok(_) => dest.push_record(record),
            Err(OrmError::IteratorDone) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    it.close();
    result
}
