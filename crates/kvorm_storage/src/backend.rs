//! Key/value store contract.

use crate::error::{StorageError, StorageResult};

/// An owned, type-erased iterator borrowing a store for `'a`.
pub type BoxedIterator<'a> = Box<dyn KvIterator + 'a>;

/// A cursor over a half-open key range of a [`KvRead`] store.
///
/// Iterators are finite and single-pass. They borrow the store they were
/// created from, so the store cannot be written while an iterator exists.
/// Dropping an iterator releases it; [`KvIterator::close`] releases it early.
///
/// `key` and `value` must only be read while `valid` returns `true`;
/// implementations return an empty slice otherwise.
pub trait KvIterator {
    /// Returns `true` while the iterator points at an entry.
    fn valid(&self) -> bool;

    /// Returns the key of the current entry.
    fn key(&self) -> &[u8];

    /// Returns the value of the current entry.
    fn value(&self) -> &[u8];

    /// Advances to the next entry in iteration order.
    fn next(&mut self);

    /// Returns the error that stopped iteration, if any.
    fn error(&self) -> Option<&StorageError> {
        None
    }

    /// Releases the iterator. A closed iterator is never valid.
    fn close(&mut self);
}

/// Read access to an ordered, byte-keyed store.
///
/// # Invariants
///
/// - Keys are ordered lexicographically by their bytes
/// - Ranges are half-open: `start` inclusive, `end` exclusive
/// - `None` on either bound means "unbounded in that direction"
/// - An empty range (`start >= end`) yields an immediately invalid iterator
pub trait KvRead {
    /// Reads the value stored under `key`, `None` if absent.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Returns `true` if a value is stored under `key`.
    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterates `[start, end)` in ascending key order.
    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>>;

    /// Iterates `[start, end)` in descending key order.
    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>>;
}

/// Read-write access to an ordered, byte-keyed store.
pub trait KvStore: KvRead {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EmptyKey`] if `key` is empty.
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn delete(&mut self, key: &[u8]) -> StorageResult<()>;
}

impl<T: KvRead + ?Sized> KvRead for &T {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        (**self).has(key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).iterator(start, end)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).reverse_iterator(start, end)
    }
}

impl<T: KvRead + ?Sized> KvRead for &mut T {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        (**self).has(key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).iterator(start, end)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).reverse_iterator(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        (**self).delete(key)
    }
}

impl<T: KvRead + ?Sized> KvRead for Box<T> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        (**self).has(key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).iterator(start, end)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        (**self).reverse_iterator(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        (**self).delete(key)
    }
}

/// Returns `true` when `[start, end)` cannot contain any key.
pub(crate) fn is_empty_range(start: Option<&[u8]>, end: Option<&[u8]>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start >= end,
        _ => false,
    }
}

/// An iterator that is invalid from the start.
#[derive(Debug, Default)]
pub struct EmptyIterator;

impl KvIterator for EmptyIterator {
    fn valid(&self) -> bool {
        false
    }

    fn key(&self) -> &[u8] {
        &[]
    }

    fn value(&self) -> &[u8] {
        &[]
    }

    fn next(&mut self) {}

    fn close(&mut self) {}
}
