//! Operation counters for a wrapped store.
//!
//! [`MeteredStore`] forwards every call to its inner store and records it in a
//! shared [`StoreStats`]. Counters are atomic and can be read while the store
//! is in use, e.g. to assert how many store reads a lookup performed.

use crate::backend::{BoxedIterator, KvIterator, KvRead, KvStore};
use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Store operation counters.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Point reads (`get` and `has`).
    reads: AtomicU64,
    /// `set` calls.
    writes: AtomicU64,
    /// `delete` calls.
    deletes: AtomicU64,
    /// Iterators opened, in either direction.
    iterators: AtomicU64,
    /// `next` calls on iterators.
    iterator_steps: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl StoreStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_iterator(&self) {
        self.iterators.fetch_add(1, Ordering::Relaxed);
    }

    fn record_step(&self) {
        self.iterator_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of point reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of deletes.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of iterators opened.
    pub fn iterators(&self) -> u64 {
        self.iterators.load(Ordering::Relaxed)
    }

    /// Returns the number of iterator advances.
    pub fn iterator_steps(&self) -> u64 {
        self.iterator_steps.load(Ordering::Relaxed)
    }

    /// Returns the value bytes returned by point reads.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the key and value bytes passed to writes.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            iterators: self.iterators(),
            iterator_steps: self.iterator_steps(),
            bytes_read: self.bytes_read(),
            bytes_written: self.bytes_written(),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Point reads.
    pub reads: u64,
    /// Writes.
    pub writes: u64,
    /// Deletes.
    pub deletes: u64,
    /// Iterators opened.
    pub iterators: u64,
    /// Iterator advances.
    pub iterator_steps: u64,
    /// Value bytes read.
    pub bytes_read: u64,
    /// Key and value bytes written.
    pub bytes_written: u64,
}

/// A store wrapper that counts operations.
#[derive(Debug)]
pub struct MeteredStore<S> {
    inner: S,
    stats: Arc<StoreStats>,
}

impl<S> MeteredStore<S> {
    /// Wraps `inner` with fresh counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: Arc::new(StoreStats::new()),
        }
    }

    /// Returns a handle to the counters.
    #[must_use]
    pub fn stats(&self) -> Arc<StoreStats> {
        Arc::clone(&self.stats)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: KvRead> KvRead for MeteredStore<S> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let value = self.inner.get(key)?;
        let len = value.as_ref().map_or(0, Vec::len);
        self.stats.record_read(len as u64);
        Ok(value)
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        self.stats.record_read(0);
        self.inner.has(key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        self.stats.record_iterator();
        let inner = self.inner.iterator(start, end)?;
        Ok(Box::new(MeteredIterator {
            inner,
            stats: &self.stats,
        }))
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        self.stats.record_iterator();
        let inner = self.inner.reverse_iterator(start, end)?;
        Ok(Box::new(MeteredIterator {
            inner,
            stats: &self.stats,
        }))
    }
}

impl<S: KvStore> KvStore for MeteredStore<S> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.set(key, value)?;
        self.stats.record_write((key.len() + value.len()) as u64);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.inner.delete(key)?;
        self.stats.record_delete();
        Ok(())
    }
}

struct MeteredIterator<'a> {
    inner: BoxedIterator<'a>,
    stats: &'a StoreStats,
}

impl KvIterator for MeteredIterator<'_> {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }

    fn next(&mut self) {
        self.stats.record_step();
        self.inner.next();
    }

    fn error(&self) -> Option<&StorageError> {
        self.inner.error()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
