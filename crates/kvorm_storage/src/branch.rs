//! Write-buffering branch over a parent store.
//!
//! A [`BranchStore`] records writes in memory and only touches its parent
//! when committed. Reads and iterators observe the branch's own writes merged
//! over the parent, so callers can run a multi-step operation against the
//! branch and either commit it as a whole or drop it without a trace.

use crate::backend::{is_empty_range, BoxedIterator, EmptyIterator, KvIterator, KvRead, KvStore};
use crate::error::{StorageError, StorageResult};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::debug;

/// A store that buffers writes over a parent until committed.
///
/// # Example
///
/// ```rust
/// use kvorm_storage::{BranchStore, KvRead, KvStore, MemKvStore};
///
/// let mut store = MemKvStore::new();
/// let mut branch = BranchStore::new(&mut store);
/// branch.set(b"k", b"v").unwrap();
/// assert!(branch.has(b"k").unwrap());
/// branch.commit().unwrap();
///
/// assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Debug)]
pub struct BranchStore<S> {
    parent: S,
    /// `None` marks a pending delete.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<S> BranchStore<S> {
    /// Creates an empty branch over `parent`.
    pub fn new(parent: S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Returns the number of buffered writes and deletes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Drops every buffered write and returns the untouched parent.
    pub fn discard(self) -> S {
        if !self.writes.is_empty() {
            debug!(pending = self.writes.len(), "discarding branch");
        }
        self.parent
    }
}

impl<S: KvStore> BranchStore<S> {
    /// Applies the buffered writes to the parent in key order.
    ///
    /// Returns the parent store.
    pub fn commit(mut self) -> StorageResult<S> {
        let pending = self.writes.len();
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(value) => self.parent.set(&key, &value)?,
                None => self.parent.delete(&key)?,
            }
        }
        debug!(pending, "committed branch");
        Ok(self.parent)
    }
}

impl<S: KvRead> KvRead for BranchStore<S> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        match self.writes.get(key) {
            Some(value) => Ok(value.is_some()),
            None => self.parent.has(key),
        }
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        self.merged(start, end, false)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        self.merged(start, end, true)
    }
}

impl<S: KvRead> BranchStore<S> {
    fn merged<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> StorageResult<BoxedIterator<'a>> {
        if is_empty_range(start, end) {
            return Ok(Box::new(EmptyIterator));
        }
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        let range = self
            .writes
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.as_slice(), v.as_deref()));
        let parent = if reverse {
            self.parent.reverse_iterator(start, end)?
        } else {
            self.parent.iterator(start, end)?
        };
        let cache: CacheEntries<'a> = if reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };
        Ok(Box::new(MergeIterator::new(parent, cache, reverse)))
    }
}

impl<S: KvRead> KvStore for BranchStore<S> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }
}

/// Runs `f` against a fresh branch of `store`.
///
/// The branch is committed when `f` returns `Ok` and discarded otherwise, so
/// `store` either sees every write made by `f` or none of them.
///
/// # Errors
///
/// Returns the error of `f`, or the storage error raised while committing.
pub fn with_branch<S, T, E, F>(store: &mut S, f: F) -> Result<T, E>
where
    S: KvStore + ?Sized,
    E: From<StorageError>,
    F: FnOnce(&mut BranchStore<&mut S>) -> Result<T, E>,
{
    let mut branch = BranchStore::new(store);
    match f(&mut branch) {
        Ok(value) => {
            branch.commit()?;
            Ok(value)
        }
        Err(err) => {
            branch.discard();
            Err(err)
        }
    }
}

type CacheEntries<'a> = Box<dyn Iterator<Item = (&'a [u8], Option<&'a [u8]>)> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Parent,
    Cache,
    Exhausted,
}

/// Merges parent entries with buffered writes. Buffered entries shadow parent
/// entries with the same key; buffered deletes hide them.
struct MergeIterator<'a> {
    parent: BoxedIterator<'a>,
    cache: CacheEntries<'a>,
    head: Option<(&'a [u8], Option<&'a [u8]>)>,
    reverse: bool,
    source: Source,
}

impl<'a> MergeIterator<'a> {
    fn new(parent: BoxedIterator<'a>, mut cache: CacheEntries<'a>, reverse: bool) -> Self {
        let head = cache.next();
        let mut it = Self {
            parent,
            cache,
            head,
            reverse,
            source: Source::Exhausted,
        };
        it.settle();
        it
    }

    fn advance_cache(&mut self) {
        self.head = self.cache.next();
    }

    fn settle(&mut self) {
        loop {
            let Some((cache_key, cache_value)) = self.head else {
                self.source = if self.parent.valid() {
                    Source::Parent
                } else {
                    Source::Exhausted
                };
                return;
            };
            if !self.parent.valid() {
                if cache_value.is_some() {
                    self.source = Source::Cache;
                    return;
                }
                self.advance_cache();
                continue;
            }
            let mut order = self.parent.key().cmp(cache_key);
            if self.reverse {
                order = order.reverse();
            }
            match order {
                Ordering::Less => {
                    self.source = Source::Parent;
                    return;
                }
                Ordering::Equal if cache_value.is_none() => {
                    self.parent.next();
                    self.advance_cache();
                }
                Ordering::Greater if cache_value.is_none() => self.advance_cache(),
                Ordering::Equal | Ordering::Greater => {
                    self.source = Source::Cache;
                    return;
                }
            }
        }
    }
}

impl KvIterator for MergeIterator<'_> {
    fn valid(&self) -> bool {
        self.source != Source::Exhausted
    }

    fn key(&self) -> &[u8] {
        match (self.source, self.head) {
            (Source::Parent, _) => self.parent.key(),
            (Source::Cache, Some((key, _))) => key,
            _ => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match (self.source, self.head) {
            (Source::Parent, _) => self.parent.value(),
            (Source::Cache, Some((_, Some(value)))) => value,
            _ => &[],
        }
    }

    fn next(&mut self) {
        match self.source {
            Source::Exhausted => return,
            Source::Parent => self.parent.next(),
            Source::Cache => {
                if let Some((key, _)) = self.head {
                    if self.parent.valid() && self.parent.key() == key {
                        self.parent.next();
                    }
                }
                self.advance_cache();
            }
        }
        self.settle();
    }

    fn error(&self) -> Option<&StorageError> {
        self.parent.error()
    }

    fn close(&mut self) {
        self.parent.close();
        self.cache = Box::new(std::iter::empty());
        self.head = None;
        self.source = Source::Exhausted;
    }
}
