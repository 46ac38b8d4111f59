//! Prefix-scoped views onto a store.

use crate::backend::{BoxedIterator, KvIterator, KvRead, KvStore};
use crate::error::{StorageError, StorageResult};

/// Returns the shortest key strictly greater than every key starting with
/// `prefix`, or `None` when no such key exists (empty or all-`0xFF` prefix).
///
/// # Example
///
/// ```rust
/// use kvorm_storage::prefix_end;
///
/// assert_eq!(prefix_end(&[1, 2]), Some(vec![1, 3]));
/// assert_eq!(prefix_end(&[1, 0xFF]), Some(vec![2]));
/// assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
/// ```
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last != u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// A view onto a parent store that prepends a fixed prefix to every key.
///
/// Reads and writes are translated to `prefix ‖ key`. Iterators hide the
/// prefix from [`KvIterator::key`] and stop as soon as the parent leaves the
/// prefix domain.
///
/// `PrefixStore<&S>` is a read-only view, `PrefixStore<&mut S>` a writable one.
#[derive(Debug, Clone)]
pub struct PrefixStore<S> {
    parent: S,
    prefix: Vec<u8>,
}

impl<S> PrefixStore<S> {
    /// Creates a view of `parent` scoped to `prefix`.
    pub fn new(parent: S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix of this view.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Consumes the view and returns the parent store.
    pub fn into_inner(self) -> S {
        self.parent
    }

    fn full_key(&self, key: &[u8]) -> StorageResult<Vec<u8>> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        Ok(prefixed(&self.prefix, key))
    }
}

impl<S: KvRead> KvRead for PrefixStore<S> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.parent.get(&self.full_key(key)?)
    }

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        self.parent.has(&self.full_key(key)?)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        prefix_iterator(&self.parent, &self.prefix, start, end, false)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<BoxedIterator<'a>> {
        prefix_iterator(&self.parent, &self.prefix, start, end, true)
    }
}

impl<S: KvStore> KvStore for PrefixStore<S> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let key = self.full_key(key)?;
        self.parent.set(&key, value)
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        let key = self.full_key(key)?;
        self.parent.delete(&key)
    }
}

/// Opens an iterator over `[prefix ‖ start, prefix ‖ end)` of `parent`.
///
/// The returned iterator borrows `parent` directly, so it may outlive a
/// temporary [`PrefixStore`] built over the same parent. A `None` end bound
/// becomes [`prefix_end`] of the prefix.
pub fn prefix_iterator<'a, S: KvRead + ?Sized>(
    parent: &'a S,
    prefix: &[u8],
    start: Option<&[u8]>,
    end: Option<&[u8]>,
    reverse: bool,
) -> StorageResult<BoxedIterator<'a>> {
    let full_start = prefixed(prefix, start.unwrap_or_default());
    let full_end = match end {
        Some(end) => Some(prefixed(prefix, end)),
        None => prefix_end(prefix),
    };
    let start = (!full_start.is_empty()).then_some(full_start.as_slice());
    let inner = if reverse {
        parent.reverse_iterator(start, full_end.as_deref())?
    } else {
        parent.iterator(start, full_end.as_deref())?
    };
    Ok(Box::new(PrefixIterator {
        inner,
        prefix: prefix.to_vec(),
    }))
}

fn prefixed(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(key);
    full
}

/// Iterator that strips the prefix from parent keys.
struct PrefixIterator<'a> {
    inner: BoxedIterator<'a>,
    prefix: Vec<u8>,
}

impl KvIterator for PrefixIterator<'_> {
    fn valid(&self) -> bool {
        self.inner.valid() && self.inner.key().starts_with(&self.prefix)
    }

    fn key(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        &self.inner.key()[self.prefix.len()..]
    }

    fn value(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        self.inner.value()
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn error(&self) -> Option<&StorageError> {
        self.inner.error()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
