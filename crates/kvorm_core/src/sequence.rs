//! Persistent monotonic counters.

use crate::error::{OrmError, OrmResult};
use crate::key::{decode_sequence, encode_sequence};
use kvorm_storage::{KvRead, KvStore, PrefixStore};
use tracing::debug;

/// Fixed key of the counter inside the sequence prefix.
const SEQUENCE_STORAGE_KEY: [u8; 1] = [0x01];

/// A uint64 counter stored under `prefix ‖ 0x01`.
///
/// The stored value is the last issued id, so the first [`Sequence::next`]
/// on an empty store returns 1.
///
/// # Example
///
/// ```rust
/// use kvorm_core::Sequence;
/// use kvorm_storage::MemKvStore;
///
/// let seq = Sequence::new(0x01);
/// let mut store = MemKvStore::new();
/// assert_eq!(seq.next(&mut store).unwrap(), 1);
/// assert_eq!(seq.next(&mut store).unwrap(), 2);
/// assert_eq!(seq.peek(&store).unwrap(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    prefix: u8,
}

impl Sequence {
    /// Creates a sequence under `prefix`.
    #[must_use]
    pub const fn new(prefix: u8) -> Self {
        Self { prefix }
    }

    /// Returns the prefix byte.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Increments the counter and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidOperation`] if the counter would overflow.
    pub fn next(&self, store: &mut dyn KvStore) -> OrmResult<u64> {
        let next = self
            .current(&*store)?
            .checked_add(1)
            .ok_or_else(|| OrmError::invalid_operation("sequence exhausted"))?;
        self.write(store, next)?;
        Ok(next)
    }

    /// Returns the last issued value, 0 if none was issued.
    pub fn current(&self, store: &dyn KvRead) -> OrmResult<u64> {
        let view = PrefixStore::new(store, vec![self.prefix]);
        let bytes = view.get(&SEQUENCE_STORAGE_KEY)?.unwrap_or_default();
        decode_sequence(&bytes)
    }

    /// Returns the value the next call to [`Sequence::next`] will issue.
    pub fn peek(&self, store: &dyn KvRead) -> OrmResult<u64> {
        self.current(store)?
            .checked_add(1)
            .ok_or_else(|| OrmError::invalid_operation("sequence exhausted"))
    }

    /// Sets the initial value.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UniqueConstraint`] if a value is already stored.
    pub fn init(&self, store: &mut dyn KvStore, value: u64) -> OrmResult<()> {
        let exists = PrefixStore::new(&*store, vec![self.prefix]).has(&SEQUENCE_STORAGE_KEY)?;
        if exists {
            return Err(OrmError::UniqueConstraint);
        }
        debug!(prefix = self.prefix, value, "initialising sequence");
        self.write(store, value)
    }

    /// Overwrites the stored value.
    pub(crate) fn write(&self, store: &mut dyn KvStore, value: u64) -> OrmResult<()> {
        let mut view = PrefixStore::new(store, vec![self.prefix]);
        view.set(&SEQUENCE_STORAGE_KEY, &encode_sequence(value))?;
        Ok(())
    }
}
