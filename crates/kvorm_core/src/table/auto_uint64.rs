//! Tables keyed by a persistent auto-incrementing id.

use super::{AfterDeleteInterceptor, AfterSetInterceptor, Indexable, RowGetter, Table};
use crate::error::{OrmError, OrmResult};
use crate::iterator::{RecordIterator, TableIterator};
use crate::key::encode_sequence;
use crate::model::{Model, ModelType};
use crate::sequence::Sequence;
use crate::types::RowId;
use kvorm_storage::{KvRead, KvStore};
use std::marker::PhantomData;
use tracing::debug;

/// A table whose row ids are issued by a [`Sequence`].
///
/// Rows live at `prefix ‖ encode_u64(id)`, the counter at
/// `prefix_seq ‖ 0x01`. Ids start at 1.
///
/// # Example
///
/// ```rust
/// use kvorm_core::{AutoUInt64Table, Model};
/// use kvorm_storage::MemKvStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Entry {
///     text: String,
/// }
///
/// impl Model for Entry {}
///
/// let table = AutoUInt64Table::<Entry>::new([0x01, 0x00], 0x02).unwrap();
/// let mut store = MemKvStore::new();
/// let id = table.create(&mut store, &Entry { text: "hi".into() }).unwrap();
/// assert_eq!(id, 1);
/// assert_eq!(table.get(&store, id).unwrap().text, "hi");
/// ```
pub struct AutoUInt64Table<T> {
    table: Table,
    seq: Sequence,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for AutoUInt64Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUInt64Table")
            .field("table", &self.table)
            .field("seq", &self.seq)
            .finish()
    }
}

impl<T: Model> AutoUInt64Table<T> {
    /// Creates the table.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `prefix_seq` equals the
    /// first byte of `prefix`.
    pub fn new(prefix: [u8; 2], prefix_seq: u8) -> OrmResult<Self> {
        if prefix_seq == prefix[0] {
            return Err(OrmError::invalid_argument(
                "sequence prefix must differ from the table prefix",
            ));
        }
        Ok(Self {
            table: Table::new(prefix, ModelType::of::<T>()),
            seq: Sequence::new(prefix_seq),
            _marker: PhantomData,
        })
    }

    /// Returns the underlying table core.
    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Returns the id sequence.
    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.seq
    }

    /// Stores `obj` under the next id and returns it.
    ///
    /// The id is consumed even if the write fails afterwards; discard the
    /// enclosing transaction to give it back.
    pub fn create(&self, store: &mut dyn KvStore, obj: &T) -> OrmResult<u64> {
        let id = self.seq.next(store)?;
        self.table.create(store, &RowId::from_u64(id), obj)?;
        Ok(id)
    }

    /// Replaces the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if no such row exists.
    pub fn update(&self, store: &mut dyn KvStore, id: u64, obj: &T) -> OrmResult<()> {
        self.table.update(store, &RowId::from_u64(id), obj)
    }

    /// Deletes the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if no such row exists.
    pub fn delete(&self, store: &mut dyn KvStore, id: u64) -> OrmResult<()> {
        self.table.delete(store, &RowId::from_u64(id))
    }

    /// Returns `true` if a record is stored under `id`.
    pub fn has(&self, store: &dyn KvRead, id: u64) -> OrmResult<bool> {
        self.table.has(store, &RowId::from_u64(id))
    }

    /// Loads the record stored under `id` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if no such row exists.
    pub fn get_one(&self, store: &dyn KvRead, id: u64, dest: &mut T) -> OrmResult<()> {
        self.table.get_one(store, &RowId::from_u64(id), dest)
    }

    /// Returns the record stored under `id`.
    pub fn get(&self, store: &dyn KvRead, id: u64) -> OrmResult<T> {
        let mut dest = T::default();
        self.get_one(store, id, &mut dest)?;
        Ok(dest)
    }

    /// Iterates records with `start_id <= id < end_id` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start_id >= end_id`.
    pub fn prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start_id: u64,
        end_id: u64,
    ) -> OrmResult<TableIterator<'a>> {
        check_id_range(start_id, end_id)?;
        self.table.prefix_scan(
            store,
            Some(encode_sequence(start_id).as_slice()),
            Some(encode_sequence(end_id).as_slice()),
        )
    }

    /// Iterates records with `start_id <= id < end_id` in descending order.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if `start_id >= end_id`.
    pub fn reverse_prefix_scan<'a>(
        &self,
        store: &'a dyn KvRead,
        start_id: u64,
        end_id: u64,
    ) -> OrmResult<TableIterator<'a>> {
        check_id_range(start_id, end_id)?;
        self.table.reverse_prefix_scan(
            store,
            Some(encode_sequence(start_id).as_slice()),
            Some(encode_sequence(end_id).as_slice()),
        )
    }

    /// Returns every `(id, record)` pair and the current sequence value.
    pub fn export(&self, store: &dyn KvRead) -> OrmResult<(Vec<(u64, T)>, u64)> {
        let mut it = self.table.prefix_scan(store, None, None)?;
        let mut rows = Vec::new();
        loop {
            let mut record = T::default();
            match it.load_next(&mut record) {
                Ok(row_id) => rows.push((row_id.to_u64()?, record)),
                Err(OrmError::IteratorDone) => break,
                Err(err) => return Err(err),
            }
        }
        it.close();
        Ok((rows, self.seq.current(store)?))
    }

    /// Replaces the table content with `rows` and initialises the sequence
    /// to `seq_value`.
    ///
    /// Existing rows are deleted first so attached indexes stay in sync.
    ///
    /// # Errors
    ///
    /// - [`OrmError::InvalidArgument`] if an id is zero or above `seq_value`
    /// - [`OrmError::UniqueConstraint`] if the sequence has already been
    ///   initialised or advanced; nothing is written in that case
    pub fn import(&self, store: &mut dyn KvStore, rows: &[(u64, T)], seq_value: u64) -> OrmResult<()> {
        if let Some((id, _)) = rows.iter().find(|(id, _)| *id == 0 || *id > seq_value) {
            return Err(OrmError::invalid_argument(format!(
                "id {id} is outside the sequence range 1..={seq_value}"
            )));
        }
        self.seq.init(store, seq_value)?;
        self.table.clear(store)?;
        for (id, record) in rows {
            self.table.create(store, &RowId::from_u64(*id), record)?;
        }
        debug!(table = ?self.table.prefix(), rows = rows.len(), seq_value, "imported auto-id table");
        Ok(())
    }
}

fn check_id_range(start_id: u64, end_id: u64) -> OrmResult<()> {
    if start_id >= end_id {
        return Err(OrmError::invalid_argument("start id must be less than end id"));
    }
    Ok(())
}

impl<T: Model> Indexable for AutoUInt64Table<T> {
    fn row_getter(&self) -> RowGetter {
        self.table.row_getter()
    }

    fn model_type(&self) -> ModelType {
        self.table.model()
    }

    fn table_prefix(&self) -> [u8; 2] {
        self.table.prefix()
    }

    fn sequence_prefix(&self) -> Option<u8> {
        Some(self.seq.prefix())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::read_all;
    use kvorm_storage::MemKvStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        text: String,
    }

    impl Model for Entry {}

    fn entry(text: &str) -> Entry {
        Entry { text: text.into() }
    }

    fn table() -> AutoUInt64Table<Entry> {
        AutoUInt64Table::new([0x01, 0x00], 0x02).unwrap()
    }

    #[test]
    fn sequence_prefix_must_be_distinct() {
        assert!(AutoUInt64Table::<Entry>::new([0x01, 0x00], 0x01)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn create_issues_increasing_ids() {
        let table = table();
        let mut store = MemKvStore::new();
        assert_eq!(table.create(&mut store, &entry("a")).unwrap(), 1);
        assert_eq!(table.create(&mut store, &entry("b")).unwrap(), 2);
        assert_eq!(table.sequence().current(&store).unwrap(), 2);
        assert!(store.has(&[0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 2]).unwrap());
        assert!(store.has(&[0x02, 0x01]).unwrap());
    }

    #[test]
    fn update_delete_and_lookup_by_id() {
        let table = table();
        let mut store = MemKvStore::new();
        let id = table.create(&mut store, &entry("a")).unwrap();
        table.update(&mut store, id, &entry("b")).unwrap();
        assert_eq!(table.get(&store, id).unwrap(), entry("b"));
        assert!(table.has(&store, id).unwrap());

        table.delete(&mut store, id).unwrap();
        assert!(!table.has(&store, id).unwrap());
        assert!(table.get(&store, id).unwrap_err().is_not_found());
        assert!(table.update(&mut store, id, &entry("c")).unwrap_err().is_not_found());
    }

    #[test]
    fn scans_cover_half_open_id_ranges() {
        let table = table();
        let mut store = MemKvStore::new();
        for text in ["a", "b", "c", "d"] {
            table.create(&mut store, &entry(text)).unwrap();
        }

        let mut it = table.prefix_scan(&store, 2, 4).unwrap();
        let mut got = Vec::<Entry>::new();
        read_all(&mut it, &mut got).unwrap();
        assert_eq!(got, vec![entry("b"), entry("c")]);

        let mut it = table.reverse_prefix_scan(&store, 1, u64::MAX).unwrap();
        let mut got = Vec::<Entry>::new();
        read_all(&mut it, &mut got).unwrap();
        assert_eq!(got, vec![entry("d"), entry("c"), entry("b"), entry("a")]);

        assert!(table.prefix_scan(&store, 3, 3).unwrap_err().is_invalid_argument());
        assert!(table
            .reverse_prefix_scan(&store, 4, 1)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn export_import_roundtrip() {
        let table = table();
        let mut store = MemKvStore::new();
        table.create(&mut store, &entry("a")).unwrap();
        let id = table.create(&mut store, &entry("b")).unwrap();
        table.create(&mut store, &entry("c")).unwrap();
        table.delete(&mut store, id).unwrap();

        let (rows, seq) = table.export(&store).unwrap();
        assert_eq!(rows, vec![(1, entry("a")), (3, entry("c"))]);
        assert_eq!(seq, 3);

        let mut other = MemKvStore::new();
        table.import(&mut other, &rows, seq).unwrap();
        assert_eq!(other, store);
        assert_eq!(table.create(&mut other, &entry("d")).unwrap(), 4);
    }

    #[test]
    fn import_never_rewinds_the_sequence() {
        let table = table();
        let mut store = MemKvStore::new();
        for text in ["a", "b", "c"] {
            table.create(&mut store, &entry(text)).unwrap();
        }
        let before = store.clone();

        let err = table.import(&mut store, &[], 0).unwrap_err();
        assert!(err.is_unique_constraint());
        assert_eq!(store, before);
        assert_eq!(table.create(&mut store, &entry("d")).unwrap(), 4);
    }

    #[test]
    fn import_rejects_ids_beyond_sequence() {
        let table = table();
        let mut store = MemKvStore::new();
        let err = table.import(&mut store, &[(5, entry("x"))], 4).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(table.import(&mut store, &[(0, entry("x"))], 4).is_err());
        assert!(store.is_empty());
    }
}
