//! Test fixtures: records and pre-wired tables.
//!
//! Fixtures own an in-memory store and run every mutation inside a branch,
//! so a failing write leaves the store untouched.

use kvorm_core::{
    read_all, AutoUInt64Table, KeyPart, Model, MultiKeyIndex, OrmError, OrmResult,
    PrimaryKeyTable, PrimaryKeyed, RecordIterator, UniqueIndex,
};
use kvorm_storage::{with_branch, KvStore, MemKvStore};
use serde::{Deserialize, Serialize};

/// Prefix of the record table.
pub const RECORD_TABLE_PREFIX: [u8; 2] = [0x01, 0x00];
/// Prefix of the record id sequence.
pub const RECORD_SEQ_PREFIX: u8 = 0x02;
/// Prefix of the multi-key index on `metadata`.
pub const METADATA_INDEX_PREFIX: u8 = 0x03;
/// Prefix of the unique index on `name`.
pub const NAME_INDEX_PREFIX: u8 = 0x04;
/// Prefix of the member table.
pub const MEMBER_TABLE_PREFIX: [u8; 2] = [0x05, 0x00];
/// Prefix of the multi-key index on member weight.
pub const WEIGHT_INDEX_PREFIX: u8 = 0x06;

/// A record stored in an auto-id table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Id the record was created under.
    pub id: u64,
    /// Unique name; an empty name is not indexed.
    pub name: String,
    /// Free-form metadata, indexed as bytes; empty metadata is not indexed.
    pub metadata: Vec<u8>,
}

impl TestRecord {
    /// Creates a record without an id.
    pub fn new(name: impl Into<String>, metadata: &[u8]) -> Self {
        Self {
            id: 0,
            name: name.into(),
            metadata: metadata.to_vec(),
        }
    }
}

impl Model for TestRecord {
    fn validate(&self) -> OrmResult<()> {
        if self.metadata.len() > usize::from(u8::MAX) {
            return Err(OrmError::validation("metadata must fit in 255 bytes"));
        }
        Ok(())
    }
}

/// A group membership keyed by `(group, member)`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Group id.
    pub group: u64,
    /// Member address.
    pub member: String,
    /// Voting weight.
    pub weight: u64,
}

impl GroupMember {
    /// Creates a membership.
    pub fn new(group: u64, member: impl Into<String>, weight: u64) -> Self {
        Self {
            group,
            member: member.into(),
            weight,
        }
    }
}

impl Model for GroupMember {}

impl PrimaryKeyed for GroupMember {
    fn primary_key_fields(&self) -> Vec<KeyPart> {
        vec![KeyPart::from(self.group), KeyPart::from(self.member.as_str())]
    }
}

/// An auto-id record table with a metadata index and a unique name index.
pub struct RecordFixture {
    /// The backing store.
    pub store: MemKvStore,
    /// The record table.
    pub table: AutoUInt64Table<TestRecord>,
    /// Multi-key index on `metadata`.
    pub by_metadata: MultiKeyIndex<TestRecord, Vec<u8>>,
    /// Unique index on `name`.
    pub by_name: UniqueIndex<TestRecord, String>,
}

impl Default for RecordFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFixture {
    /// Wires the table and its indexes over an empty store.
    pub fn new() -> Self {
        let mut table = AutoUInt64Table::new(RECORD_TABLE_PREFIX, RECORD_SEQ_PREFIX)
            .expect("Failed to create record table");
        let by_metadata = MultiKeyIndex::new(&mut table, METADATA_INDEX_PREFIX, |r: &TestRecord| {
            Ok(vec![r.metadata.clone()])
        })
        .expect("Failed to attach metadata index");
        let by_name = UniqueIndex::new(&mut table, NAME_INDEX_PREFIX, |r: &TestRecord| {
            Ok(r.name.clone())
        })
        .expect("Failed to attach name index");
        Self {
            store: MemKvStore::new(),
            table,
            by_metadata,
            by_name,
        }
    }

    /// Creates `record`, stamping it with the issued id.
    pub fn create(&mut self, record: &TestRecord) -> OrmResult<u64> {
        let table = &self.table;
        with_branch(&mut self.store, |tx| {
            let mut record = record.clone();
            record.id = table.sequence().peek(&*tx)?;
            table.create(tx, &record)
        })
    }

    /// Replaces the record stored under `id`, keeping its id field.
    pub fn update(&mut self, id: u64, record: &TestRecord) -> OrmResult<()> {
        let table = &self.table;
        with_branch(&mut self.store, |tx| {
            let record = TestRecord {
                id,
                ..record.clone()
            };
            table.update(tx, id, &record)
        })
    }

    /// Deletes the record stored under `id`.
    pub fn delete(&mut self, id: u64) -> OrmResult<()> {
        let table = &self.table;
        with_branch(&mut self.store, |tx| table.delete(tx, id))
    }

    /// Returns the record stored under `id`.
    pub fn get(&self, id: u64) -> OrmResult<TestRecord> {
        self.table.get(&self.store, id)
    }

    /// Returns the records indexed under `metadata`, in id order.
    pub fn records_with_metadata(&self, metadata: &[u8]) -> OrmResult<Vec<TestRecord>> {
        let mut it = self.by_metadata.get(&self.store, &metadata.to_vec())?;
        collect(&mut it)
    }

    /// Returns the raw keys stored under the single-byte `prefix`.
    pub fn entries_under(&self, prefix: u8) -> Vec<Vec<u8>> {
        entries_under(&self.store, prefix)
    }
}

/// A primary-key member table with an index on weight.
pub struct MemberFixture {
    /// The backing store.
    pub store: MemKvStore,
    /// The member table.
    pub table: PrimaryKeyTable<GroupMember>,
    /// Multi-key index on `weight`.
    pub by_weight: MultiKeyIndex<GroupMember, u64>,
}

impl Default for MemberFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberFixture {
    /// Wires the table and its index over an empty store.
    pub fn new() -> Self {
        let mut table = PrimaryKeyTable::new(MEMBER_TABLE_PREFIX);
        let by_weight = MultiKeyIndex::new(&mut table, WEIGHT_INDEX_PREFIX, |m: &GroupMember| {
            Ok(vec![m.weight])
        })
        .expect("Failed to attach weight index");
        Self {
            store: MemKvStore::new(),
            table,
            by_weight,
        }
    }

    /// Inserts every member.
    pub fn insert_all(&mut self, members: &[GroupMember]) -> OrmResult<()> {
        let table = &self.table;
        with_branch(&mut self.store, |tx| {
            members.iter().try_for_each(|m| table.create(&mut *tx, m))
        })
    }
}

/// Drains a record iterator into a vector.
pub fn collect<T: Model>(it: &mut dyn RecordIterator) -> OrmResult<Vec<T>> {
    let mut records = Vec::<T>::new();
    read_all(it, &mut records)?;
    Ok(records)
}

/// Returns the raw keys of `store` under the single-byte `prefix`.
pub fn entries_under(store: &MemKvStore, prefix: u8) -> Vec<Vec<u8>> {
    store
        .entries()
        .filter(|(key, _)| key.first() == Some(&prefix))
        .map(|(key, _)| key.to_vec())
        .collect()
}

/// Returns a store holding `n` entries `encode_u64(i) → encode_u64(i)`.
pub fn numbered_store(n: u64) -> MemKvStore {
    let mut store = MemKvStore::new();
    for i in 0..n {
        let key = kvorm_core::encode_sequence(i);
        store.set(&key, &key).expect("Failed to populate store");
    }
    store
}
