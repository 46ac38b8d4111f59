//! End-to-end scenarios across storage, tables, indexes and pagination.

use kvorm_core::{
    decode_sequence, encode_sequence, filtered_paginate, paginate, prefix_range, AutoUInt64Table,
    OrmError, OrmResult, PageRequest, Sequence, UniqueIndex,
};
use kvorm_storage::{with_branch, MemKvStore};
use kvorm_testkit::prelude::*;

#[test]
fn multi_key_index_follows_creates_updates_and_deletes() {
    init_tracing();
    let mut fx = RecordFixture::new();

    let ids: Vec<u64> = ["t1", "t2", "t3"]
        .into_iter()
        .map(|name| fx.create(&TestRecord::new(name, b"m")).unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let found = fx.records_with_metadata(b"m").unwrap();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["t1", "t2", "t3"]);
    let found_ids: Vec<_> = found.iter().map(|r| r.id).collect();
    assert_eq!(found_ids, ids);

    fx.update(1, &TestRecord::new("t1", b"mm")).unwrap();
    assert_eq!(fx.records_with_metadata(b"mm").unwrap().len(), 1);
    assert_eq!(fx.records_with_metadata(b"m").unwrap().len(), 2);
    assert_eq!(fx.entries_under(METADATA_INDEX_PREFIX).len(), 3);

    fx.delete(1).unwrap();
    assert!(fx.records_with_metadata(b"mm").unwrap().is_empty());
    assert_eq!(fx.entries_under(METADATA_INDEX_PREFIX).len(), 2);
    assert!(fx.get(1).unwrap_err().is_not_found());
}

#[test]
fn second_sequence_init_is_rejected() {
    let seq = Sequence::new(0x09);
    let mut store = MemKvStore::new();
    seq.init(&mut store, 1).unwrap();
    assert_eq!(seq.init(&mut store, 3), Err(OrmError::UniqueConstraint));
    assert_eq!(seq.next(&mut store).unwrap(), 2);
}

#[test]
fn prefix_range_cases() {
    assert_eq!(
        prefix_range(&[1, 3, 4]).unwrap(),
        (vec![1, 3, 4], Some(vec![1, 3, 5]))
    );
    assert_eq!(
        prefix_range(&[15, 42, 255, 255]).unwrap(),
        (vec![15, 42, 255, 255], Some(vec![15, 43, 0, 0]))
    );
    assert_eq!(
        prefix_range(&[255, 255, 255, 255]).unwrap(),
        (vec![255, 255, 255, 255], None)
    );
    assert!(prefix_range(&[]).unwrap_err().is_invalid_argument());
}

fn page_keys(store: &MemKvStore, req: &PageRequest) -> (Vec<u64>, kvorm_core::PageResponse) {
    let mut keys = Vec::new();
    let res = paginate(store, req, |key, _| {
        keys.push(decode_sequence(key)?);
        Ok(())
    })
    .unwrap();
    (keys, res)
}

#[test]
fn reverse_pages_chain_through_all_keys() {
    let store = numbered_store(300);

    let req = PageRequest::new()
        .with_limit(100)
        .with_reverse(true)
        .with_count_total(true);
    let (keys, res) = page_keys(&store, &req);
    assert_eq!(keys, (200..300).rev().collect::<Vec<_>>());
    assert_eq!(res.next_key, Some(encode_sequence(199).to_vec()));
    assert_eq!(res.total, Some(300));

    let req = PageRequest::new()
        .with_limit(100)
        .with_reverse(true)
        .with_key(res.next_key.unwrap());
    let (keys, res) = page_keys(&store, &req);
    assert_eq!(keys, (100..200).rev().collect::<Vec<_>>());
    assert_eq!(res.next_key, Some(encode_sequence(99).to_vec()));

    let req = PageRequest::new()
        .with_limit(100)
        .with_reverse(true)
        .with_key(res.next_key.unwrap());
    let (keys, res) = page_keys(&store, &req);
    assert_eq!(keys, (0..100).rev().collect::<Vec<_>>());
    assert_eq!(res.next_key, None);
}

#[test]
fn unique_first_byte_index_rejects_the_second_record() {
    let mut table = AutoUInt64Table::<TestRecord>::new([0x01, 0x00], 0x02).unwrap();
    let by_first_byte = UniqueIndex::new(&mut table, 0x03, |r: &TestRecord| {
        Ok(r.metadata.first().map(|b| vec![*b]).unwrap_or_default())
    })
    .unwrap();
    let mut store = MemKvStore::new();

    let id = with_branch(&mut store, |tx| table.create(tx, &TestRecord::new("a", b"xyz"))).unwrap();
    let before = store.clone();
    let err: OrmResult<u64> =
        with_branch(&mut store, |tx| table.create(tx, &TestRecord::new("b", b"xab")));
    assert_eq!(err, Err(OrmError::UniqueConstraint));
    assert_eq!(store, before);

    assert_eq!(table.get(&store, id).unwrap().name, "a");
    assert!(by_first_byte.has(&store, &b"x".to_vec()).unwrap());
    assert_eq!(entries_under(&store, 0x03).len(), 1);

    // Records without a first byte derive an empty key and are skipped.
    for name in ["c", "d"] {
        with_branch(&mut store, |tx| table.create(tx, &TestRecord::new(name, b""))).unwrap();
    }
    assert_eq!(table.export(&store).unwrap().0.len(), 3);
    assert_eq!(entries_under(&store, 0x03).len(), 1);
    assert!(!by_first_byte.has(&store, &Vec::new()).unwrap());
}

#[test]
fn filtered_pages_continue_from_the_next_key() {
    let store = numbered_store(300);
    let even_page = |req: &PageRequest| {
        let mut keys = Vec::new();
        let res = filtered_paginate(&store, req, |key, _, accumulate| {
            let n = decode_sequence(key)?;
            let hit = n % 2 == 0;
            if hit && accumulate {
                keys.push(n);
            }
            Ok(hit)
        })
        .unwrap();
        (keys, res)
    };

    let (keys, res) = even_page(&PageRequest::new().with_limit(3));
    assert_eq!(keys, vec![0, 2, 4]);
    assert_eq!(res.next_key, Some(encode_sequence(5).to_vec()));

    let (keys, mut res) = even_page(&PageRequest::new().with_limit(3).with_key(res.next_key.unwrap()));
    assert_eq!(keys, vec![6, 8, 10]);

    let mut all = vec![0, 2, 4, 6, 8, 10];
    while let Some(key) = res.next_key.take() {
        let (keys, next) = even_page(&PageRequest::new().with_limit(3).with_key(key));
        all.extend(keys);
        res = next;
    }
    assert_eq!(all, (0..300).step_by(2).collect::<Vec<_>>());
}
