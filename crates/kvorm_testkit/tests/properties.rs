//! Property tests for index consistency and pagination.

use kvorm_core::{
    decode_sequence, encode_sequence, paginate, paginate_records, KeyPart, LimitIterator, OrmError,
    PageRequest, PageResponse, RecordIterator,
};
use kvorm_storage::{KvStore, MemKvStore, MeteredStore};
use kvorm_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Index keys expected for the live records in `model`.
fn expected_entries(model: &BTreeMap<u64, TestRecord>) -> (BTreeSet<Vec<u8>>, BTreeSet<Vec<u8>>) {
    let mut metadata = BTreeSet::new();
    let mut names = BTreeSet::new();
    for (id, record) in model {
        if !record.metadata.is_empty() {
            let mut key = vec![METADATA_INDEX_PREFIX];
            key.extend(KeyPart::Bytes(record.metadata.clone()).encode().unwrap());
            key.extend(encode_sequence(*id));
            metadata.insert(key);
        }
        if !record.name.is_empty() {
            let mut key = vec![NAME_INDEX_PREFIX];
            key.extend(KeyPart::Str(record.name.clone()).encode().unwrap());
            key.extend(encode_sequence(*id));
            names.insert(key);
        }
    }
    (metadata, names)
}

fn name_taken(model: &BTreeMap<u64, TestRecord>, name: &str, except: Option<u64>) -> bool {
    !name.is_empty()
        && model
            .iter()
            .any(|(id, r)| Some(*id) != except && r.name == name)
}

fn key_pages(store: &MemKvStore, limit: u64, reverse: bool) -> Vec<u64> {
    let mut seen = Vec::new();
    let mut req = PageRequest::new().with_limit(limit).with_reverse(reverse);
    loop {
        let res = paginate(store, &req, |key, _| {
            seen.push(decode_sequence(key)?);
            Ok(())
        })
        .unwrap();
        match res.next_key {
            Some(key) => req = req.with_key(key),
            None => return seen,
        }
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn indexes_match_live_records(ops in table_ops_strategy(1, 40)) {
        let mut fx = RecordFixture::new();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                TableOp::Create(record) => {
                    let taken = name_taken(&model, &record.name, None);
                    match fx.create(&record) {
                        Ok(id) => {
                            prop_assert!(!taken);
                            model.insert(id, TestRecord { id, ..record });
                        }
                        Err(err) => prop_assert!(taken && err.is_unique_constraint()),
                    }
                }
                TableOp::Update { slot, record } => {
                    let Some(id) = model.keys().nth(slot % model.len().max(1)).copied() else {
                        continue;
                    };
                    let taken = name_taken(&model, &record.name, Some(id));
                    match fx.update(id, &record) {
                        Ok(()) => {
                            prop_assert!(!taken);
                            model.insert(id, TestRecord { id, ..record });
                        }
                        Err(err) => prop_assert!(taken && err.is_unique_constraint()),
                    }
                }
                TableOp::Delete { slot } => {
                    let Some(id) = model.keys().nth(slot % model.len().max(1)).copied() else {
                        continue;
                    };
                    fx.delete(id).unwrap();
                    model.remove(&id);
                }
            }
        }

        let (metadata, names) = expected_entries(&model);
        let actual: BTreeSet<_> = fx.entries_under(METADATA_INDEX_PREFIX).into_iter().collect();
        // An empty byte key would show up as a zero length prefix.
        prop_assert!(actual.iter().all(|key| key[1] != 0));
        prop_assert_eq!(actual, metadata);
        let actual: BTreeSet<_> = fx.entries_under(NAME_INDEX_PREFIX).into_iter().collect();
        // An empty string key would show up as a bare terminator.
        prop_assert!(actual.iter().all(|key| key[1] != 0));
        prop_assert_eq!(actual, names);
        prop_assert!(!fx.by_name.has(&fx.store, &String::new()).unwrap());

        let (rows, _) = fx.table.export(&fx.store).unwrap();
        prop_assert_eq!(rows, model.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn rejected_unique_writes_leave_the_store_unchanged(records in prop::collection::vec(record_strategy(), 1..8)) {
        let mut fx = RecordFixture::new();
        for record in &records {
            let _ = fx.create(record);
        }
        let name = match records.iter().find(|r| !r.name.is_empty()) {
            Some(record) => record.name.clone(),
            None => {
                fx.create(&TestRecord::new("a", b"")).unwrap();
                "a".to_string()
            }
        };
        let before = fx.store.clone();
        let clash = TestRecord::new(name, b"zz");
        prop_assert!(fx.create(&clash).unwrap_err().is_unique_constraint());
        prop_assert_eq!(&fx.store, &before);
    }

    #[test]
    fn offset_pages_visit_every_key_once(n in 0u64..40, limit in 1u64..8) {
        let store = numbered_store(n);
        let mut seen = Vec::new();
        let mut offset = 0;
        while offset < n {
            let req = PageRequest::new().with_limit(limit).with_offset(offset).with_count_total(true);
            let res = paginate(&store, &req, |key, _| {
                seen.push(decode_sequence(key)?);
                Ok(())
            })
            .unwrap();
            prop_assert_eq!(res.total, Some(n));
            offset += limit;
        }
        prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn key_pages_visit_every_key_once(n in 0u64..40, limit in 1u64..8) {
        let store = numbered_store(n);
        prop_assert_eq!(key_pages(&store, limit, false), (0..n).collect::<Vec<_>>());
        prop_assert_eq!(key_pages(&store, limit, true), (0..n).rev().collect::<Vec<_>>());
    }

    #[test]
    fn first_pages_are_consistent(n in 0u64..40, req in page_request_strategy()) {
        let store = numbered_store(n);
        let mut seen = Vec::new();
        let res = paginate(&store, &req, |key, _| {
            seen.push(decode_sequence(key)?);
            Ok(())
        })
        .unwrap();
        prop_assert_eq!(seen.len() as u64, n.min(req.limit));
        prop_assert_eq!(res.next_key.is_some(), n > req.limit);
        prop_assert_eq!(res.total, req.count_total.then_some(n));
    }

    #[test]
    fn limit_iterator_truncates_its_parent(count in 0usize..10, max in 0usize..12) {
        let mut fx = RecordFixture::new();
        for i in 0..count {
            fx.create(&TestRecord::new(format!("r{i}"), b"m")).unwrap();
        }
        let it = fx.table.table().prefix_scan(&fx.store, None, None).unwrap();
        let mut limited = LimitIterator::new(it, max);
        let records: Vec<TestRecord> = collect(&mut limited).unwrap();
        prop_assert_eq!(records.len(), count.min(max));
        let names: Vec<_> = records.iter().map(|r| r.name.clone()).collect();
        let expected: Vec<_> = (0..count.min(max)).map(|i| format!("r{i}")).collect();
        prop_assert_eq!(names, expected);
    }
}

#[test]
fn zero_limit_uses_the_default_and_counts() {
    let store = numbered_store(150);
    let mut seen = 0;
    let res = paginate(&store, &PageRequest::new(), |_, _| {
        seen += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, 100);
    assert_eq!(res.next_key, Some(encode_sequence(100).to_vec()));
    assert_eq!(res.total, Some(150));
}

#[test]
fn offset_with_key_opens_no_iterator() {
    let store = MeteredStore::new(numbered_store(10));
    let stats = store.stats();
    let req = PageRequest::new()
        .with_offset(1)
        .with_key(encode_sequence(3).to_vec());
    let err = paginate(&store, &req, |_, _| Ok(())).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(stats.iterators(), 0);
}

#[test]
fn reverse_pages_cover_the_same_records() {
    let mut fx = RecordFixture::new();
    for i in 0..7 {
        fx.create(&TestRecord::new(format!("r{i}"), b"m")).unwrap();
    }
    let page = |reverse: bool| -> BTreeSet<String> {
        let mut it = if reverse {
            fx.table.reverse_prefix_scan(&fx.store, 2, 6).unwrap()
        } else {
            fx.table.prefix_scan(&fx.store, 2, 6).unwrap()
        };
        let mut records = Vec::<TestRecord>::new();
        let res: PageResponse =
            paginate_records(&mut it, &PageRequest::new().with_limit(10), &mut records).unwrap();
        assert_eq!(res.next_key, None);
        records.into_iter().map(|r| r.name).collect()
    };
    let forward = page(false);
    assert_eq!(forward.len(), 4);
    assert_eq!(forward, page(true));
}

#[test]
fn paging_a_closed_iterator_fails() {
    let mut fx = RecordFixture::new();
    fx.create(&TestRecord::new("a", b"m")).unwrap();
    let mut it = fx.table.table().prefix_scan(&fx.store, None, None).unwrap();
    it.close();
    let mut records = Vec::<TestRecord>::new();
    let err = paginate_records(&mut it, &PageRequest::new(), &mut records).unwrap_err();
    assert_eq!(err, OrmError::InvalidIterator);
}

#[test]
fn page_request_wire_shape() {
    let req = PageRequest::new().with_limit(3).with_key(vec![1, 2]);
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["limit"], 3);
    assert_eq!(json["key"], serde_json::json!([1, 2]));

    let parsed: PageRequest = serde_json::from_str(r#"{"limit": 5}"#).unwrap();
    assert_eq!(parsed, PageRequest::new().with_limit(5));

    let mut store = MemKvStore::new();
    store.set(b"a", b"1").unwrap();
    let res = paginate(&store, &PageRequest::new().with_limit(1), |_, _| Ok(())).unwrap();
    let back: PageResponse = serde_json::from_str(&serde_json::to_string(&res).unwrap()).unwrap();
    assert_eq!(back, res);
}
