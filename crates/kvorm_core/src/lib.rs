//! # kvorm core
//!
//! Typed tables, secondary indexes and pagination over an ordered key/value
//! store.
//!
//! This crate provides:
//! - Key encoding for composite and index keys
//! - Persistent sequences
//! - Tables keyed by an auto-incrementing id or by a record's primary key
//! - Multi-key and unique secondary indexes maintained on every write
//! - Lazy record iterators and offset/key pagination
//!
//! Every operation takes the store it works on. Writes take
//! `&mut dyn KvStore`, reads `&dyn KvRead`, so the caller decides which
//! view (plain, prefixed, branched) an operation runs against. Table writes
//! fire index maintenance after the row write; run them inside a
//! [`BranchStore`](kvorm_storage::BranchStore) and discard it on error to
//! keep rows and indexes consistent.
//!
//! ## Example
//!
//! ```rust
//! use kvorm_core::{read_all, AutoUInt64Table, Model, MultiKeyIndex};
//! use kvorm_storage::{with_branch, MemKvStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Clone, Serialize, Deserialize)]
//! struct Task {
//!     owner: String,
//!     title: String,
//! }
//!
//! impl Model for Task {}
//!
//! let mut tasks = AutoUInt64Table::<Task>::new([0x01, 0x00], 0x02).unwrap();
//! let by_owner = MultiKeyIndex::new(&mut tasks, 0x03, |t: &Task| Ok(vec![t.owner.clone()])).unwrap();
//!
//! let mut store = MemKvStore::new();
//! let task = Task { owner: "ann".into(), title: "write docs".into() };
//! let id: u64 = with_branch(&mut store, |tx| tasks.create(tx, &task)).unwrap();
//! assert_eq!(id, 1);
//!
//! let mut owned = Vec::<Task>::new();
//! read_all(&mut by_owner.get(&store, &"ann".to_string()).unwrap(), &mut owned).unwrap();
//! assert_eq!(owned[0].title, "write docs");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
mod config;
mod error;
pub mod index;
mod iterator;
mod key;
mod model;
mod pagination;
mod sequence;
pub mod table;
mod types;

pub use collection::{Map, MapIterator, Order};
pub use config::{Config, DEFAULT_PAGE_LIMIT};
pub use error::{OrmError, OrmResult};
pub use index::{IndexIterator, IndexKey, MultiKeyIndex, UniqueIndex};
pub use iterator::{
    first, read_all, InvalidIterator, LimitIterator, RecordIterator, RecordSlice,
    SingleValueIterator, TableIterator,
};
pub use key::{
    add_length_prefix, build_key_from_parts, decode_sequence, encode_sequence, get_start_end_bz,
    null_terminated, prefix_range, strip_row_id, KeyPart, KeyShape, MAX_BYTES_PART_LEN,
};
pub use model::{downcast, downcast_mut, primary_key, Model, ModelType, PrimaryKeyed, Record};
pub use pagination::{
    collection_paginate, filtered_collection_paginate, filtered_paginate,
    filtered_paginate_records, paginate, paginate_records, PageRequest, PageResponse, Paginator,
};
pub use sequence::Sequence;
pub use table::{
    AfterDeleteInterceptor, AfterSetInterceptor, AutoUInt64Table, Indexable, PrimaryKeyTable,
    RowGetter, Table,
};
pub use types::RowId;
