//! # kvorm Storage
//!
//! Ordered key/value store contract and the stores built on it.
//!
//! Stores are **opaque byte maps** with lexicographically ordered keys. They
//! know nothing about tables, indexes or encodings; the ORM layer in
//! `kvorm_core` owns all key layout decisions.
//!
//! ## Design Principles
//!
//! - Reads ([`KvRead`]) and writes ([`KvStore`]) are separate traits
//! - Iterators borrow their store, so a store cannot change under an iterator
//! - Ranges are half-open and either bound may be open
//! - No locking: exclusive access is expressed with `&mut`
//!
//! ## Available Stores
//!
//! - [`MemKvStore`] - `BTreeMap`-backed store for tests and ephemeral state
//! - [`PrefixStore`] - a view that scopes every key under a prefix
//! - [`BranchStore`] - buffers writes until committed, see [`with_branch`]
//! - [`MeteredStore`] - counts operations on a wrapped store
//!
//! ## Example
//!
//! ```rust
//! use kvorm_storage::{KvRead, KvStore, MemKvStore, PrefixStore};
//!
//! let mut store = MemKvStore::new();
//! PrefixStore::new(&mut store, vec![0x01]).set(b"k", b"v").unwrap();
//! assert_eq!(store.get(&[0x01, b'k']).unwrap(), Some(b"v".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod branch;
mod error;
mod memory;
mod metered;
mod prefix;

pub use backend::{BoxedIterator, EmptyIterator, KvIterator, KvRead, KvStore};
pub use branch::{with_branch, BranchStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemKvStore;
pub use metered::{MeteredStore, StatsSnapshot, StoreStats};
pub use prefix::{prefix_end, prefix_iterator, PrefixStore};
