//! Offset and key based pagination.
//!
//! A [`PageRequest`] either continues from a key returned by a previous page
//! (key mode) or skips a number of items from the start (offset mode). Both
//! modes run the same state machine over a page source:
//!
//! ```text
//! Seek -> Skip -> Fill -> Tail -> Done
//! ```
//!
//! `Skip` only runs in offset mode. `Tail` only runs in offset mode with
//! `count_total` and drains the source to compute the total. The source is
//! closed on every exit path.

use crate::collection::{Map, Order};
use crate::config::Config;
use crate::error::{OrmError, OrmResult};
use crate::index::IndexKey;
use crate::iterator::{RecordIterator, RecordSlice};
use crate::model::Model;
use kvorm_storage::{BoxedIterator, KvRead};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// A page request.
///
/// A zero `limit` selects the configured default limit and enables
/// `count_total`. `offset` and `key` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// Key to continue from, as returned in [`PageResponse::next_key`].
    pub key: Vec<u8>,
    /// Number of items to skip in offset mode.
    pub offset: u64,
    /// Maximum number of items in the page.
    pub limit: u64,
    /// Report the total number of items in offset mode.
    pub count_total: bool,
    /// Iterate in descending order.
    pub reverse: bool,
}

impl PageRequest {
    /// Creates an empty request: first page, default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key to continue from.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Requests the total count.
    #[must_use]
    pub fn with_count_total(mut self, count_total: bool) -> Self {
        self.count_total = count_total;
        self
    }

    /// Selects descending order.
    #[must_use]
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

/// The result metadata of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    /// Key of the first item after the page, `None` on the last page.
    pub next_key: Option<Vec<u8>>,
    /// Total number of items, reported in offset mode with `count_total`.
    pub total: Option<u64>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy)]
struct PagePlan {
    offset: u64,
    limit: u64,
    count_total: bool,
    key_mode: bool,
}

impl PagePlan {
    fn new(req: &PageRequest, config: &Config) -> OrmResult<Self> {
        let key_mode = !req.key.is_empty();
        if req.offset > 0 && key_mode {
            return Err(OrmError::invalid_argument(
                "paginate request cannot have both offset and key",
            ));
        }
        let (limit, count_total) = if req.limit == 0 {
            (config.default_page_limit, true)
        } else {
            (req.limit, req.count_total)
        };
        Ok(Self {
            offset: req.offset,
            limit,
            count_total,
            key_mode,
        })
    }
}

/// Items to paginate over, in page order.
trait PageSource {
    type Item;

    /// Returns the next `(key, item)` pair, `None` when exhausted.
    fn next_item(&mut self) -> OrmResult<Option<(Vec<u8>, Self::Item)>>;

    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Skip,
    Fill,
    Tail,
}

/// Runs one page over `source`. `accept(key, item, accumulate)` reports
/// whether the item matches; it should only collect when `accumulate` is set.
fn run_page<S, F>(source: &mut S, plan: PagePlan, config: &Config, accept: F) -> OrmResult<PageResponse>
where
    S: PageSource,
    F: FnMut(&[u8], S::Item, bool) -> OrmResult<bool>,
{
    let result = drive(source, plan, config, accept);
    source.close();
    result
}

fn drive<S, F>(source: &mut S, plan: PagePlan, config: &Config, mut accept: F) -> OrmResult<PageResponse>
where
    S: PageSource,
    F: FnMut(&[u8], S::Item, bool) -> OrmResult<bool>,
{
    let mut phase = if plan.offset > 0 { Phase::Skip } else { Phase::Fill };
    let (mut skipped, mut count, mut tail) = (0u64, 0u64, 0u64);
    let mut next_key = None;

    loop {
        let Some((key, item)) = source.next_item()? else {
            if phase == Phase::Skip {
                return Err(OrmError::InvalidIterator);
            }
            break;
        };
        match phase {
            Phase::Skip => {
                if accept(&key, item, false)? {
                    skipped += 1;
                    if skipped == plan.offset {
                        phase = Phase::Fill;
                    }
                }
            }
            Phase::Fill if count < plan.limit => {
                if accept(&key, item, true)? {
                    count += 1;
                }
            }
            Phase::Fill => {
                let counting = plan.count_total && !plan.key_mode;
                if counting && accept(&key, item, false)? {
                    tail += 1;
                }
                next_key = Some(key);
                if !counting {
                    break;
                }
                phase = Phase::Tail;
            }
            Phase::Tail => {
                if accept(&key, item, false)? {
                    tail += 1;
                }
            }
        }
    }

    if tail > config.scan_warning_threshold {
        warn!(
            tail,
            threshold = config.scan_warning_threshold,
            "pagination total drained many items"
        );
    }
    let total = (plan.count_total && !plan.key_mode).then_some(plan.offset + count + tail);
    debug!(count, key_mode = plan.key_mode, ?total, "page complete");
    Ok(PageResponse { next_key, total })
}

/// Raw store entries.
struct StoreSource<'a> {
    it: BoxedIterator<'a>,
}

impl PageSource for StoreSource<'_> {
    type Item = Vec<u8>;

    fn next_item(&mut self) -> OrmResult<Option<(Vec<u8>, Vec<u8>)>> {
        if !self.it.valid() {
            return match self.it.error() {
                Some(err) => Err(err.clone().into()),
                None => Ok(None),
            };
        }
        let entry = (self.it.key().to_vec(), self.it.value().to_vec());
        self.it.next();
        Ok(Some(entry))
    }

    fn close(&mut self) {
        self.it.close();
    }
}

/// Decoded records of an ORM iterator, keyed by row id.
struct RecordSource<'i, I: ?Sized, T> {
    it: &'i mut I,
    _marker: PhantomData<fn() -> T>,
}

impl<I: RecordIterator + ?Sized, T: Model> PageSource for RecordSource<'_, I, T> {
    type Item = T;

    fn next_item(&mut self) -> OrmResult<Option<(Vec<u8>, T)>> {
        let mut record = T::default();
        match self.it.load_next(&mut record) {
            Ok(row_id) => Ok(Some((row_id.into_vec(), record))),
            Err(OrmError::IteratorDone) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn close(&mut self) {
        self.it.close();
    }
}

/// Entries of a typed map, keyed by their raw key.
struct MapSource<'a, K, V> {
    it: crate::collection::MapIterator<'a, K, V>,
}

impl<K: IndexKey, V: Model> PageSource for MapSource<'_, K, V> {
    type Item = (K, V);

    fn next_item(&mut self) -> OrmResult<Option<(Vec<u8>, (K, V))>> {
        Ok(self.it.next_entry()?.map(|(raw, key, value)| (raw, (key, value))))
    }

    fn close(&mut self) {
        self.it.close();
    }
}

/// Returns the `(start, end)` bounds positioning a raw iterator for `req`.
///
/// Reverse key mode bounds the range by `key ‖ 0x00` so that the page
/// starts at `key` itself.
fn seek_bounds(req: &PageRequest) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    match (req.key.is_empty(), req.reverse) {
        (true, _) => (None, None),
        (false, false) => (Some(req.key.clone()), None),
        (false, true) => {
            let mut end = req.key.clone();
            end.push(0);
            (None, Some(end))
        }
    }
}

/// Runs page requests with a fixed [`Config`].
///
/// The free functions of this module use [`Config::default`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator {
    config: Config,
}

impl Paginator {
    /// Creates a paginator.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// See [`paginate`].
    pub fn paginate<F>(&self, store: &dyn KvRead, req: &PageRequest, mut on_result: F) -> OrmResult<PageResponse>
    where
        F: FnMut(&[u8], &[u8]) -> OrmResult<()>,
    {
        self.filtered_paginate(store, req, |key, value, accumulate| {
            if accumulate {
                on_result(key, value)?;
            }
            Ok(true)
        })
    }

    /// See [`filtered_paginate`].
    pub fn filtered_paginate<F>(
        &self,
        store: &dyn KvRead,
        req: &PageRequest,
        mut on_result: F,
    ) -> OrmResult<PageResponse>
    where
        F: FnMut(&[u8], &[u8], bool) -> OrmResult<bool>,
    {
        let plan = PagePlan::new(req, &self.config)?;
        let (start, end) = seek_bounds(req);
        let it = if req.reverse {
            store.reverse_iterator(start.as_deref(), end.as_deref())?
        } else {
            store.iterator(start.as_deref(), end.as_deref())?
        };
        let mut source = StoreSource { it };
        run_page(&mut source, plan, &self.config, |key, value, accumulate| {
            on_result(key, &value, accumulate)
        })
    }

    /// See [`paginate_records`].
    pub fn paginate_records<T, S, I>(&self, it: &mut I, req: &PageRequest, dest: &mut S) -> OrmResult<PageResponse>
    where
        T: Model,
        S: RecordSlice<T> + ?Sized,
        I: RecordIterator + ?Sized,
    {
        self.filtered_paginate_records(it, req, dest, |_, _| Ok(true))
    }

    /// See [`filtered_paginate_records`].
    pub fn filtered_paginate_records<T, S, I, P>(
        &self,
        it: &mut I,
        req: &PageRequest,
        dest: &mut S,
        mut predicate: P,
    ) -> OrmResult<PageResponse>
    where
        T: Model,
        S: RecordSlice<T> + ?Sized,
        I: RecordIterator + ?Sized,
        P: FnMut(&[u8], &T) -> OrmResult<bool>,
    {
        let plan = match PagePlan::new(req, &self.config) {
            Ok(plan) => plan,
            Err(err) => {
                it.close();
                return Err(err);
            }
        };
        let mut source = RecordSource {
            it,
            _marker: PhantomData,
        };
        run_page(&mut source, plan, &self.config, |key, record: T, accumulate| {
            let hit = predicate(key, &record)?;
            if hit && accumulate {
                dest.push_record(record);
            }
            Ok(hit)
        })
    }

    /// See [`collection_paginate`].
    pub fn collection_paginate<K, V>(
        &self,
        store: &dyn KvRead,
        map: &Map<K, V>,
        req: &PageRequest,
    ) -> OrmResult<(Vec<(K, V)>, PageResponse)>
    where
        K: IndexKey,
        V: Model,
    {
        self.filtered_collection_paginate(store, map, req, |_, _| Ok(true))
    }

    /// See [`filtered_collection_paginate`].
    pub fn filtered_collection_paginate<K, V, P>(
        &self,
        store: &dyn KvRead,
        map: &Map<K, V>,
        req: &PageRequest,
        mut predicate: P,
    ) -> OrmResult<(Vec<(K, V)>, PageResponse)>
    where
        K: IndexKey,
        V: Model,
        P: FnMut(&K, &V) -> OrmResult<bool>,
    {
        let plan = PagePlan::new(req, &self.config)?;
        let (start, end) = seek_bounds(req);
        let order = if req.reverse {
            Order::Descending
        } else {
            Order::Ascending
        };
        let it = map.iterate_raw(store, start.as_deref(), end.as_deref(), order)?;
        let mut source = MapSource { it };
        let mut results = Vec::new();
        let response = run_page(&mut source, plan, &self.config, |_, (key, value), accumulate| {
            let hit = predicate(&key, &value)?;
            if hit && accumulate {
                results.push((key, value));
            }
            Ok(hit)
        })?;
        Ok((results, response))
    }
}

/// Pages over the raw entries of `store`, calling `on_result` for each
/// entry of the page.
///
/// In key mode the page starts at `req.key`. The returned
/// [`PageResponse::next_key`] continues the iteration.
///
/// # Errors
///
/// - [`OrmError::InvalidArgument`] if both `offset` and `key` are set
/// - [`OrmError::InvalidIterator`] if `offset` skips past the end
///
/// # Example
///
/// ```rust
/// use kvorm_core::{paginate, PageRequest};
/// use kvorm_storage::{KvStore, MemKvStore};
///
/// let mut store = MemKvStore::new();
/// for k in 1u8..=5 {
///     store.set(&[k], b"v").unwrap();
/// }
/// let mut keys = Vec::new();
/// let req = PageRequest::new().with_limit(2).with_count_total(true);
/// let res = paginate(&store, &req, |key, _| {
///     keys.push(key.to_vec());
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(keys, vec![vec![1], vec![2]]);
/// assert_eq!(res.next_key, Some(vec![3]));
/// assert_eq!(res.total, Some(5));
/// ```
pub fn paginate<F>(store: &dyn KvRead, req: &PageRequest, on_result: F) -> OrmResult<PageResponse>
where
    F: FnMut(&[u8], &[u8]) -> OrmResult<()>,
{
    Paginator::default().paginate(store, req, on_result)
}

/// Like [`paginate`], but `on_result(key, value, accumulate)` decides
/// whether each entry counts toward the page.
///
/// When `accumulate` is false the entry is only being counted (offset skip
/// or total count) and must not be collected.
pub fn filtered_paginate<F>(store: &dyn KvRead, req: &PageRequest, on_result: F) -> OrmResult<PageResponse>
where
    F: FnMut(&[u8], &[u8], bool) -> OrmResult<bool>,
{
    Paginator::default().filtered_paginate(store, req, on_result)
}

/// Fills `dest` with one page of records from `it` and closes it.
///
/// The iterator must already be positioned, e.g. by
/// [`MultiKeyIndex::get_paginated`](crate::MultiKeyIndex::get_paginated);
/// row ids are the page keys.
pub fn paginate_records<T, S, I>(it: &mut I, req: &PageRequest, dest: &mut S) -> OrmResult<PageResponse>
where
    T: Model,
    S: RecordSlice<T> + ?Sized,
    I: RecordIterator + ?Sized,
{
    Paginator::default().paginate_records(it, req, dest)
}

/// Like [`paginate_records`], keeping only records accepted by
/// `predicate(row_id, record)`.
pub fn filtered_paginate_records<T, S, I, P>(
    it: &mut I,
    req: &PageRequest,
    dest: &mut S,
    predicate: P,
) -> OrmResult<PageResponse>
where
    T: Model,
    S: RecordSlice<T> + ?Sized,
    I: RecordIterator + ?Sized,
    P: FnMut(&[u8], &T) -> OrmResult<bool>,
{
    Paginator::default().filtered_paginate_records(it, req, dest, predicate)
}

/// Returns one page of `map` entries.
///
/// [`PageResponse::next_key`] is the raw key of the next entry.
pub fn collection_paginate<K, V>(
    store: &dyn KvRead,
    map: &Map<K, V>,
    req: &PageRequest,
) -> OrmResult<(Vec<(K, V)>, PageResponse)>
where
    K: IndexKey,
    V: Model,
{
    Paginator::default().collection_paginate(store, map, req)
}

/// Like [`collection_paginate`], keeping only entries accepted by
/// `predicate`.
pub fn filtered_collection_paginate<K, V, P>(
    store: &dyn KvRead,
    map: &Map<K, V>,
    req: &PageRequest,
    predicate: P,
) -> OrmResult<(Vec<(K, V)>, PageResponse)>
where
    K: IndexKey,
    V: Model,
    P: FnMut(&K, &V) -> OrmResult<bool>,
{
    Paginator::default().filtered_collection_paginate(store, map, req, predicate)
}
