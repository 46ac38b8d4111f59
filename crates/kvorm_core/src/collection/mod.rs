//! Typed collections.
//!
//! [`Map`] stores values of one [`Model`](crate::Model) type under ordered
//! keys. Pages of a map are read with
//! [`collection_paginate`](crate::collection_paginate).

mod map;

pub use map::{Map, MapIterator, Order};
