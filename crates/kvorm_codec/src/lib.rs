//! # kvorm Codec
//!
//! Deterministic CBOR encoding for records stored by kvorm.
//!
//! Any `serde` type can be encoded. The output is canonical:
//! - Identical logical values produce identical bytes
//! - Map entry order does not depend on insertion order
//! - Output is stable across platforms
//!
//! ## Usage
//!
//! ```
//! use kvorm_codec::{from_cbor, to_canonical_cbor};
//!
//! let bytes = to_canonical_cbor(&("alice", 42u32)).unwrap();
//! let decoded: (String, u32) = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, ("alice".to_string(), 42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;

pub use cbor::{from_cbor, to_canonical_cbor};
pub use error::{CodecError, CodecResult};
