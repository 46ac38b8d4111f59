//! Index key types.

use crate::error::{OrmError, OrmResult};
use crate::key::{decode_sequence, encode_sequence, KeyPart, KeyShape};
use std::fmt::Debug;
use std::hash::Hash;

/// A key that can be derived from a record and indexed.
///
/// Index keys are one of the three supported key shapes. `to_bytes` is the
/// raw, order-preserving form used when the key is the last part of a
/// storage key; index entries use the prefix-safe [`KeyPart::encode`] form
/// of [`IndexKey::to_part`].
pub trait IndexKey: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {
    /// Shape of the encoded key.
    const SHAPE: KeyShape;

    /// Returns the key as a typed key part.
    fn to_part(&self) -> KeyPart;

    /// Serializes the key to its raw bytes.
    fn to_bytes(&self) -> Vec<u8> {
        self.to_part().encode_last()
    }

    /// Deserializes the key from its raw bytes.
    fn from_bytes(bytes: &[u8]) -> OrmResult<Self>;
}

impl IndexKey for u64 {
    const SHAPE: KeyShape = KeyShape::Uint64;

    fn to_part(&self) -> KeyPart {
        KeyPart::Uint64(*self)
    }

    fn to_bytes(&self) -> Vec<u8> {
        encode_sequence(*self).to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> OrmResult<Self> {
        if bytes.len() != 8 {
            return Err(OrmError::invalid_argument("expected 8 bytes for u64 key"));
        }
        decode_sequence(bytes)
    }
}

impl IndexKey for String {
    const SHAPE: KeyShape = KeyShape::Str;

    fn to_part(&self) -> KeyPart {
        KeyPart::Str(self.clone())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> OrmResult<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| OrmError::invalid_argument("string key is not valid UTF-8"))
    }
}

impl IndexKey for Vec<u8> {
    const SHAPE: KeyShape = KeyShape::Bytes;

    fn to_part(&self) -> KeyPart {
        KeyPart::Bytes(self.clone())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> OrmResult<Self> {
        Ok(bytes.to_vec())
    }
}
