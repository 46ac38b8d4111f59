//! Core type definitions for kvorm.

use crate::error::{OrmError, OrmResult};
use crate::key::{decode_sequence, encode_sequence};
use std::fmt;

/// Identity of a record within a table.
///
/// Auto-id tables use the 8-byte big-endian encoding of the id; primary-key
/// tables use the encoded primary key. Row ids handed to write operations
/// must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(Vec<u8>);

impl RowId {
    /// Creates a row id from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Creates the row id of an auto-id table row.
    #[must_use]
    pub fn from_u64(id: u64) -> Self {
        Self(encode_sequence(id).to_vec())
    }

    /// Decodes an auto-id row id.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidArgument`] if the row id is not 8 bytes.
    pub fn to_u64(&self) -> OrmResult<u64> {
        if self.0.len() != 8 {
            return Err(OrmError::invalid_argument(format!(
                "row id of {} bytes is not an auto id",
                self.0.len()
            )));
        }
        decode_sequence(&self.0)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the row id and returns the raw bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Returns `true` if the row id has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RowId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RowId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for RowId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("row:")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_ids_order_numerically() {
        assert!(RowId::from_u64(9) < RowId::from_u64(10));
        assert!(RowId::from_u64(255) < RowId::from_u64(256));
    }

    #[test]
    fn u64_roundtrip() {
        assert_eq!(RowId::from_u64(42).to_u64().unwrap(), 42);
        assert!(RowId::new(vec![1, 2]).to_u64().is_err());
    }

    #[test]
    fn display_is_hex() {
        let row = RowId::new(vec![0x0a, 0xff]);
        assert_eq!(format!("{row}"), "row:0aff");
    }
}
