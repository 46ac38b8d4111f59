//! Key layout test vectors.
//!
//! The byte layout of table rows, sequences and index entries is the on-disk
//! format, so it is pinned here as hex and checked against the live encoders.

use kvorm_core::{build_key_from_parts, prefix_range, KeyPart, OrmError};
use serde::{Deserialize, Serialize};

/// A key part as written in a vector file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VectorPart {
    /// Hex-encoded bytes.
    Bytes(String),
    /// UTF-8 string.
    Str(String),
    /// Unsigned integer.
    Uint64(u64),
}

impl VectorPart {
    /// Converts to a key part.
    pub fn to_part(&self) -> KeyPart {
        match self {
            Self::Bytes(hex) => KeyPart::Bytes(hex_decode(hex)),
            Self::Str(s) => KeyPart::Str(s.clone()),
            Self::Uint64(n) => KeyPart::Uint64(*n),
        }
    }
}

/// A composite key encoding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Parts in key order.
    pub parts: Vec<VectorPart>,
    /// Expected key (hex-encoded).
    pub expected_hex: Option<String>,
    /// Expected error kind, see [`error_kind`].
    pub expected_error: Option<String>,
}

/// A prefix range vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Prefix (hex-encoded).
    pub prefix_hex: String,
    /// Expected exclusive end (hex-encoded), `None` when unbounded.
    pub end_hex: Option<String>,
    /// Expected error kind, see [`error_kind`].
    pub expected_error: Option<String>,
}

/// A store layout vector: records created in order through
/// [`RecordFixture`](crate::fixtures::RecordFixture) and the keys they leave
/// behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// `(name, metadata hex)` of each created record.
    pub records: Vec<(String, String)>,
    /// Every store key after the writes, ascending (hex-encoded).
    pub expected_keys_hex: Vec<String>,
}

fn key(id: &str, description: &str, parts: Vec<VectorPart>, expected_hex: &str) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        parts,
        expected_hex: Some(expected_hex.into()),
        expected_error: None,
    }
}

fn key_err(id: &str, description: &str, parts: Vec<VectorPart>, error: &str) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        parts,
        expected_hex: None,
        expected_error: Some(error.into()),
    }
}

/// Composite key vectors.
pub fn key_vectors() -> Vec<KeyVector> {
    use VectorPart::{Bytes, Str, Uint64};
    vec![
        key("uint64_single", "Single uint64 part", vec![Uint64(1)], "0000000000000001"),
        key(
            "uint64_then_str",
            "Final string part is raw",
            vec![Uint64(1), Str("ab".into())],
            "00000000000000016162",
        ),
        key(
            "str_then_uint64",
            "Non-final string part is null-terminated",
            vec![Str("ab".into()), Uint64(2)],
            "6162000000000000000002",
        ),
        key(
            "bytes_then_str",
            "Non-final byte part is length-prefixed",
            vec![Bytes("0102".into()), Str("x".into())],
            "02010278",
        ),
        key(
            "bytes_final",
            "Final byte part is raw",
            vec![Uint64(7), Bytes("ff00".into())],
            "0000000000000007ff00",
        ),
        key(
            "empty_bytes_vanish",
            "An empty non-final byte part encodes to nothing",
            vec![Bytes(String::new()), Uint64(1)],
            "0000000000000001",
        ),
        key_err(
            "str_with_nul",
            "Non-final string parts must not contain 0x00",
            vec![Str("a\0b".into()), Uint64(1)],
            "invalid_argument",
        ),
        key_err(
            "bytes_too_long",
            "Non-final byte parts are limited to 255 bytes",
            vec![Bytes("07".repeat(256)), Uint64(1)],
            "key_max_length",
        ),
    ]
}

/// Prefix range vectors.
pub fn range_vectors() -> Vec<RangeVector> {
    let range = |id: &str, prefix: &str, end: Option<&str>| RangeVector {
        id: id.into(),
        prefix_hex: prefix.into(),
        end_hex: end.map(Into::into),
        expected_error: None,
    };
    vec![
        range("single_byte", "01", Some("02")),
        range("carry", "0f2affff", Some("0f2b0000")),
        range("carry_into_first", "00ff", Some("0100")),
        range("all_ff", "ffff", None),
        RangeVector {
            id: "empty".into(),
            prefix_hex: String::new(),
            end_hex: None,
            expected_error: Some("invalid_argument".into()),
        },
    ]
}

/// Store layout vectors.
pub fn layout_vectors() -> Vec<LayoutVector> {
    vec![
        LayoutVector {
            id: "single_record".into(),
            description: "Row, sequence and both index entries of one record".into(),
            records: vec![("t1".into(), "616263".into())],
            expected_keys_hex: vec![
                "01000000000000000001".into(),
                "0201".into(),
                "03036162630000000000000001".into(),
                "047431000000000000000001".into(),
            ],
        },
        LayoutVector {
            id: "empty_metadata".into(),
            description: "Empty metadata is not indexed".into(),
            records: vec![("a".into(), String::new()), ("b".into(), "01".into())],
            expected_keys_hex: vec![
                "01000000000000000001".into(),
                "01000000000000000002".into(),
                "0201".into(),
                "0301010000000000000002".into(),
                "0461000000000000000001".into(),
                "0462000000000000000002".into(),
            ],
        },
    ]
}

/// Returns a stable name for the kind of `err`.
pub fn error_kind(err: &OrmError) -> &'static str {
    match err {
        OrmError::NotFound => "not_found",
        OrmError::UniqueConstraint => "unique_constraint",
        OrmError::InvalidArgument { .. } => "invalid_argument",
        OrmError::InvalidType { .. } => "invalid_type",
        OrmError::EmptyKey => "empty_key",
        OrmError::IteratorDone => "iterator_done",
        OrmError::InvalidIterator => "invalid_iterator",
        OrmError::KeyMaxLength { .. } => "key_max_length",
        OrmError::Validation { .. } => "validation",
        OrmError::InvalidOperation { .. } => "invalid_operation",
        OrmError::Storage(_) => "storage",
        OrmError::Codec(_) => "codec",
    }
}

/// Encodes the parts of `vector`, mapping errors to their kind.
pub fn run_key_vector(vector: &KeyVector) -> Result<String, &'static str> {
    let parts: Vec<KeyPart> = vector.parts.iter().map(VectorPart::to_part).collect();
    build_key_from_parts(&parts)
        .map(|key| hex_encode(&key))
        .map_err(|err| error_kind(&err))
}

/// Computes the range end of `vector`, mapping errors to their kind.
pub fn run_range_vector(vector: &RangeVector) -> Result<Option<String>, &'static str> {
    prefix_range(&hex_decode(&vector.prefix_hex))
        .map(|(_, end)| end.map(|end| hex_encode(&end)))
        .map_err(|err| error_kind(&err))
}

/// Generate all test vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        keys: key_vectors(),
        ranges: range_vectors(),
        layouts: layout_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    keys: Vec<KeyVector>,
    ranges: Vec<RangeVector>,
    layouts: Vec<LayoutVector>,
}

/// Encodes bytes as hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes hexadecimal string to bytes.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{RecordFixture, TestRecord};

    #[test]
    fn test_key_vectors() {
        for vector in key_vectors() {
            let expected = match (&vector.expected_hex, &vector.expected_error) {
                (Some(hex), None) => Ok(hex.clone()),
                (None, Some(kind)) => Err(kind.as_str()),
                _ => panic!("Vector {} must set exactly one expectation", vector.id),
            };
            assert_eq!(
                run_key_vector(&vector),
                expected,
                "Vector {} failed: {}",
                vector.id,
                vector.description
            );
        }
    }

    #[test]
    fn test_range_vectors() {
        for vector in range_vectors() {
            let actual = run_range_vector(&vector);
            match &vector.expected_error {
                Some(kind) => assert_eq!(actual, Err(kind.as_str()), "Vector {}", vector.id),
                None => assert_eq!(actual, Ok(vector.end_hex.clone()), "Vector {}", vector.id),
            }
        }
    }

    #[test]
    fn test_layout_vectors() {
        for vector in layout_vectors() {
            let mut fx = RecordFixture::new();
            for (name, metadata) in &vector.records {
                fx.create(&TestRecord::new(name.as_str(), &hex_decode(metadata)))
                    .unwrap();
            }
            let keys: Vec<String> = fx.store.entries().map(|(k, _)| hex_encode(k)).collect();
            assert_eq!(keys, vector.expected_keys_hex, "Vector {} failed", vector.id);
        }
    }

    #[test]
    fn test_row_values_are_canonical_cbor() {
        let mut fx = RecordFixture::new();
        let id = fx.create(&TestRecord::new("t1", b"abc")).unwrap();
        let row_key = hex_decode("0100").into_iter().chain(kvorm_core::encode_sequence(id));
        let row_key: Vec<u8> = row_key.collect();
        let (_, value) = fx
            .store
            .entries()
            .find(|(k, _)| *k == row_key.as_slice())
            .expect("row is stored");
        let expected = TestRecord {
            id,
            ..TestRecord::new("t1", b"abc")
        };
        assert_eq!(value, kvorm_codec::to_canonical_cbor(&expected).unwrap().as_slice());
        assert_eq!(kvorm_codec::from_cbor::<TestRecord>(value).unwrap(), expected);
    }

    #[test]
    fn test_hex_roundtrip() {
        assert_eq!(hex_encode(&hex_decode("00ff 7a")), "00ff7a");
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        assert!(json.contains("str_then_uint64"));
        assert!(json.contains("carry_into_first"));
        let parsed: AllTestVectors = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.keys.len(), key_vectors().len());
    }
}
