//! Byte-key encoding.
//!
//! Composite keys are built from typed parts so that lexicographic byte order
//! matches the natural order of each part and no encoded part can be a prefix
//! of another:
//!
//! | part     | non-final encoding           | final encoding |
//! |----------|------------------------------|----------------|
//! | bytes    | `len ‖ bytes` (len ≤ 255)    | raw bytes      |
//! | string   | `utf8 ‖ 0x00`                | raw utf8       |
//! | uint64   | 8-byte big-endian            | 8-byte big-endian |

use crate::error::{OrmError, OrmResult};

/// Maximum length of a length-prefixed byte part.
pub const MAX_BYTES_PART_LEN: usize = 255;

/// Encodes `n` as 8 big-endian bytes.
#[must_use]
pub const fn encode_sequence(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Decodes an 8-byte big-endian integer. Empty input decodes to zero.
///
/// # Errors
///
/// Returns [`OrmError::InvalidArgument`] for any length other than 0 or 8.
pub fn decode_sequence(bytes: &[u8]) -> OrmResult<u64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        OrmError::invalid_argument(format!("expected 8 bytes, got {}", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(arr))
}

/// Prepends one byte holding `bytes.len()`. Empty input stays empty.
///
/// # Errors
///
/// Returns [`OrmError::KeyMaxLength`] if `bytes` is longer than 255 bytes.
pub fn add_length_prefix(bytes: &[u8]) -> OrmResult<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let len = u8::try_from(bytes.len()).map_err(|_| OrmError::KeyMaxLength { len: bytes.len() })?;
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Appends a `0x00` terminator to `s`.
#[must_use]
pub fn null_terminated(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

/// The type of a derived index key part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyShape {
    /// Length-prefixed bytes.
    Bytes,
    /// Null-terminated UTF-8.
    Str,
    /// 8-byte big-endian integer.
    Uint64,
}

/// A typed key part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    Str(String),
    /// Unsigned integer.
    Uint64(u64),
}

impl KeyPart {
    /// Returns the shape of this part.
    #[must_use]
    pub fn shape(&self) -> KeyShape {
        match self {
            Self::Bytes(_) => KeyShape::Bytes,
            Self::Str(_) => KeyShape::Str,
            Self::Uint64(_) => KeyShape::Uint64,
        }
    }

    /// Encodes the part for a position followed by further parts.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::KeyMaxLength`] for byte parts over 255 bytes and
    /// [`OrmError::InvalidArgument`] for strings containing `0x00`.
    pub fn encode(&self) -> OrmResult<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => add_length_prefix(bytes),
            Self::Str(s) => {
                if s.as_bytes().contains(&0) {
                    return Err(OrmError::invalid_argument(
                        "string key part must not contain 0x00",
                    ));
                }
                Ok(null_terminated(s))
            }
            Self::Uint64(n) => Ok(encode_sequence(*n).to_vec()),
        }
    }

    /// Encodes the part for the final position of a key.
    #[must_use]
    pub fn encode_last(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Uint64(n) => encode_sequence(*n).to_vec(),
        }
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for KeyPart {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<u64> for KeyPart {
    fn from(n: u64) -> Self {
        Self::Uint64(n)
    }
}

/// Concatenates `parts` into a key.
///
/// Every part but the last uses the prefix-safe encoding of
/// [`KeyPart::encode`]; the last part (or a single part) is emitted raw.
///
/// # Errors
///
/// Propagates encoding errors of non-final parts.
pub fn build_key_from_parts(parts: &[KeyPart]) -> OrmResult<Vec<u8>> {
    let Some((last, init)) = parts.split_last() else {
        return Ok(Vec::new());
    };
    let mut key = Vec::new();
    for part in init {
        key.extend(part.encode()?);
    }
    key.extend(last.encode_last());
    Ok(key)
}

/// Returns the row id suffix of an index entry key `encoded_part ‖ row_id`.
///
/// # Errors
///
/// Returns [`OrmError::InvalidArgument`] if `key` is too short for `shape`
/// or a string part has no terminator.
pub fn strip_row_id(key: &[u8], shape: KeyShape) -> OrmResult<&[u8]> {
    let offset = match shape {
        KeyShape::Bytes => {
            let len = *key
                .first()
                .ok_or_else(|| OrmError::invalid_argument("empty index key"))?;
            usize::from(len) + 1
        }
        KeyShape::Str => {
            let nul = key
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| OrmError::invalid_argument("string index key is not terminated"))?;
            nul + 1
        }
        KeyShape::Uint64 => 8,
    };
    key.get(offset..)
        .ok_or_else(|| OrmError::invalid_argument("index key shorter than its key part"))
}

/// Returns `[prefix, succ(prefix))`, the range of keys starting with `prefix`.
///
/// `succ` increments the last byte, carrying through trailing `0xFF` bytes,
/// and keeps the length of `prefix`. The end is `None` when `prefix` is all
/// `0xFF`.
///
/// # Errors
///
/// Returns [`OrmError::InvalidArgument`] for an empty prefix; callers iterate
/// `(None, None)` for the full domain explicitly.
///
/// # Example
///
/// ```rust
/// use kvorm_core::prefix_range;
///
/// let (start, end) = prefix_range(&[15, 42, 255, 255]).unwrap();
/// assert_eq!(start, vec![15, 42, 255, 255]);
/// assert_eq!(end, Some(vec![15, 43, 0, 0]));
/// ```
pub fn prefix_range(prefix: &[u8]) -> OrmResult<(Vec<u8>, Option<Vec<u8>>)> {
    if prefix.is_empty() {
        return Err(OrmError::invalid_argument("prefix must not be empty"));
    }
    let mut end = prefix.to_vec();
    let Some(pos) = end.iter().rposition(|b| *b != u8::MAX) else {
        return Ok((prefix.to_vec(), None));
    };
    end[pos] += 1;
    end[pos + 1..].fill(0);
    Ok((prefix.to_vec(), Some(end)))
}

/// Normalizes typed scan bounds to bytes.
///
/// `None` leaves that side open. When both bounds are given, `start` must
/// encode strictly below `end`.
///
/// # Errors
///
/// Returns [`OrmError::InvalidArgument`] if `start >= end`.
pub fn get_start_end_bz(
    start: Option<&KeyPart>,
    end: Option<&KeyPart>,
) -> OrmResult<(Option<Vec<u8>>, Option<Vec<u8>>)> {
    let start = start.map(KeyPart::encode).transpose()?;
    let end = end.map(KeyPart::encode).transpose()?;
    if let (Some(start), Some(end)) = (&start, &end) {
        if start >= end {
            return Err(OrmError::invalid_argument("start must be less than end"));
        }
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn length_prefix_rules() {
        assert_eq!(add_length_prefix(b"").unwrap(), Vec::<u8>::new());
        assert_eq!(add_length_prefix(b"ab").unwrap(), vec![2, b'a', b'b']);
        assert_eq!(add_length_prefix(&[7; 255]).unwrap().len(), 256);
        assert_eq!(
            add_length_prefix(&[7; 256]),
            Err(OrmError::KeyMaxLength { len: 256 })
        );
    }

    #[test]
    fn sequence_decoding() {
        assert_eq!(decode_sequence(&[]).unwrap(), 0);
        assert_eq!(decode_sequence(&encode_sequence(513)).unwrap(), 513);
        assert!(decode_sequence(&[1, 2, 3]).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn single_part_is_raw() {
        assert_eq!(
            build_key_from_parts(&[KeyPart::from(&b"abc"[..])]).unwrap(),
            b"abc".to_vec()
        );
        assert_eq!(build_key_from_parts(&[KeyPart::from("abc")]).unwrap(), b"abc".to_vec());
        assert_eq!(
            build_key_from_parts(&[KeyPart::Uint64(1)]).unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn composite_keys_encode_leading_parts() {
        let key = build_key_from_parts(&[
            KeyPart::from(&b"ab"[..]),
            KeyPart::from("cd"),
            KeyPart::Uint64(2),
            KeyPart::from("tail"),
        ])
        .unwrap();
        let mut expected = vec![2, b'a', b'b', b'c', b'd', 0];
        expected.extend_from_slice(&encode_sequence(2));
        expected.extend_from_slice(b"tail");
        assert_eq!(key, expected);
    }

    #[test]
    fn composite_rejects_oversize_leading_part() {
        let err = build_key_from_parts(&[KeyPart::Bytes(vec![0; 300]), KeyPart::Uint64(1)]);
        assert_eq!(err, Err(OrmError::KeyMaxLength { len: 300 }));
    }

    #[test]
    fn strip_row_id_by_shape() {
        assert_eq!(strip_row_id(&[2, 9, 9, 1, 2], KeyShape::Bytes).unwrap(), &[1, 2]);
        assert_eq!(strip_row_id(b"ab\0rr", KeyShape::Str).unwrap(), b"rr");
        let mut key = encode_sequence(5).to_vec();
        key.push(7);
        assert_eq!(strip_row_id(&key, KeyShape::Uint64).unwrap(), &[7]);

        assert!(strip_row_id(&[], KeyShape::Bytes).is_err());
        assert!(strip_row_id(&[5, 1], KeyShape::Bytes).is_err());
        assert!(strip_row_id(b"abc", KeyShape::Str).is_err());
        assert!(strip_row_id(&[1, 2], KeyShape::Uint64).is_err());
    }

    #[test]
    fn string_parts_reject_interior_nul() {
        assert!(KeyPart::from("a\0b").encode().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn prefix_range_cases() {
        assert_eq!(
            prefix_range(&[1, 3, 4]).unwrap(),
            (vec![1, 3, 4], Some(vec![1, 3, 5]))
        );
        assert_eq!(
            prefix_range(&[15, 42, 255, 255]).unwrap().1,
            Some(vec![15, 43, 0, 0])
        );
        assert_eq!(prefix_range(&[255, 255, 255, 255]).unwrap().1, None);
        assert!(prefix_range(&[]).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn start_end_bounds() {
        let (start, end) = get_start_end_bz(Some(&KeyPart::Uint64(1)), None).unwrap();
        assert_eq!(start, Some(encode_sequence(1).to_vec()));
        assert_eq!(end, None);

        let err = get_start_end_bz(Some(&KeyPart::from("b")), Some(&KeyPart::from("a"))).unwrap_err();
        assert!(err.is_invalid_argument());
        let err = get_start_end_bz(Some(&KeyPart::Uint64(3)), Some(&KeyPart::Uint64(3)));
        assert!(err.is_err());
        assert_eq!(get_start_end_bz(None, None).unwrap(), (None, None));
    }

    proptest! {
        #[test]
        fn uint64_encoding_preserves_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(a.cmp(&b), encode_sequence(a).cmp(&encode_sequence(b)));
        }

        #[test]
        fn strip_inverts_composite(
            part in prop_oneof![
                proptest::collection::vec(any::<u8>(), 1..64).prop_map(KeyPart::Bytes),
                any::<u64>().prop_map(KeyPart::Uint64),
                "[a-z]{1,16}".prop_map(KeyPart::Str),
            ],
            row in proptest::collection::vec(any::<u8>(), 1..16),
        ) {
            let key = build_key_from_parts(&[part.clone(), KeyPart::Bytes(row.clone())]).unwrap();
            prop_assert_eq!(strip_row_id(&key, part.shape()).unwrap(), row.as_slice());
        }

        #[test]
        fn prefix_range_end_is_the_successor(prefix in proptest::collection::vec(any::<u8>(), 1..8)) {
            let (start, end) = prefix_range(&prefix).unwrap();
            prop_assert_eq!(&start, &prefix);
            match end {
                Some(end) => {
                    prop_assert!(end > prefix);
                    prop_assert_eq!(end.len(), prefix.len());
                    // No key of the same length fits strictly between.
                    let as_int = |b: &[u8]| b.iter().fold(0u128, |acc, x| acc * 256 + u128::from(*x));
                    prop_assert_eq!(as_int(&end), as_int(&prefix) + 1);
                }
                None => prop_assert!(prefix.iter().all(|b| *b == u8::MAX)),
            }
        }
    }
}
