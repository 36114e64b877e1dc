//! Generic key/value attribute map (item attribute 128, OTBM v4+).
//!
//! ```text
//! [count u16] ( [key_len u16][key utf-8][type u8][value] )*
//!   type 1 = string  [len u16][utf-8]
//!   type 2 = integer i64
//!   type 3 = float   f32
//!   type 4 = boolean u8
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use otbm_io::{ByteReader, ByteWriter, OtbmError, OtbmResult};

const TYPE_STRING: u8 = 1;
const TYPE_INTEGER: u8 = 2;
const TYPE_FLOAT: u8 = 3;
const TYPE_BOOLEAN: u8 = 4;

/// One value in an attribute map.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    String(String),
    Integer(i64),
    Float(f32),
    Boolean(bool),
}

impl CustomValue {
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// Keyed attributes; ordered so encoding is deterministic.
pub type AttributeMap = BTreeMap<String, CustomValue>;

/// Encode an attribute map as the payload of attribute 128.
pub fn encode_attribute_map(map: &AttributeMap) -> OtbmResult<Vec<u8>> {
    let count = u16::try_from(map.len()).map_err(|_| OtbmError::PayloadTooLarge { len: map.len() })?;
    let mut w = ByteWriter::new(Vec::new());
    w.write_u16(count)?;
    for (key, value) in map {
        write_text(&mut w, key)?;
        match value {
            CustomValue::String(s) => {
                w.write_u8(TYPE_STRING)?;
                write_text(&mut w, s)?;
            }
            CustomValue::Integer(v) => {
                w.write_u8(TYPE_INTEGER)?;
                w.write_i64(*v)?;
            }
            CustomValue::Float(v) => {
                w.write_u8(TYPE_FLOAT)?;
                w.write_f32(*v)?;
            }
            CustomValue::Boolean(v) => {
                w.write_u8(TYPE_BOOLEAN)?;
                w.write_u8(u8::from(*v))?;
            }
        }
    }
    Ok(w.into_inner())
}

/// Decode the payload of attribute 128. `offset` is only used in errors.
pub fn decode_attribute_map(bytes: &[u8], offset: u64) -> OtbmResult<AttributeMap> {
    let corrupt = |reason: String| OtbmError::CorruptData { offset, reason };
    let short = |e: io::Error| corrupt(format!("attribute map: {e}"));

    let mut r = ByteReader::new(bytes);
    let count = r.read_u16().map_err(short)?;
    let mut map = AttributeMap::new();
    for _ in 0..count {
        let key = read_text(&mut r).map_err(short)?;
        let ty = r.read_u8().map_err(short)?;
        let value = match ty {
            TYPE_STRING => CustomValue::String(read_text(&mut r).map_err(short)?),
            TYPE_INTEGER => CustomValue::Integer(r.read_i64().map_err(short)?),
            TYPE_FLOAT => CustomValue::Float(r.read_f32().map_err(short)?),
            TYPE_BOOLEAN => CustomValue::Boolean(r.read_u8().map_err(short)? != 0),
            other => return Err(corrupt(format!("attribute map key {key:?}: unknown value type {other}"))),
        };
        if map.insert(key.clone(), value).is_some() {
            return Err(corrupt(format!("attribute map: duplicate key {key:?}")));
        }
    }
    if !r.at_end().map_err(short)? {
        return Err(corrupt(format!(
            "attribute map: {} trailing bytes",
            bytes.len() as u64 - r.position()
        )));
    }
    Ok(map)
}

fn write_text(w: &mut ByteWriter<Vec<u8>>, s: &str) -> OtbmResult<()> {
    let len = u16::try_from(s.len()).map_err(|_| OtbmError::PayloadTooLarge { len: s.len() })?;
    w.write_u16(len)?;
    w.write_raw(s.as_bytes())?;
    Ok(())
}

fn read_text(r: &mut ByteReader<&[u8]>) -> io::Result<String> {
    let len = r.read_u16()?;
    let bytes = r.read_raw(usize::from(len))?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_map_layout() {
        let mut map = AttributeMap::new();
        map.insert("b".into(), CustomValue::Boolean(true));
        map.insert("a".into(), CustomValue::Integer(-2));
        let bytes = encode_attribute_map(&map).unwrap();
        // count, then "a" before "b"
        assert_eq!(&bytes[..5], &[2, 0, 1, 0, b'a']);
        assert_eq!(bytes[5], TYPE_INTEGER);
        assert_eq!(decode_attribute_map(&bytes, 0).unwrap(), map);
    }

    #[test]
    fn test_mixed_values() {
        let mut map = AttributeMap::new();
        map.insert("name".into(), CustomValue::String("sword".into()));
        map.insert("weight".into(), CustomValue::Float(3.5));
        let bytes = encode_attribute_map(&map).unwrap();
        assert_eq!(decode_attribute_map(&bytes, 0).unwrap(), map);
    }

    #[test]
    fn test_unknown_type_is_corrupt() {
        let bytes = [1, 0, 1, 0, b'k', 9];
        assert!(matches!(
            decode_attribute_map(&bytes, 40),
            Err(OtbmError::CorruptData { offset: 40, .. })
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let bytes = [1, 0, 1, 0, b'k', TYPE_INTEGER, 1, 2];
        assert!(decode_attribute_map(&bytes, 0).is_err());

        let bytes = [0, 0, 0xAA];
        assert!(decode_attribute_map(&bytes, 0).is_err());
    }

    #[test]
    fn test_duplicate_key() {
        let bytes = [
            2, 0, 1, 0, b'k', TYPE_BOOLEAN, 1, 1, 0, b'k', TYPE_BOOLEAN, 0,
        ];
        assert!(decode_attribute_map(&bytes, 0).is_err());
    }
}
