use super::schema::{Field, FieldKind, LengthPrefix, Schema};
use super::unlimited::{decode_length_from_unlimited, encode_length_for_unlimited};
use super::CodecError;
use crate::binary::Uint;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integers and fixed-width binary values
    Uint(Uint),
    /// Opaque length-prefixed bytes
    Raw(Vec<u8>),
    Bool(bool),
    Object(Record),
    Array(Vec<Record>),
}

/// Ordered `(key, value)` list matching a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    pub fn with(mut self, key: &'static str, value: Value) -> Record {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &'static str, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(k, _)| *k == key)?;
        Some(self.fields.remove(position).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    pub fn take_uint(&mut self, key: &str) -> Result<Uint, CodecError> {
        match self.remove(key) {
            Some(Value::Uint(v)) => Ok(v),
            other => Err(shape_error(key, "uint", other)),
        }
    }

    pub fn take_raw(&mut self, key: &str) -> Result<Vec<u8>, CodecError> {
        match self.remove(key) {
            Some(Value::Raw(v)) => Ok(v),
            other => Err(shape_error(key, "bytes", other)),
        }
    }

    pub fn take_bool(&mut self, key: &str) -> Result<bool, CodecError> {
        match self.remove(key) {
            Some(Value::Bool(v)) => Ok(v),
            other => Err(shape_error(key, "bool", other)),
        }
    }

    pub fn take_object(&mut self, key: &str) -> Result<Record, CodecError> {
        match self.remove(key) {
            Some(Value::Object(v)) => Ok(v),
            other => Err(shape_error(key, "object", other)),
        }
    }

    pub fn take_array(&mut self, key: &str) -> Result<Vec<Record>, CodecError> {
        match self.remove(key) {
            Some(Value::Array(v)) => Ok(v),
            other => Err(shape_error(key, "array", other)),
        }
    }
}

fn shape_error(key: &str, expected: &str, found: Option<Value>) -> CodecError {
    match found {
        None => CodecError::Decode(format!("field {key} is missing")),
        Some(_) => CodecError::Decode(format!("field {key} is not a {expected}")),
    }
}

/// Encodes `record` in schema order. With `for_hash`, fields marked
/// `hash_remove` are skipped. Nested objects and array items are always
/// encoded in full.
pub fn encode(record: &Record, schema: &Schema, for_hash: bool) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for field in schema {
        if for_hash && field.hash_remove {
            continue;
        }
        let value = record
            .get(field.key)
            .ok_or_else(|| CodecError::Encode(format!("field {} is missing", field.key)))?;
        encode_field(&mut out, field, value)?;
    }
    Ok(out)
}

fn encode_field(out: &mut Vec<u8>, field: &Field, value: &Value) -> Result<(), CodecError> {
    let key = field.key;
    match (&field.kind, value) {
        (FieldKind::BigInt, Value::Uint(v)) => {
            let short = v.to_short();
            write_prefix(out, key, LengthPrefix::Fixed(1), short.len())?;
            out.extend_from_slice(short.get_raw());
        }
        (FieldKind::Bool, Value::Bool(v)) => out.push(u8::from(*v)),
        (FieldKind::Version, Value::Uint(v)) => {
            if !v.to_short().is_empty() {
                return Err(CodecError::Encode(format!("{key}: unsupported version {v}")));
            }
            out.push(0x00);
        }
        (kind @ (FieldKind::Address
        | FieldKind::Hash
        | FieldKind::Signature
        | FieldKind::Fixed(_)), Value::Uint(v)) => {
            let width = kind.fixed_width().unwrap_or_default();
            if v.len() != width {
                return Err(CodecError::Encode(format!(
                    "{key}: expected {width} bytes, got {}",
                    v.len()
                )));
            }
            out.extend_from_slice(v.get_raw());
        }
        (FieldKind::Bytes(prefix), Value::Raw(bytes)) => {
            write_prefix(out, key, *prefix, bytes.len())?;
            out.extend_from_slice(bytes);
        }
        (FieldKind::Object(schema), Value::Object(nested)) => {
            out.extend_from_slice(&encode(nested, schema, false)?);
        }
        (FieldKind::Array(prefix, schema), Value::Array(items)) => {
            write_prefix(out, key, *prefix, items.len())?;
            for item in items {
                out.extend_from_slice(&encode(item, schema, false)?);
            }
        }
        (kind, _) => {
            return Err(CodecError::Encode(format!(
                "{key}: value does not match field kind {kind:?}"
            )))
        }
    }
    Ok(())
}

fn write_prefix(
    out: &mut Vec<u8>,
    key: &str,
    prefix: LengthPrefix,
    length: usize,
) -> Result<(), CodecError> {
    match prefix {
        LengthPrefix::Unlimited => out.extend_from_slice(&encode_length_for_unlimited(length)),
        LengthPrefix::Fixed(width) => {
            let encoded = Uint::from_u64(length as u64, width).map_err(|_| {
                CodecError::Encode(format!("{key}: length {length} does not fit {width} bytes"))
            })?;
            out.extend_from_slice(encoded.get_raw());
        }
    }
    Ok(())
}

/// Decodes one record from the start of `bytes`, returning it together with
/// the number of bytes consumed.
pub fn decode(bytes: &[u8], schema: &Schema) -> Result<(Record, usize), CodecError> {
    let mut cursor = Cursor { bytes, position: 0 };
    let mut record = Record::new();
    for field in schema {
        let value = decode_field(&mut cursor, field)?;
        record.insert(field.key, value);
    }
    Ok((record, cursor.position))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.position..]
    }

    fn take(&mut self, key: &str, length: usize) -> Result<&'a [u8], CodecError> {
        let rest = self.remaining();
        if rest.len() < length {
            return Err(CodecError::Decode(format!(
                "{key}: needs {length} bytes, {} left",
                rest.len()
            )));
        }
        self.position += length;
        Ok(&rest[..length])
    }

    fn read_prefix(&mut self, key: &str, prefix: LengthPrefix) -> Result<usize, CodecError> {
        match prefix {
            LengthPrefix::Unlimited => {
                let (length, prefix_len) = decode_length_from_unlimited(self.remaining())
                    .map_err(|e| CodecError::Decode(format!("{key}: {e}")))?;
                self.position += prefix_len;
                Ok(length)
            }
            LengthPrefix::Fixed(width) => {
                let raw = self.take(key, width)?;
                let length = Uint::from_raw(raw.to_vec())
                    .to_u64()
                    .ok()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        CodecError::Decode(format!("{key}: length prefix overflows"))
                    })?;
                Ok(length)
            }
        }
    }
}

fn decode_field(cursor: &mut Cursor<'_>, field: &Field) -> Result<Value, CodecError> {
    let key = field.key;
    let value = match &field.kind {
        FieldKind::BigInt => {
            let length = cursor.read_prefix(key, LengthPrefix::Fixed(1))?;
            Value::Uint(Uint::from_raw(cursor.take(key, length)?.to_vec()))
        }
        FieldKind::Bool => match cursor.take(key, 1)?[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(CodecError::Decode(format!(
                    "{key}: invalid bool byte {other:#04x}"
                )))
            }
        },
        FieldKind::Version => {
            let version = cursor.take(key, 1)?[0];
            if version != 0x00 {
                return Err(CodecError::Decode(format!(
                    "{key}: unsupported version {version:#04x}"
                )));
            }
            Value::Uint(Uint::from_raw(vec![version]))
        }
        kind @ (FieldKind::Address | FieldKind::Hash | FieldKind::Signature | FieldKind::Fixed(_)) => {
            let width = kind.fixed_width().unwrap_or_default();
            Value::Uint(Uint::from_raw(cursor.take(key, width)?.to_vec()))
        }
        FieldKind::Bytes(prefix) => {
            let length = cursor.read_prefix(key, *prefix)?;
            Value::Raw(cursor.take(key, length)?.to_vec())
        }
        FieldKind::Object(schema) => {
            let (nested, consumed) = decode(cursor.remaining(), schema)?;
            cursor.position += consumed;
            Value::Object(nested)
        }
        FieldKind::Array(prefix, schema) => {
            let count = cursor.read_prefix(key, *prefix)?;
            // every element occupies at least one byte
            if count > cursor.remaining().len() {
                return Err(CodecError::Decode(format!(
                    "{key}: {count} elements cannot fit in {} bytes",
                    cursor.remaining().len()
                )));
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let (item, consumed) = decode(cursor.remaining(), schema)?;
                cursor.position += consumed;
                items.push(item);
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &Schema = &[
        Field::new("flag", FieldKind::Bool),
        Field::new("amount", FieldKind::BigInt),
    ];

    const OUTER: &Schema = &[
        Field::new("version", FieldKind::Version),
        Field::new("id", FieldKind::Hash).hash_removed(),
        Field::new("note", FieldKind::Bytes(LengthPrefix::Unlimited)),
        Field::new("items", FieldKind::Array(LengthPrefix::Fixed(2), ITEM)),
    ];

    fn item(flag: bool, amount: u64) -> Record {
        Record::new()
            .with("flag", Value::Bool(flag))
            .with("amount", Value::Uint(Uint::from(amount)))
    }

    fn outer() -> Record {
        Record::new()
            .with("version", Value::Uint(Uint::from_raw(vec![0])))
            .with("id", Value::Uint(Uint::from_raw(vec![0xaa; 32])))
            .with("note", Value::Raw(b"hi".to_vec()))
            .with("items", Value::Array(vec![item(true, 300), item(false, 0)]))
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&outer(), OUTER, false).unwrap();

        let mut expected = vec![0x00];
        expected.extend_from_slice(&[0xaa; 32]);
        expected.extend_from_slice(&[0x2f, b'h', b'i']);
        expected.extend_from_slice(&[0x00, 0x02]);
        expected.extend_from_slice(&[0x01, 0x02, 0x01, 0x2c]);
        expected.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_for_hash_skips_removed_fields() {
        let full = encode(&outer(), OUTER, false).unwrap();
        let for_hash = encode(&outer(), OUTER, true).unwrap();
        assert_eq!(full.len() - for_hash.len(), 32);
        assert!(!for_hash.windows(32).any(|w| w == [0xaa; 32]));
    }

    #[test]
    fn test_decode_reports_consumed_length() {
        let mut bytes = encode(&outer(), OUTER, false).unwrap();
        let encoded_len = bytes.len();
        bytes.extend_from_slice(&[0xde, 0xad]);

        let (record, consumed) = decode(&bytes, OUTER).unwrap();
        assert_eq!(consumed, encoded_len);
        assert_eq!(record.get("note"), Some(&Value::Raw(b"hi".to_vec())));

        let mut record = record;
        let items = record.take_array("items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("amount"), Some(&Value::Uint(Uint::from(300u64))));
        assert_eq!(items[1].get("amount"), Some(&Value::Uint(Uint::empty())));
    }

    #[test]
    fn test_truncated_hash_is_decode_error() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&[0x11; 10]);
        assert!(matches!(decode(&bytes, OUTER), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_wrong_version_is_decode_error() {
        let mut bytes = encode(&outer(), OUTER, false).unwrap();
        bytes[0] = 0x01;
        assert!(decode(&bytes, OUTER).is_err());
    }

    #[test]
    fn test_missing_field_is_encode_error() {
        let mut record = outer();
        record.remove("note");
        assert!(matches!(
            encode(&record, OUTER, false),
            Err(CodecError::Encode(_))
        ));
    }

    #[test]
    fn test_wrong_width_is_encode_error() {
        let record = outer().with("id", Value::Uint(Uint::from_raw(vec![0xaa; 31])));
        assert!(encode(&record, OUTER, false).is_err());
    }

    #[test]
    fn test_array_count_overflowing_prefix() {
        const SMALL: &Schema = &[Field::new("items", FieldKind::Array(LengthPrefix::Fixed(1), ITEM))];
        let record = Record::new().with("items", Value::Array(vec![item(true, 1); 256]));
        assert!(encode(&record, SMALL, false).is_err());
    }

    #[test]
    fn test_absurd_array_count_is_rejected() {
        let mut bytes = encode(&outer(), OUTER, false).unwrap();
        let count_at = 1 + 32 + 3;
        bytes[count_at] = 0xff;
        bytes[count_at + 1] = 0xff;
        assert!(decode(&bytes, OUTER).is_err());
    }
}
