//! Schema-driven codec for fixed-layout binary structures
//!
//! Every USB/IP message and USB descriptor on the wire is a fixed-layout
//! C-style record with mixed endianness: the network framing is big-endian
//! while embedded USB descriptor integers are little-endian. Each record
//! shape is declared once as an ordered field schema; this module derives
//! the size, encoder, and decoder from that declaration.
//!
//! Decoding is strict: the input buffer must match the schema size exactly,
//! otherwise the stream has desynchronized and [`ProtocolError::LengthMismatch`]
//! is returned. Nested structure fields decode to their raw bytes; callers
//! recurse with the sub-schema explicitly, since the outer schema only knows
//! the nested block's width.

use bytes::{Buf, BufMut};

use crate::error::{ProtocolError, Result};

/// Byte order of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Network order, the USB/IP framing default.
    Big,
    /// USB descriptor convention.
    Little,
}

/// Width and shape of a single field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    /// Fixed-length byte block. Shorter values are zero-padded, longer
    /// values are clipped to the declared width.
    Bytes(usize),
    /// Embedded structure, carried as an opaque pre-encoded block.
    Struct(&'static StructSchema),
}

/// One field of a structure schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub order: Order,
    /// Value encoded when the record does not supply the field.
    pub default: u64,
}

impl FieldSpec {
    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, FieldKind::U8)
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, FieldKind::U16)
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, FieldKind::U32)
    }

    pub const fn u64(name: &'static str) -> Self {
        Self::new(name, FieldKind::U64)
    }

    pub const fn bytes(name: &'static str, len: usize) -> Self {
        Self::new(name, FieldKind::Bytes(len))
    }

    pub const fn nested(name: &'static str, schema: &'static StructSchema) -> Self {
        Self::new(name, FieldKind::Struct(schema))
    }

    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            order: Order::Big,
            default: 0,
        }
    }

    /// Tag the field little-endian (USB descriptor fields).
    pub const fn le(mut self) -> Self {
        self.order = Order::Little;
        self
    }

    /// Attach a schema-level default value.
    pub const fn with_default(mut self, value: u64) -> Self {
        self.default = value;
        self
    }

    /// Encoded width in bytes.
    pub const fn width(&self) -> usize {
        match self.kind {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(len) => len,
            FieldKind::Struct(schema) => schema.size(),
        }
    }
}

/// Ordered field list defining one wire structure.
#[derive(Debug, Clone, Copy)]
pub struct StructSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl StructSchema {
    /// Total encoded size: the sum of all field widths, recursing into
    /// nested schemas.
    pub const fn size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].width();
            i += 1;
        }
        total
    }
}

/// A single field value inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

/// Name -> value map for one structure, in insertion order.
///
/// Fields absent at encode time fall back to the schema default. Decoding
/// always produces one entry per schema field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(&'static str, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uint(mut self, name: &'static str, value: u64) -> Self {
        self.put_uint(name, value);
        self
    }

    pub fn with_bytes(mut self, name: &'static str, value: impl Into<Vec<u8>>) -> Self {
        self.put_bytes(name, value);
        self
    }

    pub fn put_uint(&mut self, name: &'static str, value: u64) {
        self.put(name, FieldValue::Uint(value));
    }

    pub fn put_bytes(&mut self, name: &'static str, value: impl Into<Vec<u8>>) {
        self.put(name, FieldValue::Bytes(value.into()));
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            FieldValue::Uint(value) => Some(*value),
            FieldValue::Bytes(_) => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            FieldValue::Bytes(value) => Some(value),
            FieldValue::Uint(_) => None,
        }
    }

    fn put(&mut self, name: &'static str, value: FieldValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }
}

/// Serialize `record` per `schema`, in declared field order.
///
/// Integer fields honor their per-field byte order; missing fields encode
/// as the schema default (zero if none was declared). Byte and nested
/// fields are zero-padded or clipped to the declared width.
pub fn encode(schema: &StructSchema, record: &Record) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(schema.size());
    for field in schema.fields {
        match field.kind {
            FieldKind::U8 => {
                let value = uint_for(record, field)?;
                out.put_u8(value as u8);
            }
            FieldKind::U16 => {
                let value = uint_for(record, field)?;
                match field.order {
                    Order::Big => out.put_u16(value as u16),
                    Order::Little => out.put_u16_le(value as u16),
                }
            }
            FieldKind::U32 => {
                let value = uint_for(record, field)?;
                match field.order {
                    Order::Big => out.put_u32(value as u32),
                    Order::Little => out.put_u32_le(value as u32),
                }
            }
            FieldKind::U64 => {
                let value = uint_for(record, field)?;
                match field.order {
                    Order::Big => out.put_u64(value),
                    Order::Little => out.put_u64_le(value),
                }
            }
            FieldKind::Bytes(len) => put_block(&mut out, record, field.name, len),
            FieldKind::Struct(sub) => put_block(&mut out, record, field.name, sub.size()),
        }
    }
    Ok(out)
}

/// Deserialize a buffer per `schema`.
///
/// The buffer length must equal the schema size exactly. Nested structure
/// fields are returned as raw byte blocks for the caller to decode with the
/// sub-schema.
pub fn decode(schema: &StructSchema, buf: &[u8]) -> Result<Record> {
    if buf.len() != schema.size() {
        return Err(ProtocolError::LengthMismatch {
            schema: schema.name,
            expected: schema.size(),
            actual: buf.len(),
        });
    }

    let mut cursor = buf;
    let mut record = Record::new();
    for field in schema.fields {
        match field.kind {
            FieldKind::U8 => record.put_uint(field.name, u64::from(cursor.get_u8())),
            FieldKind::U16 => {
                let value = match field.order {
                    Order::Big => cursor.get_u16(),
                    Order::Little => cursor.get_u16_le(),
                };
                record.put_uint(field.name, u64::from(value));
            }
            FieldKind::U32 => {
                let value = match field.order {
                    Order::Big => cursor.get_u32(),
                    Order::Little => cursor.get_u32_le(),
                };
                record.put_uint(field.name, u64::from(value));
            }
            FieldKind::U64 => {
                let value = match field.order {
                    Order::Big => cursor.get_u64(),
                    Order::Little => cursor.get_u64_le(),
                };
                record.put_uint(field.name, value);
            }
            FieldKind::Bytes(len) => {
                let mut block = vec![0u8; len];
                cursor.copy_to_slice(&mut block);
                record.put_bytes(field.name, block);
            }
            FieldKind::Struct(sub) => {
                let mut block = vec![0u8; sub.size()];
                cursor.copy_to_slice(&mut block);
                record.put_bytes(field.name, block);
            }
        }
    }
    Ok(record)
}

fn uint_for(record: &Record, field: &FieldSpec) -> Result<u64> {
    let value = record.uint(field.name).unwrap_or(field.default);
    let width = field.width();
    if width < 8 && value >> (width * 8) != 0 {
        return Err(ProtocolError::ValueOutOfRange {
            field: field.name,
            value,
            width,
        });
    }
    Ok(value)
}

fn put_block(out: &mut Vec<u8>, record: &Record, name: &str, len: usize) {
    let value = record.bytes(name).unwrap_or(&[]);
    let take = value.len().min(len);
    out.put_slice(&value[..take]);
    out.put_bytes(0, len - take);
}

#[cfg(test)]
mod tests {
    use super::*;

    const INNER: StructSchema = StructSchema {
        name: "inner",
        fields: &[FieldSpec::u8("a"), FieldSpec::u16("b")],
    };

    const OUTER: StructSchema = StructSchema {
        name: "outer",
        fields: &[
            FieldSpec::u16("tag").with_default(0xBEEF),
            FieldSpec::nested("body", &INNER),
            FieldSpec::bytes("pad", 3),
        ],
    };

    const MIXED: StructSchema = StructSchema {
        name: "mixed",
        fields: &[
            FieldSpec::u16("net"),
            FieldSpec::u16("usb").le(),
            FieldSpec::u32("wide").le(),
        ],
    };

    #[test]
    fn size_recurses_into_nested_schemas() {
        assert_eq!(INNER.size(), 3);
        assert_eq!(OUTER.size(), 2 + 3 + 3);
    }

    #[test]
    fn encode_applies_defaults_and_zero_fill() {
        let bytes = encode(&OUTER, &Record::new()).unwrap();
        assert_eq!(bytes, vec![0xBE, 0xEF, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn per_field_byte_order() {
        let record = Record::new()
            .with_uint("net", 0x0102)
            .with_uint("usb", 0x0102)
            .with_uint("wide", 0xA1B2C3D4);
        let bytes = encode(&MIXED, &record).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0x02, 0x01, 0xD4, 0xC3, 0xB2, 0xA1]);

        let decoded = decode(&MIXED, &bytes).unwrap();
        assert_eq!(decoded.uint("net"), Some(0x0102));
        assert_eq!(decoded.uint("usb"), Some(0x0102));
        assert_eq!(decoded.uint("wide"), Some(0xA1B2C3D4));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode(&MIXED, &[0u8; 7]).unwrap_err();
        match err {
            ProtocolError::LengthMismatch {
                schema,
                expected,
                actual,
            } => {
                assert_eq!(schema, "mixed");
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_fields_decode_to_raw_bytes() {
        let inner = encode(&INNER, &Record::new().with_uint("a", 7).with_uint("b", 0x0102)).unwrap();
        let outer = encode(&OUTER, &Record::new().with_bytes("body", inner.clone())).unwrap();
        let decoded = decode(&OUTER, &outer).unwrap();
        assert_eq!(decoded.bytes("body"), Some(inner.as_slice()));

        let body = decode(&INNER, decoded.bytes("body").unwrap()).unwrap();
        assert_eq!(body.uint("a"), Some(7));
        assert_eq!(body.uint("b"), Some(0x0102));
    }

    #[test]
    fn byte_fields_pad_and_clip() {
        const BLOB: StructSchema = StructSchema {
            name: "blob",
            fields: &[FieldSpec::bytes("id", 4)],
        };
        let padded = encode(&BLOB, &Record::new().with_bytes("id", b"1-1".as_slice())).unwrap();
        assert_eq!(padded, vec![b'1', b'-', b'1', 0]);

        let clipped = encode(&BLOB, &Record::new().with_bytes("id", b"1-1.4.2".as_slice())).unwrap();
        assert_eq!(clipped, vec![b'1', b'-', b'1', b'.']);
    }

    #[test]
    fn oversized_values_are_rejected() {
        const NARROW: StructSchema = StructSchema {
            name: "narrow",
            fields: &[FieldSpec::u8("v")],
        };
        let err = encode(&NARROW, &Record::new().with_uint("v", 0x100)).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueOutOfRange { .. }));
    }

    #[test]
    fn roundtrip_preserves_all_values() {
        let record = Record::new()
            .with_uint("tag", 0x1234)
            .with_bytes("body", vec![1, 2, 3])
            .with_bytes("pad", vec![9, 8, 7]);
        let bytes = encode(&OUTER, &record).unwrap();
        assert_eq!(decode(&OUTER, &bytes).unwrap(), record);
    }
}
