//! In-stream schema descriptors and dynamically typed messages.
//!
//! A4 streams are self-describing: classes that are not compiled into the
//! reading process travel as `ProtoClass` records carrying a [`ClassSchema`].
//! A [`DynamicMessage`] decodes any payload against such a schema, using the
//! same wire format as the compiled-in messages, and re-encodes it
//! canonically. Unknown fields are skipped on decode, so a dynamic reader
//! stays compatible with newer minor versions of a class.
//!
//! The descriptor model is deliberately narrow: field id, name, scalar kind
//! and repetition. That is exactly the surface the stream codec needs
//! (decode, re-encode, field enumeration); everything richer belongs to the
//! schema layer proper.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::{Buf, BufMut};
use prost::encoding::{
    decode_key, decode_varint, encode_key, encode_varint, skip_field, DecodeContext, WireType,
};

use crate::error::{Error, Result};

/// Scalar kind of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FieldKind {
    Bool = 0,
    Uint32 = 1,
    Uint64 = 2,
    Int64 = 3,
    Double = 4,
    String = 5,
    Bytes = 6,
}

/// One field of an in-stream class descriptor.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldSchema {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(enumeration = "FieldKind", tag = "3")]
    pub kind: i32,
    #[prost(bool, tag = "4")]
    pub repeated: bool,
}

impl FieldSchema {
    pub fn kind_checked(&self) -> Result<FieldKind> {
        FieldKind::try_from(self.kind)
            .map_err(|_| Error::Decode(prost::DecodeError::new("unknown field kind")))
    }
}

/// Self-contained descriptor of a message class, as carried by `ProtoClass`
/// records.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClassSchema {
    #[prost(string, tag = "1")]
    pub full_name: String,
    #[prost(message, repeated, tag = "2")]
    pub fields: Vec<FieldSchema>,
}

impl ClassSchema {
    pub fn new(full_name: impl Into<String>) -> Self {
        ClassSchema {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field declaration, used by compiled-in classes to
    /// describe themselves.
    pub fn with_field(
        mut self,
        id: u32,
        name: impl Into<String>,
        kind: FieldKind,
        repeated: bool,
    ) -> Self {
        self.fields.push(FieldSchema {
            id,
            name: name.into(),
            kind: kind as i32,
            repeated,
        });
        self
    }

    pub fn field(&self, id: u32) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A decoded field value of a [`DynamicMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Uint32(u32),
    Uint64(u64),
    Int64(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Uint32(v) => Some(u64::from(*v)),
            FieldValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A message decoded against an in-stream [`ClassSchema`].
///
/// Holds a shared handle to its schema, so descriptors stay alive as long
/// as any message decoded from them.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    schema: Arc<ClassSchema>,
    values: BTreeMap<u32, Vec<FieldValue>>,
}

impl DynamicMessage {
    pub fn new(schema: Arc<ClassSchema>) -> Self {
        DynamicMessage {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Decode a payload against `schema`. Fields not present in the schema
    /// are skipped; wire-type mismatches are decode errors.
    pub fn decode(schema: Arc<ClassSchema>, mut buf: &[u8]) -> Result<Self> {
        let mut msg = DynamicMessage::new(schema);
        while buf.has_remaining() {
            let (tag, wire_type) = decode_key(&mut buf)?;
            let Some(field) = msg.schema.field(tag) else {
                skip_field(wire_type, tag, &mut buf, DecodeContext::default())?;
                continue;
            };
            let kind = field.kind_checked()?;
            let repeated = field.repeated;
            if repeated && wire_type == WireType::LengthDelimited && kind.is_varint() {
                // Packed repeated scalars.
                let len = decode_varint(&mut buf)? as usize;
                if buf.remaining() < len {
                    return Err(truncated_payload());
                }
                let (mut packed, rest) = buf.split_at(len);
                buf = rest;
                while packed.has_remaining() {
                    let v = decode_scalar(kind, WireType::Varint, &mut packed)?;
                    msg.values.entry(tag).or_default().push(v);
                }
                continue;
            }
            let value = decode_scalar(kind, wire_type, &mut buf)?;
            let slot = msg.values.entry(tag).or_default();
            if !repeated {
                slot.clear();
            }
            slot.push(value);
        }
        Ok(msg)
    }

    /// Re-encode canonically (ascending field ids, unpacked).
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for (&tag, values) in &self.values {
            for value in values {
                match value {
                    FieldValue::Bool(v) => {
                        encode_key(tag, WireType::Varint, buf);
                        encode_varint(u64::from(*v), buf);
                    }
                    FieldValue::Uint32(v) => {
                        encode_key(tag, WireType::Varint, buf);
                        encode_varint(u64::from(*v), buf);
                    }
                    FieldValue::Uint64(v) => {
                        encode_key(tag, WireType::Varint, buf);
                        encode_varint(*v, buf);
                    }
                    FieldValue::Int64(v) => {
                        encode_key(tag, WireType::Varint, buf);
                        encode_varint(*v as u64, buf);
                    }
                    FieldValue::Double(v) => {
                        encode_key(tag, WireType::SixtyFourBit, buf);
                        buf.put_f64_le(*v);
                    }
                    FieldValue::String(v) => {
                        encode_key(tag, WireType::LengthDelimited, buf);
                        encode_varint(v.len() as u64, buf);
                        buf.put_slice(v.as_bytes());
                    }
                    FieldValue::Bytes(v) => {
                        encode_key(tag, WireType::LengthDelimited, buf);
                        encode_varint(v.len() as u64, buf);
                        buf.put_slice(v);
                    }
                }
            }
        }
    }

    pub fn schema(&self) -> &Arc<ClassSchema> {
        &self.schema
    }

    pub fn full_name(&self) -> &str {
        &self.schema.full_name
    }

    /// First value of the named field, if set.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let field = self.schema.field_by_name(name)?;
        self.values.get(&field.id).and_then(|v| v.first())
    }

    /// All values of the named field (empty for unset fields).
    pub fn values(&self, name: &str) -> &[FieldValue] {
        self.schema
            .field_by_name(name)
            .and_then(|f| self.values.get(&f.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace the value of a singular field.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self
            .schema
            .field_by_name(name)
            .ok_or_else(|| Error::InvalidStream(format!("no such field: {name}")))?;
        self.values.insert(field.id, vec![value]);
        Ok(())
    }

    /// Append a value to a repeated field.
    pub fn push(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self
            .schema
            .field_by_name(name)
            .ok_or_else(|| Error::InvalidStream(format!("no such field: {name}")))?;
        self.values.entry(field.id).or_default().push(value);
        Ok(())
    }

    /// Enumerate populated fields in field-id order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldSchema, &[FieldValue])> {
        self.values.iter().filter_map(move |(tag, values)| {
            self.schema.field(*tag).map(|f| (f, values.as_slice()))
        })
    }
}

impl FieldKind {
    fn is_varint(self) -> bool {
        matches!(
            self,
            FieldKind::Bool | FieldKind::Uint32 | FieldKind::Uint64 | FieldKind::Int64
        )
    }
}

fn truncated_payload() -> Error {
    Error::Decode(prost::DecodeError::new("truncated payload"))
}

fn decode_scalar(kind: FieldKind, wire_type: WireType, buf: &mut &[u8]) -> Result<FieldValue> {
    match kind {
        FieldKind::Bool | FieldKind::Uint32 | FieldKind::Uint64 | FieldKind::Int64 => {
            if wire_type != WireType::Varint {
                return Err(wire_type_mismatch());
            }
            let raw = decode_varint(buf)?;
            Ok(match kind {
                FieldKind::Bool => FieldValue::Bool(raw != 0),
                FieldKind::Uint32 => FieldValue::Uint32(raw as u32),
                FieldKind::Uint64 => FieldValue::Uint64(raw),
                FieldKind::Int64 => FieldValue::Int64(raw as i64),
                _ => unreachable!(),
            })
        }
        FieldKind::Double => {
            if wire_type != WireType::SixtyFourBit {
                return Err(wire_type_mismatch());
            }
            if buf.remaining() < 8 {
                return Err(truncated_payload());
            }
            Ok(FieldValue::Double(buf.get_f64_le()))
        }
        FieldKind::String | FieldKind::Bytes => {
            if wire_type != WireType::LengthDelimited {
                return Err(wire_type_mismatch());
            }
            let len = decode_varint(buf)? as usize;
            if buf.remaining() < len {
                return Err(truncated_payload());
            }
            let (head, rest) = buf.split_at(len);
            let head = head.to_vec();
            *buf = rest;
            Ok(match kind {
                FieldKind::String => FieldValue::String(
                    String::from_utf8(head)
                        .map_err(|_| Error::Decode(prost::DecodeError::new("invalid utf-8")))?,
                ),
                FieldKind::Bytes => FieldValue::Bytes(head),
                _ => unreachable!(),
            })
        }
    }
}

fn wire_type_mismatch() -> Error {
    Error::Decode(prost::DecodeError::new("wire type mismatch"))
}
