//! Fast-format wire shape
//!
//! MessagePack has no set type, so the payload is a tagged mirror of
//! [`Value`] that keeps sets apart from lists on disk.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::value::Value;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Packed {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Blob),
    List(Vec<Packed>),
    Set(Vec<Packed>),
    Map(Vec<(Packed, Packed)>),
}

impl From<Value> for Packed {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Packed::Nil,
            Value::Bool(b) => Packed::Bool(b),
            Value::Int(n) => Packed::Int(n),
            Value::Float(x) => Packed::Float(x),
            Value::Text(s) => Packed::Text(s),
            Value::Bytes(b) => Packed::Bytes(Blob(b)),
            Value::List(items) => Packed::List(items.into_iter().map(Packed::from).collect()),
            Value::Set(items) => Packed::Set(items.into_iter().map(Packed::from).collect()),
            Value::Map(entries) => Packed::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Packed::from(k), Packed::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Packed> for Value {
    fn from(packed: Packed) -> Self {
        match packed {
            Packed::Nil => Value::Nil,
            Packed::Bool(b) => Value::Bool(b),
            Packed::Int(n) => Value::Int(n),
            Packed::Float(x) => Value::Float(x),
            Packed::Text(s) => Value::Text(s),
            Packed::Bytes(Blob(b)) => Value::Bytes(b),
            Packed::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Packed::Set(items) => Value::Set(items.into_iter().map(Value::from).collect()),
            Packed::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Byte string written as MessagePack `bin` instead of an integer array
#[derive(Debug)]
pub(crate) struct Blob(pub(crate) Vec<u8>);

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Blob, D::Error> {
        deserializer.deserialize_byte_buf(BlobVisitor)
    }
}

struct BlobVisitor;

impl<'de> Visitor<'de> for BlobVisitor {
    type Value = Blob;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Blob, E> {
        Ok(Blob(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Blob, E> {
        Ok(Blob(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Blob, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(Blob(bytes))
    }
}
