//! Fallback object tree
//!
//! Captures the full serde data model of a value (options, newtypes, enum
//! variants, wide integers) as a self-describing [`Node`]. The fallback
//! format stores the tree with bincode, so decoding never needs bincode to
//! support `deserialize_any`: the tree answers it instead. That keeps
//! tagged, untagged and flattened types readable.
//!
//! Map entries are sorted by their encoded key bytes while the tree is
//! built, so equal maps always produce the same record whatever their
//! in-memory iteration order.

use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, DeserializeSeed, EnumAccess, IntoDeserializer, VariantAccess, Visitor};
use serde::ser;
use serde::{forward_to_deserialize_any, Deserialize, Serialize};

use super::ser::SET_TOKEN;
use super::ValueError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
    Unit,
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    None,
    Some(Box<Node>),
    Newtype(Box<Node>),
    Seq(Vec<Node>),
    Map(Vec<(Node, Node)>),
    UnitVariant(String),
    /// Newtype, tuple (`Seq` payload) or struct (`Map` payload) variant
    Variant(String, Box<Node>),
}

/// Build the tree for any serializable value
pub(crate) fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, ValueError> {
    value.serialize(NodeSerializer)
}

/// Rebuild a typed value from its tree
pub(crate) fn from_node<T: de::DeserializeOwned>(node: Node) -> Result<T, ValueError> {
    T::deserialize(node)
}

// =============================================================================
// Serializer
// =============================================================================

struct NodeSerializer;

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = ValueError;

    type SerializeSeq = SeqNode;
    type SerializeTuple = SeqNode;
    type SerializeTupleStruct = SeqNode;
    type SerializeTupleVariant = VariantNode<SeqNode>;
    type SerializeMap = MapNode;
    type SerializeStruct = StructNode;
    type SerializeStructVariant = VariantNode<StructNode>;

    fn serialize_bool(self, v: bool) -> Result<Node, ValueError> {
        Ok(Node::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, ValueError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, ValueError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, ValueError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, ValueError> {
        Ok(Node::I64(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Node, ValueError> {
        Ok(Node::I128(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, ValueError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, ValueError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, ValueError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, ValueError> {
        Ok(Node::U64(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Node, ValueError> {
        Ok(Node::U128(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, ValueError> {
        Ok(Node::F32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Node, ValueError> {
        Ok(Node::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Node, ValueError> {
        Ok(Node::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<Node, ValueError> {
        Ok(Node::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, ValueError> {
        Ok(Node::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Node, ValueError> {
        Ok(Node::None)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Node, ValueError> {
        Ok(Node::Some(Box::new(to_node(value)?)))
    }

    fn serialize_unit(self) -> Result<Node, ValueError> {
        Ok(Node::Unit)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, ValueError> {
        Ok(Node::Unit)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Node, ValueError> {
        Ok(Node::UnitVariant(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Node, ValueError> {
        Ok(Node::Newtype(Box::new(to_node(value)?)))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, ValueError> {
        Ok(Node::Variant(variant.to_string(), Box::new(to_node(value)?)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqNode, ValueError> {
        Ok(SeqNode(Vec::with_capacity(len.unwrap_or(0))))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqNode, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqNode, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantNode<SeqNode>, ValueError> {
        Ok(VariantNode {
            name: variant,
            body: SeqNode(Vec::with_capacity(len)),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapNode, ValueError> {
        Ok(MapNode {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<StructNode, ValueError> {
        Ok(StructNode(Vec::with_capacity(len)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantNode<StructNode>, ValueError> {
        Ok(VariantNode {
            name: variant,
            body: StructNode(Vec::with_capacity(len)),
        })
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

pub(crate) struct SeqNode(Vec<Node>);

impl SeqNode {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.0.push(to_node(value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqNode {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Seq(self.0))
    }
}

impl ser::SerializeTuple for SeqNode {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Seq(self.0))
    }
}

impl ser::SerializeTupleStruct for SeqNode {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Seq(self.0))
    }
}

pub(crate) struct MapNode {
    entries: Vec<(Node, Node)>,
    key: Option<Node>,
}

impl ser::SerializeMap for MapNode {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), ValueError> {
        self.key = Some(to_node(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| ValueError::Message("map value without a key".to_string()))?;
        self.entries.push((key, to_node(value)?));
        Ok(())
    }

    fn end(self) -> Result<Node, ValueError> {
        // Canonical order: by encoded key bytes
        let mut keyed = self
            .entries
            .into_iter()
            .map(|(k, v)| {
                let bytes =
                    bincode::serialize(&k).map_err(|e| ValueError::Message(e.to_string()))?;
                Ok((bytes, k, v))
            })
            .collect::<Result<Vec<_>, ValueError>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Node::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect()))
    }
}

/// Struct fields keep their declared order
pub(crate) struct StructNode(Vec<(Node, Node)>);

impl StructNode {
    fn push<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), ValueError> {
        self.0.push((Node::Str(key.to_string()), to_node(value)?));
        Ok(())
    }
}

impl ser::SerializeStruct for StructNode {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Map(self.0))
    }
}

pub(crate) struct VariantNode<B> {
    name: &'static str,
    body: B,
}

impl ser::SerializeTupleVariant for VariantNode<SeqNode> {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.body.push(value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Variant(
            self.name.to_string(),
            Box::new(Node::Seq(self.body.0)),
        ))
    }
}

impl ser::SerializeStructVariant for VariantNode<StructNode> {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        self.body.push(key, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Variant(
            self.name.to_string(),
            Box::new(Node::Map(self.body.0)),
        ))
    }
}

// =============================================================================
// Deserializer
// =============================================================================

impl<'de> de::Deserializer<'de> for Node {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self {
            Node::Unit => visitor.visit_unit(),
            Node::Bool(b) => visitor.visit_bool(b),
            Node::I64(n) => visitor.visit_i64(n),
            Node::U64(n) => visitor.visit_u64(n),
            Node::I128(n) => visitor.visit_i128(n),
            Node::U128(n) => visitor.visit_u128(n),
            Node::F32(x) => visitor.visit_f32(x),
            Node::F64(x) => visitor.visit_f64(x),
            Node::Char(c) => visitor.visit_char(c),
            Node::Str(s) => visitor.visit_string(s),
            Node::Bytes(b) => visitor.visit_byte_buf(b),
            Node::None => visitor.visit_none(),
            Node::Some(inner) => visitor.visit_some(*inner),
            Node::Newtype(inner) => visitor.visit_newtype_struct(*inner),
            Node::Seq(items) => {
                let mut access: SeqDeserializer<_, ValueError> =
                    SeqDeserializer::new(items.into_iter());
                let out = visitor.visit_seq(&mut access)?;
                access.end()?;
                Ok(out)
            }
            Node::Map(entries) => visit_entries(entries, visitor),
            // Without a type to guide it, a variant reads as `name` or `{name: body}`
            Node::UnitVariant(name) => visitor.visit_string(name),
            Node::Variant(name, body) => visit_entries(vec![(Node::Str(name), *body)], visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self {
            Node::None | Node::Unit => visitor.visit_none(),
            Node::Some(inner) => visitor.visit_some(*inner),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self {
            // A `Value::Set` nested in a fallback record
            Node::Newtype(inner) if name == SET_TOKEN => visitor.visit_enum(VariantBody {
                name: SET_TOKEN.to_string(),
                body: *inner,
            }),
            Node::Newtype(inner) => visitor.visit_newtype_struct(*inner),
            other if name == SET_TOKEN => other.deserialize_any(visitor),
            other => visitor.visit_newtype_struct(other),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self {
            Node::UnitVariant(name) | Node::Str(name) => visitor.visit_enum(VariantBody {
                name,
                body: Node::Unit,
            }),
            Node::Variant(name, body) => visitor.visit_enum(VariantBody { name, body: *body }),
            other => Err(de::Error::custom(format!(
                "expected an enum variant, found {:?}",
                other
            ))),
        }
    }

    fn is_human_readable(&self) -> bool {
        false
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, ValueError> for Node {
    type Deserializer = Node;

    fn into_deserializer(self) -> Node {
        self
    }
}

fn visit_entries<'de, V: Visitor<'de>>(
    entries: Vec<(Node, Node)>,
    visitor: V,
) -> Result<V::Value, ValueError> {
    let mut access: MapDeserializer<'de, _, ValueError> = MapDeserializer::new(entries.into_iter());
    let out = visitor.visit_map(&mut access)?;
    access.end()?;
    Ok(out)
}

struct VariantBody {
    name: String,
    body: Node,
}

impl<'de> EnumAccess<'de> for VariantBody {
    type Error = ValueError;
    type Variant = Node;

    fn variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<(S::Value, Node), ValueError> {
        let tag = seed.deserialize(Node::Str(self.name))?;
        Ok((tag, self.body))
    }
}

impl<'de> VariantAccess<'de> for Node {
    type Error = ValueError;

    fn unit_variant(self) -> Result<(), ValueError> {
        match self {
            Node::Unit => Ok(()),
            other => Err(de::Error::custom(format!(
                "expected a unit variant, found {:?}",
                other
            ))),
        }
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value, ValueError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, ValueError> {
        de::Deserializer::deserialize_any(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        de::Deserializer::deserialize_any(self, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    enum Event {
        Click { x: i32 },
        Close,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Num(i64),
        Words(Vec<String>),
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        a: u8,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Outer {
        id: u32,
        #[serde(flatten)]
        inner: Inner,
    }

    fn round_trip<T>(value: &T) -> T
    where
        T: Serialize + de::DeserializeOwned,
    {
        let bytes = bincode::serialize(&to_node(value).unwrap()).unwrap();
        from_node(bincode::deserialize(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_tagged_untagged_and_flattened() {
        assert_eq!(round_trip(&Event::Click { x: 3 }), Event::Click { x: 3 });
        assert_eq!(round_trip(&Event::Close), Event::Close);
        assert_eq!(round_trip(&Loose::Num(4)), Loose::Num(4));
        assert_eq!(
            round_trip(&Loose::Words(vec!["a".to_string()])),
            Loose::Words(vec!["a".to_string()])
        );
        let outer = Outer {
            id: 1,
            inner: Inner { a: 2 },
        };
        assert_eq!(round_trip(&outer), outer);
    }

    #[test]
    fn test_nested_options_stay_distinct() {
        assert_eq!(round_trip(&Some(None::<i32>)), Some(None));
        assert_eq!(round_trip(&None::<Option<i32>>), None);
        assert_eq!(round_trip(&Some(Some(1))), Some(Some(1)));
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(round_trip(&u128::MAX), u128::MAX);
        assert_eq!(round_trip(&i128::MIN), i128::MIN);
        assert_eq!(round_trip(&u64::MAX), u64::MAX);
    }

    #[test]
    fn test_map_order_is_canonical() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..32 {
            a.insert(format!("k{}", i), i);
        }
        for i in (0..32).rev() {
            b.insert(format!("k{}", i), i);
        }
        assert_eq!(to_node(&a).unwrap(), to_node(&b).unwrap());
    }
}
