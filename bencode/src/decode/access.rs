use std::collections::btree_map;
use std::slice;
use serde::{de, forward_to_deserialize_any};

use crate::error::{Error, Result};
use crate::value::{Dictionary, Value};
use super::decoder::Decoder;

// Sequence and map access over the children of a list or dictionary.
pub enum Access<'de> {
    List(slice::Iter<'de, Value>),
    Dict {
        entries: btree_map::Iter<'de, Vec<u8>, Value>,
        pending: Option<&'de Value>,
    },
}

impl<'de> Access<'de> {
    pub fn list(l: &'de [Value]) -> Self {
        Access::List(l.iter())
    }

    pub fn dict(d: &'de Dictionary) -> Self {
        Access::Dict { entries: d.iter(), pending: None }
    }
}

impl<'de> de::SeqAccess<'de> for Access<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
        where T: de::DeserializeSeed<'de>
    {
        match self {
            Access::List(iter) => match iter.next() {
                Some(v) => seed.deserialize(Decoder::new(v)).map(Some),
                None => Ok(None),
            },
            Access::Dict { .. } => Err(Error::InvalidType("dictionary read as list".to_string())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        match self {
            Access::List(iter) => Some(iter.len()),
            Access::Dict { entries, .. } => Some(entries.len()),
        }
    }
}

impl<'de> de::MapAccess<'de> for Access<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
        where K: de::DeserializeSeed<'de>
    {
        match self {
            Access::Dict { entries, pending } => match entries.next() {
                Some((k, v)) => {
                    *pending = Some(v);
                    seed.deserialize(KeyDecoder::new(k)).map(Some)
                },
                None => Ok(None),
            },
            Access::List(_) => Err(Error::InvalidType("list read as dictionary".to_string())),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
        where V: de::DeserializeSeed<'de>
    {
        match self {
            Access::Dict { pending, .. } => {
                let v = pending.take().ok_or_else(|| Error::MapSerializationOrder(
                    "value requested before key".to_string()
                ))?;
                seed.deserialize(Decoder::new(v))
            },
            Access::List(_) => Err(Error::InvalidType("list read as dictionary".to_string())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        de::SeqAccess::size_hint(self)
    }
}

// Dictionary keys are raw byte strings; struct field names and string-keyed
// maps see them as str when they are valid UTF-8.
pub struct KeyDecoder<'de> {
    key: &'de [u8],
}

impl<'de> KeyDecoder<'de> {
    pub fn new(key: &'de [u8]) -> Self { Self { key } }
}

impl<'de> de::Deserializer<'de> for KeyDecoder<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        visitor.visit_borrowed_bytes(self.key)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        match std::str::from_utf8(self.key) {
            Ok(s) => visitor.visit_borrowed_str(s),
            Err(_) => visitor.visit_borrowed_bytes(self.key),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_newtype_struct<V>(
            self,
            _name: &'static str,
            visitor: V,
        ) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool char
        i8 i16 i32 i64 i128
        u8 u16 u32 u64 u128
        f32 f64
        unit bytes byte_buf option
        seq map unit_struct tuple_struct tuple
        ignored_any struct enum
    }
}

// Enums are encoded either as a bare byte string (unit variant) or as a
// dictionary with the variant name as its only key.
pub struct VariantAccess<'de> {
    name:  &'de [u8],
    value: Option<&'de Value>,
}

impl<'de> VariantAccess<'de> {
    pub fn unit(name: &'de [u8]) -> Self {
        Self { name, value: None }
    }

    pub fn with_value(name: &'de [u8], value: &'de Value) -> Self {
        Self { name, value: Some(value) }
    }

    fn value(&self) -> Result<&'de Value> {
        self.value.ok_or_else(|| Error::InvalidType("expected variant with a value".to_string()))
    }
}

impl<'de> de::EnumAccess<'de> for VariantAccess<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
        where V: de::DeserializeSeed<'de>
    {
        let variant = seed.deserialize(KeyDecoder::new(self.name))?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for VariantAccess<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(_) => Err(Error::InvalidType("unexpected value for unit variant".to_string())),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
        where T: de::DeserializeSeed<'de>
    {
        seed.deserialize(Decoder::new(self.value()?))
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        de::Deserializer::deserialize_tuple(Decoder::new(self.value()?), len, visitor)
    }

    fn struct_variant<V>(
            self,
            _fields: &'static [&'static str],
            visitor: V,
        ) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        de::Deserializer::deserialize_any(Decoder::new(self.value()?), visitor)
    }
}
