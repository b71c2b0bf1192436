use serde::{
    de,
    forward_to_deserialize_any,
    de::Deserializer,
};
use crate::error::{Error, Result};
use crate::value::Value;
use super::access::{Access, KeyDecoder, VariantAccess};

// Walks a decoded value tree on behalf of a typed record. Field bindings are
// generated by serde derive: unknown keys are skipped, missing required
// fields and mismatched value kinds are errors.
#[derive(Clone, Copy)]
pub struct Decoder<'de> {
    value: &'de Value,
}

impl<'de> Decoder<'de> {

    pub fn new(value: &'de Value) -> Self { Self { value } }

    fn invalid_token(&self, expected: &str) -> Error {
        Error::InvalidToken {
            expected: expected.to_string(),
            found: self.value.type_name().to_string(),
        }
    }

    fn bytes(&self) -> Result<&'de [u8]> {
        self.value.as_bytes().ok_or_else(|| self.invalid_token("byte string"))
    }
}

impl<'de> Deserializer<'de> for Decoder<'de> {

    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        match self.value {
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::ByteString(s) => visitor.visit_borrowed_bytes(s),
            Value::List(l) => visitor.visit_seq(Access::list(l)),
            Value::Dictionary(d) => visitor.visit_map(Access::dict(d)),
        }
    }

    forward_to_deserialize_any! {
        char
        i8 i16 i32 i64
        u8 u16 u32 u64
        f32 f64
        unit bytes byte_buf
        seq map unit_struct tuple_struct
        struct
    }

    // Integers 0 and 1 stand in for booleans (e.g. the "private" flag).
    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        match self.value {
            Value::Integer(0) => visitor.visit_bool(false),
            Value::Integer(1) => visitor.visit_bool(true),
            _ => Err(self.invalid_token("integer 0 or 1")),
        }
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

    // A key that is present is always Some, absence is handled by serde derive.
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        visitor.visit_some(self)
    }

    fn deserialize_enum<V>(
            self,
            _name: &'static str,
            _variants: &'static [&'static str],
            visitor: V,
        ) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        match self.value {
            Value::ByteString(s) => visitor.visit_enum(VariantAccess::unit(s)),
            Value::Dictionary(d) if d.len() == 1 => {
                let (k, v) = d.iter().next().ok_or(Error::EOF)?;
                visitor.visit_enum(VariantAccess::with_value(k, v))
            },
            _ => Err(self.invalid_token("byte string or single-key dictionary")),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        let b = self.bytes()?;
        let s = std::str::from_utf8(b).map_err(
            |err| Error::Custom(format!("Failed to convert bytes to UTF-8 string: {}", err))
        )?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        match self.value {
            Value::List(l) if l.len() == len => visitor.visit_seq(Access::list(l)),
            Value::List(l) => Err(Error::InvalidType(format!("expected list of {} elements, found {}", len, l.len()))),
            _ => Err(self.invalid_token("list")),
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        KeyDecoder::new(self.bytes()?).deserialize_identifier(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
        where V: de::Visitor<'de>
    {
        visitor.visit_unit()
    }
}
