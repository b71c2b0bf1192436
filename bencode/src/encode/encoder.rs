use std::collections::btree_map::Entry;
use serde::ser::{self, Impossible, Serialize};
use crate::{Error, Result};
use crate::value::{Dictionary, Value};

// Builds a value tree from any serde data structure. `Ok(None)` stands for
// data with no encoding (`None`, `()`), which containers leave out.
pub struct ValueEncoder;

fn no_value(what: &str) -> Error {
    Error::InvalidType(format!("{} cannot be encoded", what))
}

// Externally tagged enums: d<variant name><value>e
fn tagged(variant: &'static str, value: Value) -> Value {
    let mut dict = Dictionary::new();
    dict.insert(variant.as_bytes().to_vec(), value);
    Value::Dictionary(dict)
}

impl ser::Serializer for ValueEncoder {

    type Ok     = Option<Value>;
    type Error  = Error;

    type SerializeSeq           = ListEncoder;
    type SerializeTuple         = ListEncoder;
    type SerializeTupleStruct   = ListEncoder;
    type SerializeTupleVariant  = ListEncoder;
    type SerializeMap           = DictEncoder;
    type SerializeStruct        = DictEncoder;
    type SerializeStructVariant = DictEncoder;

    fn serialize_i64(self, v: i64) -> Result<Self::Ok> {
        Ok(Some(Value::Integer(v)))
    }

    // Parsed integers are i64, anything above would not decode again.
    fn serialize_u64(self, v: u64) -> Result<Self::Ok> {
        let v = i64::try_from(v).map_err(
            |_| Error::InvalidType(format!("integer {} exceeds i64", v))
        )?;
        self.serialize_i64(v)
    }

    fn serialize_bool(self, v: bool) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok> { self.serialize_i64(v.into()) }

    fn serialize_f32(self, _: f32) -> Result<Self::Ok> {
        Err(Error::InvalidType("f32".to_string()))
    }

    fn serialize_f64(self, _: f64) -> Result<Self::Ok> {
        Err(Error::InvalidType("f64".to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        Ok(Some(Value::ByteString(v.to_vec())))
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        self.serialize_bytes(v.as_bytes())
    }

    fn serialize_none(self) -> Result<Self::Ok> { Ok(None) }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok> { Ok(None) }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> { Ok(None) }

    fn serialize_unit_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
        ) -> Result<Self::Ok>
    {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Self::Ok>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
            value: &T,
        ) -> Result<Self::Ok>
        where T: ?Sized + Serialize
    {
        match value.serialize(ValueEncoder)? {
            Some(inner) => Ok(Some(tagged(variant, inner))),
            None => Err(no_value(&format!("empty payload of variant {}", variant))),
        }
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(ListEncoder::new(len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        Ok(ListEncoder::new(len, None))
    }

    fn serialize_tuple_struct(
            self,
            _name: &'static str,
            len: usize,
        ) -> Result<Self::SerializeTupleStruct>
    {
        Ok(ListEncoder::new(len, None))
    }

    fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
            len: usize,
        ) -> Result<Self::SerializeTupleVariant>
    {
        Ok(ListEncoder::new(len, Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(DictEncoder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(DictEncoder::new(None))
    }

    fn serialize_struct_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant>
    {
        Ok(DictEncoder::new(Some(variant)))
    }
}

pub struct ListEncoder {
    items:      Vec<Value>,
    variant:    Option<&'static str>,
}

impl ListEncoder {

    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self { items: Vec::with_capacity(len), variant }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        if let Some(v) = value.serialize(ValueEncoder)? {
            self.items.push(v);
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<Value>> {
        let list = Value::List(self.items);
        Ok(Some(match self.variant {
            Some(variant) => tagged(variant, list),
            None => list,
        }))
    }
}

impl ser::SerializeSeq for ListEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

impl ser::SerializeTuple for ListEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

impl ser::SerializeTupleStruct for ListEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

impl ser::SerializeTupleVariant for ListEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

/// Collects entries into a `Dictionary`, which keeps them in raw-byte key
/// order whatever order serde hands them over in. Entries whose value has no
/// encoding are dropped, and a key seen twice is an error.
pub struct DictEncoder {
    dict:       Dictionary,
    pending:    Option<Vec<u8>>,
    variant:    Option<&'static str>,
}

impl DictEncoder {

    fn new(variant: Option<&'static str>) -> Self {
        Self { dict: Dictionary::new(), pending: None, variant }
    }

    fn insert(&mut self, key: Vec<u8>, value: Option<Value>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        match self.dict.entry(key) {
            Entry::Occupied(e) => Err(Error::MapSerializationOrder(
                format!("duplicate dictionary key {:?}", String::from_utf8_lossy(e.key()))
            )),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            },
        }
    }

    fn finish(self) -> Result<Option<Value>> {
        if self.pending.is_some() {
            return Err(Error::MapSerializationOrder(
                "map ended while holding a key".to_string()
            ));
        }
        let dict = Value::Dictionary(self.dict);
        Ok(Some(match self.variant {
            Some(variant) => tagged(variant, dict),
            None => dict,
        }))
    }
}

impl ser::SerializeMap for DictEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::MapSerializationOrder(
                "two keys serialized without a value".to_string()
            ));
        }
        self.pending = Some(key.serialize(KeyEncoder)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self.pending.take().ok_or_else(|| Error::MapSerializationOrder(
            "value serialized without a key".to_string()
        ))?;
        let value = value.serialize(ValueEncoder)?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

impl ser::SerializeStruct for DictEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        let value = value.serialize(ValueEncoder)?;
        self.insert(key.as_bytes().to_vec(), value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

impl ser::SerializeStructVariant for DictEncoder {
    type Ok = Option<Value>;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Self::Ok> { self.finish() }
}

// Dictionary keys are byte strings, so only string-like data is accepted.
struct KeyEncoder;

fn bad_key(what: &str) -> Error {
    Error::InvalidType(format!("dictionary key must be a byte string, got {}", what))
}

impl ser::Serializer for KeyEncoder {

    type Ok     = Vec<u8>;
    type Error  = Error;

    type SerializeSeq           = Impossible<Vec<u8>, Error>;
    type SerializeTuple         = Impossible<Vec<u8>, Error>;
    type SerializeTupleStruct   = Impossible<Vec<u8>, Error>;
    type SerializeTupleVariant  = Impossible<Vec<u8>, Error>;
    type SerializeMap           = Impossible<Vec<u8>, Error>;
    type SerializeStruct        = Impossible<Vec<u8>, Error>;
    type SerializeStructVariant = Impossible<Vec<u8>, Error>;

    fn serialize_bytes(self, v: &[u8]) -> Result<Vec<u8>> { Ok(v.to_vec()) }

    fn serialize_str(self, v: &str) -> Result<Vec<u8>> { Ok(v.as_bytes().to_vec()) }

    fn serialize_char(self, v: char) -> Result<Vec<u8>> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Vec<u8>>
        where T: ?Sized + Serialize
    {
        value.serialize(self)
    }

    fn serialize_unit_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
        ) -> Result<Vec<u8>>
    {
        self.serialize_str(variant)
    }

    fn serialize_bool(self, _: bool) -> Result<Vec<u8>> { Err(bad_key("bool")) }

    fn serialize_i8(self, _: i8) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_i16(self, _: i16) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_i32(self, _: i32) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_i64(self, _: i64) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_u8(self, _: u8) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_u16(self, _: u16) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_u32(self, _: u32) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_u64(self, _: u64) -> Result<Vec<u8>> { Err(bad_key("integer")) }

    fn serialize_f32(self, _: f32) -> Result<Vec<u8>> { Err(bad_key("float")) }

    fn serialize_f64(self, _: f64) -> Result<Vec<u8>> { Err(bad_key("float")) }

    fn serialize_none(self) -> Result<Vec<u8>> { Err(bad_key("none")) }

    fn serialize_some<T>(self, _: &T) -> Result<Vec<u8>>
        where T: ?Sized + Serialize
    {
        Err(bad_key("option"))
    }

    fn serialize_unit(self) -> Result<Vec<u8>> { Err(bad_key("unit")) }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Vec<u8>> { Err(bad_key("unit")) }

    fn serialize_newtype_variant<T>(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<Vec<u8>>
        where T: ?Sized + Serialize
    {
        Err(bad_key("enum"))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> { Err(bad_key("list")) }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> { Err(bad_key("tuple")) }

    fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct>
    {
        Err(bad_key("tuple"))
    }

    fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant>
    {
        Err(bad_key("enum"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> { Err(bad_key("map")) }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Err(bad_key("struct"))
    }

    fn serialize_struct_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant>
    {
        Err(bad_key("enum"))
    }
}
