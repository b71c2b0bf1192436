use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use serde::ser::{SerializeSeq, SerializeMap};
use serde::de;
use serde_bytes::{ByteBuf, Bytes};

pub type Dictionary = BTreeMap<Vec<u8>, Value>;

/// A decoded bencode term.
///
/// Byte strings are kept as raw bytes, they are not assumed to be UTF-8.
/// Equality is structural: dictionaries compare by key set and per-key value,
/// independent of the order keys appeared in on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<Value>),
    Dictionary(Dictionary),
}

impl Value {

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteString(b) => Some(b),
            _ => None,
        }
    }

    // Only succeeds for byte strings holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    // Dictionary lookup, None for missing keys and non-dictionaries.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        self.as_dict().and_then(|d| d.get(key.as_ref()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::ByteString(_) => "byte string",
            Value::List(_) => "list",
            Value::Dictionary(_) => "dictionary",
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::ByteString(s.as_bytes().to_vec()) }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self { Value::ByteString(b.to_vec()) }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self { Value::ByteString(b) }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self { Value::List(l) }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self { Value::Dictionary(d) }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: serde::Serializer
    {
        match self {
            Value::Integer(int) => serializer.serialize_i64(*int),

            Value::ByteString(string) => serializer.serialize_bytes(string),

            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for elem in list {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            },

            Value::Dictionary(dict) => {
                let mut map = serializer.serialize_map(Some(dict.len()))?;
                for (k, v) in dict {
                    map.serialize_entry(Bytes::new(k), v)?;
                }
                map.end()
            },
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where D: serde::Deserializer<'de>
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

pub struct ValueVisitor;

impl<'de> de::Visitor<'de> for ValueVisitor {

    type Value = Value;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("any bencode value")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where E: de::Error
    {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where E: de::Error
    {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
        where E: de::Error
    {
        Ok(Value::ByteString(v.into()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
        where E: de::Error
    {
        Ok(Value::ByteString(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where E: de::Error
    {
        Ok(Value::ByteString(v.into()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where E: de::Error
    {
        Ok(Value::ByteString(v.into()))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where A: de::SeqAccess<'de>
    {
        let mut out = Vec::new();
        while let Some(elem) = seq.next_element()? {
            out.push(elem)
        }
        Ok(Value::List(out))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where A: de::MapAccess<'de>
    {
        let mut dict = Dictionary::new();
        while let Some((k, v)) = map.next_entry::<ByteBuf, Value>()? {
            dict.insert(k.into_vec(), v);
        }
        Ok(Value::Dictionary(dict))
    }
}
