use serde::ser;
use crate::{Error, Result, Value};

mod encoder;
mod writer;


pub use writer::write_value;

/// Converts `v` into a `Value` tree. Returns `None` when `v` has no encoding
/// at all, as for `None` or `()`.
pub fn to_value<T: ser::Serialize + ?Sized>(v: &T) -> Result<Option<Value>> {
    v.serialize(encoder::ValueEncoder)
}

/// Serializes `v` to its canonical encoding: integers in shortest decimal
/// form, dictionary keys in ascending byte order, no optional whitespace.
pub fn encode_to_raw<T: ser::Serialize + ?Sized>(v: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if let Some(value) = to_value(v)? {
        write_value(&value, &mut out);
    }
    Ok(out)
}

// Same as `encode_to_raw`, for values whose encoding is valid UTF-8.
pub fn encode_to_str<T: ser::Serialize + ?Sized>(v: &T) -> Result<String> {
    String::from_utf8(encode_to_raw(v)?)
        .map_err(|_| Error::Custom("invalid utf-8 string".to_string()))
}
