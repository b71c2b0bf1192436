use serde::de;
use crate::error::{Error, ParseError, Result};
use crate::value::Value;

mod parser;
mod decoder;
mod access;

pub use parser::MAX_DEPTH;
use parser::Parser;
use decoder::Decoder;

// Outcome of parsing a prefix of the input: the value and the unconsumed remainder.
pub type Parsed<'a, T> = std::result::Result<(T, &'a [u8]), ParseError<'a>>;

fn run<'a, T>(input: &'a [u8], f: impl FnOnce(&mut Parser<'a>) -> Result<T>) -> Parsed<'a, T> {
    let mut p = Parser::new(input);
    match f(&mut p) {
        Ok(v) => Ok((v, p.rest())),
        Err(e) => Err(p.fail(e)),
    }
}

// Parses a bare integer literal (no i/e wrapper), e.g. "-42" in "-42:".
pub fn parse_int(input: &[u8]) -> Parsed<'_, i64> {
    run(input, Parser::int)
}

// Parses an i<literal>e term.
pub fn parse_integer(input: &[u8]) -> Parsed<'_, Value> {
    run(input, |p| p.integer().map(Value::Integer))
}

// Parses a <length>:<bytes> term.
pub fn parse_string(input: &[u8]) -> Parsed<'_, Value> {
    run(input, |p| p.byte_string().map(|b| Value::ByteString(b.to_vec())))
}

pub fn parse_list(input: &[u8]) -> Parsed<'_, Value> {
    run(input, |p| p.list().map(Value::List))
}

pub fn parse_dict(input: &[u8]) -> Parsed<'_, Value> {
    run(input, |p| p.dict().map(Value::Dictionary))
}

/// Parses any single term from the front of `input`, dispatching on its first byte.
///
/// Returns the value and whatever follows it. On failure the error carries the
/// offset at which the grammar broke and the original input, unadvanced.
pub fn parse(input: &[u8]) -> Parsed<'_, Value> {
    run(input, Parser::term)
}

/// Returns the exact encoded bytes of the value stored under `key` in the
/// top-level dictionary `input`, or None if the key is absent.
pub fn find_raw<'a>(input: &'a [u8], key: &[u8]) -> std::result::Result<Option<&'a [u8]>, ParseError<'a>> {
    run(input, |p| p.raw_entry(key)).map(|(raw, _)| raw)
}

// Parses a whole document, anything after the top-level term is an error.
pub fn decode_value(b: &[u8]) -> Result<Value> {
    let (value, rest) = parse(b)?;
    if !rest.is_empty() {
        return Err(Error::TrailingBytes(rest.len()));
    }
    Ok(value)
}

// Projects an already decoded value onto a typed record.
pub fn from_value<'de, T>(v: &'de Value) -> Result<T>
    where T: de::Deserialize<'de>
{
    T::deserialize(Decoder::new(v))
}

pub fn decode_bytes<T>(b: &[u8]) -> Result<T>
    where T: de::DeserializeOwned
{
    from_value(&decode_value(b)?)
}

pub fn decode_str<T>(s: &str) -> Result<T>
    where T: de::DeserializeOwned
{
    decode_bytes(s.as_bytes())
}
