// Convention from https://serde.rs/conventions.html
mod encode;
mod decode;
mod error;
mod value;


// Grammar level, bytes -> Value plus the unconsumed remainder.
pub use decode::{
    parse, parse_int, parse_integer, parse_string, parse_list, parse_dict,
    find_raw, Parsed, MAX_DEPTH,
};

// For bencode -> T
pub use decode::{decode_value, from_value, decode_bytes, decode_str};

// For T -> bencode
pub use encode::{encode_to_raw, encode_to_str, to_value, write_value};

pub use error::{Error, ParseError, Result};
pub use value::{Dictionary, Value, ValueVisitor};
