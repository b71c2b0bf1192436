use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

// Errors specific to bencoding on top of those present in serde.
#[derive(Debug, thiserror::Error)]
pub enum Error {

    #[error("unexpected end of input")]
    EOF,

    // Integer literal breaks the grammar (leading zero, negative zero, no digits, overflow).
    #[error("invalid integer literal: {0}")]
    InvalidInteger(String),

    #[error("expected non-negative string length, got {0}")]
    NegativeLength(i64),

    // Type valid but unexpected token.
    #[error("Invalid token: expected: {expected}, found: {found}")]
    InvalidToken {
        expected: String,
        found: String,
    },

    #[error("expected {expected} bytes of string data, found {found}")]
    ShortString {
        expected: usize,
        found: usize,
    },

    #[error("received incomplete list, no terminating e")]
    UnterminatedList,

    #[error("received incomplete dictionary, no terminating e")]
    UnterminatedDict,

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    // Grammar error detached from the input it was raised on.
    #[error("{error} at byte {pos}")]
    Syntax {
        pos: usize,
        error: Box<Error>,
    },

    // Attempted to (de)serialize an invalid type.
    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Map serialization error: {0}")]
    MapSerializationOrder(String),

    #[error("{0}")]
    Custom(String),

}

// A grammar error together with where it happened. The input is handed back
// exactly as the caller passed it in, never partially consumed.
#[derive(Debug, thiserror::Error)]
#[error("{error} at byte {pos}")]
pub struct ParseError<'a> {

    pub error: Error,

    // Offset into `input` at which parsing failed.
    pub pos: usize,

    pub input: &'a [u8],

}

impl ParseError<'_> {
    pub fn offending_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }
}

impl From<ParseError<'_>> for Error {
    fn from(e: ParseError<'_>) -> Self {
        Error::Syntax { pos: e.pos, error: Box::new(e.error) }
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg:T) -> Self where T:Display {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T>(msg:T) -> Self where T:Display {
        Error::Custom(msg.to_string())
    }
}
