use crate::error::{Error, ParseError, Result};
use crate::value::{Dictionary, Value};

// Containers nested deeper than this are rejected rather than recursed into.
pub const MAX_DEPTH: usize = 256;

// Recursive descent over a byte slice. Every production consumes exactly its
// own term; on failure `err_pos` marks where the grammar broke.
pub struct Parser<'a> {
    input:   &'a [u8],
    pos:     usize,
    depth:   usize,
    err_pos: usize,
}

impl<'a> Parser<'a> {

    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0, depth: 0, err_pos: 0 }
    }

    // Unconsumed input.
    pub fn rest(&self) -> &'a [u8] {
        let input = self.input;
        &input[self.pos..]
    }

    pub fn pos(&self) -> usize { self.pos }

    // Wraps an error raised by this parser, handing back the untouched input.
    pub fn fail(&self, error: Error) -> ParseError<'a> {
        ParseError { error, pos: self.err_pos, input: self.input }
    }

    fn peek(&self) -> Option<u8> { self.input.get(self.pos).copied() }

    fn error_at<T>(&mut self, pos: usize, error: Error) -> Result<T> {
        self.err_pos = pos;
        Err(error)
    }

    pub fn delim(&mut self, want: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == want => {
                self.pos += 1;
                Ok(())
            },
            Some(b) => self.error_at(self.pos, Error::InvalidToken {
                expected: format!("{:?}", want as char),
                found: format!("{:?}", b as char),
            }),
            None => self.error_at(self.pos, Error::EOF),
        }
    }

    // Bare integer literal: -?[0-9]+ with no leading zeros and no negative zero.
    // Stops right after the last digit, the caller deals with what follows.
    pub fn int(&mut self) -> Result<i64> {
        let input = self.input;
        let start = self.pos;
        if input.len() == start {
            return self.error_at(start, Error::EOF);
        }

        let mut end = start;
        let negative = input[start] == b'-';
        if negative {
            end += 1;
        }
        let digits_start = end;
        while input.get(end).map_or(false, u8::is_ascii_digit) {
            end += 1;
        }
        let digits = &input[digits_start..end];

        if digits.is_empty() {
            return self.error_at(start, Error::InvalidInteger("no digits".to_string()));
        }
        if digits[0] == b'0' {
            if negative {
                return self.error_at(start, Error::InvalidInteger("negative zero".to_string()));
            }
            if digits.len() > 1 {
                return self.error_at(start, Error::InvalidInteger("leading zero".to_string()));
            }
        }

        // Only ASCII digits and an optional sign made it this far.
        let literal = String::from_utf8_lossy(&input[start..end]).into_owned();
        match literal.parse::<i64>() {
            Ok(n) => {
                self.pos = end;
                Ok(n)
            },
            Err(_) => self.error_at(start, Error::InvalidInteger(format!("{} out of range", literal))),
        }
    }

    // i<literal>e
    pub fn integer(&mut self) -> Result<i64> {
        self.atomic(|p| {
            p.delim(b'i')?;
            let n = p.int()?;
            p.delim(b'e')?;
            Ok(n)
        })
    }

    // Non-negative literal used as a string length.
    pub fn length(&mut self) -> Result<usize> {
        self.atomic(|p| {
            let start = p.pos;
            let n = p.int()?;
            if n < 0 {
                return p.error_at(start, Error::NegativeLength(n));
            }
            match usize::try_from(n) {
                Ok(len) => Ok(len),
                Err(_) => p.error_at(start, Error::InvalidInteger(format!("length {} out of range", n))),
            }
        })
    }

    // <length>:<bytes>
    pub fn byte_string(&mut self) -> Result<&'a [u8]> {
        self.atomic(|p| {
            let len = p.length()?;
            p.delim(b':')?;
            let input = p.input;
            let available = input.len() - p.pos;
            if available < len {
                return p.error_at(p.pos, Error::ShortString { expected: len, found: available });
            }
            let bytes = &input[p.pos..p.pos + len];
            p.pos += len;
            Ok(bytes)
        })
    }

    // l<term>*e
    pub fn list(&mut self) -> Result<Vec<Value>> {
        self.nested(|p| {
            p.delim(b'l')?;
            let mut list = Vec::new();
            loop {
                match p.peek() {
                    None => return p.error_at(p.pos, Error::UnterminatedList),
                    Some(b'e') => {
                        p.pos += 1;
                        return Ok(list);
                    },
                    Some(_) => list.push(p.term()?),
                }
            }
        })
    }

    // d(<byte string><term>)*e
    pub fn dict(&mut self) -> Result<Dictionary> {
        self.nested(|p| {
            p.delim(b'd')?;
            let mut dict = Dictionary::new();
            loop {
                match p.peek() {
                    None => return p.error_at(p.pos, Error::UnterminatedDict),
                    Some(b'e') => {
                        p.pos += 1;
                        return Ok(dict);
                    },
                    Some(b) if b.is_ascii_digit() => {
                        let key = p.byte_string()?.to_vec();
                        let value = p.term()?;
                        // Duplicate keys are tolerated and the last occurrence wins.
                        // The encoding leaves this undefined; kept permissive on purpose.
                        dict.insert(key, value);
                    },
                    Some(b) => return p.error_at(p.pos, Error::InvalidToken {
                        expected: "byte string key".to_string(),
                        found: format!("{:?}", b as char),
                    }),
                }
            }
        })
    }

    // Dispatch on the first byte of a term.
    pub fn term(&mut self) -> Result<Value> {
        match self.peek() {
            None => self.error_at(self.pos, Error::EOF),
            Some(b'i') => self.integer().map(Value::Integer),
            Some(b'l') => self.list().map(Value::List),
            Some(b'd') => self.dict().map(Value::Dictionary),
            Some(b'0'..=b'9') => self.byte_string().map(|b| Value::ByteString(b.to_vec())),
            Some(b) => self.error_at(self.pos, Error::InvalidToken {
                expected: "start of term".to_string(),
                found: format!("{:#04x}", b),
            }),
        }
    }

    // Walks the top level of a dictionary and returns the encoded bytes of the
    // value stored under `key`, last occurrence winning like `dict`.
    pub fn raw_entry(&mut self, key: &[u8]) -> Result<Option<&'a [u8]>> {
        self.delim(b'd')?;
        let mut found = None;
        loop {
            match self.peek() {
                None => return self.error_at(self.pos, Error::UnterminatedDict),
                Some(b'e') => {
                    self.pos += 1;
                    return Ok(found);
                },
                Some(b) if b.is_ascii_digit() => {
                    let k = self.byte_string()?;
                    let value_start = self.pos;
                    self.term()?;
                    if k == key {
                        let input = self.input;
                        found = Some(&input[value_start..self.pos]);
                    }
                },
                Some(b) => return self.error_at(self.pos, Error::InvalidToken {
                    expected: "byte string key".to_string(),
                    found: format!("{:?}", b as char),
                }),
            }
        }
    }

    // Runs a production, rewinding to where it started if it fails.
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let start = self.pos;
        let out = f(self);
        if out.is_err() {
            self.pos = start;
        }
        out
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return self.error_at(self.pos, Error::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let out = self.atomic(f);
        self.depth -= 1;
        out
    }
}
