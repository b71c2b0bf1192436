use std::io::Write;
use crate::value::Value;

// Appends the canonical form of `v`. Dictionaries iterate in key order, so
// the output is sorted without a separate pass.
pub fn write_value(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Integer(i) => write_int(*i, out),
        Value::ByteString(b) => write_bytes(b, out),
        Value::List(items) => {
            out.push(b'l');
            items.iter().for_each(|item| write_value(item, out));
            out.push(b'e');
        },
        Value::Dictionary(dict) => {
            out.push(b'd');
            for (k, v) in dict {
                write_bytes(k, out);
                write_value(v, out);
            }
            out.push(b'e');
        },
    }
}

// Shortest decimal form, the only one the parser accepts.
fn write_int(i: i64, out: &mut Vec<u8>) {
    // Writes into a Vec cannot fail.
    let _ = write!(out, "i{}e", i);
}

// <length>:<bytes>
fn write_bytes(b: &[u8], out: &mut Vec<u8>) {
    let _ = write!(out, "{}:", b.len());
    out.extend_from_slice(b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dictionary;

    fn written(v: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        write_value(v, &mut out);
        out
    }

    #[test]
    fn test_write_scalars() {
        assert_eq!(written(&Value::Integer(0)), b"i0e");
        assert_eq!(written(&Value::Integer(-3)), b"i-3e");
        assert_eq!(written(&Value::ByteString(vec![])), b"0:");
        assert_eq!(written(&Value::from("spam")), b"4:spam");
    }

    #[test]
    fn test_write_nested() {
        let mut inner = Dictionary::new();
        inner.insert(b"b".to_vec(), Value::List(vec![]));
        inner.insert(b"a".to_vec(), Value::from("x"));
        let v = Value::List(vec![Value::Integer(1), Value::Dictionary(inner)]);
        assert_eq!(written(&v), b"li1ed1:a1:x1:bleee");
    }
}
