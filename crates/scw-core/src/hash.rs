//! Set membership hashing
//!
//! A set element hashes to the CRC-32 of its significant attributes, each
//! stringified and followed by `-`. The result is folded to a non-negative
//! integer and must stay stable across process restarts, since hosts persist
//! it as part of set addressing.

use crate::value::Value;

/// Hash a string the way set elements are addressed
pub fn hash_string(s: &str) -> i64 {
    let crc = crc32fast::hash(s.as_bytes());
    i64::from(crc as i32).abs()
}

/// Hash the concatenation of the given significant attributes
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> i64 {
    let mut buf = String::new();
    for p in parts {
        buf.push_str(p.as_ref());
        buf.push('-');
    }
    hash_string(&buf)
}

/// Default element hash: every attribute of an object element is
/// significant, in key order
pub fn hash_value(value: &Value) -> i64 {
    match value {
        Value::Object(o) | Value::Map(o) => {
            let parts: Vec<String> = o.values().map(Value::canonical).collect();
            hash_parts(&parts)
        }
        other => hash_parts(&[other.canonical()]),
    }
}
