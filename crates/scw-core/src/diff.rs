//! Diff suppressors
//!
//! Each suppressor returns `true` when two byte-different values mean the
//! same thing. All of them are reflexive, symmetric and transitive over their
//! domain: values are mapped to a canonical form and compared; values that
//! fail to parse fall back to exact comparison.

use crate::convert::Cidr;
use crate::duration::parse_duration;
use crate::id::expand_id;
use crate::value::{Object, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

fn compare_strings<K: PartialEq>(old: &Value, new: &Value, canon: impl Fn(&str) -> Option<K>) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(a), Some(b)) => {
            if a == b {
                return true;
            }
            match (canon(a), canon(b)) {
                (Some(ca), Some(cb)) => ca == cb,
                _ => false,
            }
        }
        _ => old == new,
    }
}

/// Composite ids compare by their trailing uuid
pub fn suppress_locality(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| Some(expand_id(s).to_string()))
}

/// `30s` == `30.0s` == `0.5m`
pub fn suppress_duration(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| parse_duration(s).ok())
}

pub fn suppress_case_insensitive(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| Some(s.to_lowercase()))
}

/// `10.0.0.1` == `10.0.0.1/32`
pub fn suppress_cidr(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| s.parse::<Cidr>().ok())
}

/// Equal instants regardless of offset
pub fn suppress_time(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| (t.timestamp(), t.timestamp_subsec_nanos()))
    })
}

/// Authorized-key blobs compared on `type base64`, ignoring comments and
/// surrounding whitespace
pub fn suppress_ssh_key(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, canonical_authorized_key)
}

/// PEM bundles that differ only by trailing whitespace
pub fn suppress_trailing_whitespace(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    compare_strings(old, new, |s| Some(s.trim_end().to_string()))
}

/// Lists that hold the same elements in any order
pub fn suppress_order_insensitive(_key: &str, old: &Value, new: &Value, _state: &Object) -> bool {
    let sorted = |v: &Value| {
        let mut items: Vec<String> = v.as_items().iter().map(Value::canonical).collect();
        items.sort();
        items
    };
    match (old, new) {
        (Value::List(_) | Value::Set(_) | Value::Null, Value::List(_) | Value::Set(_) | Value::Null) => {
            sorted(old) == sorted(new)
        }
        _ => old == new,
    }
}

const KEY_TYPE_PREFIXES: &[&str] = &["ssh-", "ecdsa-sha2-", "sk-ssh-", "sk-ecdsa-sha2-"];

/// `type base64` of an OpenSSH authorized-key line
///
/// Leading options and the trailing comment are dropped. The blob must be
/// valid base64 whose embedded type matches the declared one.
pub fn canonical_authorized_key(raw: &str) -> Option<String> {
    let mut tokens = raw.split_whitespace();
    let key_type = tokens.find(|t| KEY_TYPE_PREFIXES.iter().any(|p| t.starts_with(p)))?;
    let blob = tokens.next()?;
    let bytes = STANDARD.decode(blob).ok()?;
    if bytes.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let embedded = bytes.get(4..4 + len)?;
    if embedded != key_type.as_bytes() {
        return None;
    }
    Some(format!("{key_type} {blob}"))
}
