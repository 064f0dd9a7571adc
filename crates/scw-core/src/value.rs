//! Schema-world value tree
//!
//! The host hands the plugin heterogeneous attribute trees. They are decoded
//! into [`Value`] against a schema (see [`crate::schema::Type::decode`]) so that
//! sets and maps keep their identity; untyped JSON decodes into lists and
//! objects.

use crate::hash::hash_value;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Attribute name to value
pub type Object = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    /// Unordered, deduplicated by element hash
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
}

impl Value {
    /// Build a set, dropping elements whose hash was already seen
    pub fn set(items: impl IntoIterator<Item = Value>) -> Value {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for item in items {
            let h = hash_value(&item);
            if !seen.contains(&h) {
                seen.push(h);
                out.push(item);
            }
        }
        Value::Set(out)
    }

    pub fn string_set<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Value {
        Value::set(items.into_iter().map(|s| Value::String(s.into())))
    }

    pub fn string_list<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Value {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, empty string, or empty collection
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(v) | Value::Set(v) => v.is_empty(),
            Value::Map(m) | Value::Object(m) => m.is_empty(),
            Value::Bool(_) | Value::Int(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of a list or set
    pub fn as_items(&self) -> &[Value] {
        match self {
            Value::List(v) | Value::Set(v) => v,
            _ => &[],
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) | Value::Map(o) => Some(o),
            _ => None,
        }
    }

    /// Object field lookup; `Null` for anything else
    pub fn get(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            Value::Object(o) | Value::Map(o) => o.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Untyped decoding: arrays become lists, objects become objects
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::String(n.to_string())),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) => Value::List(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => Value::Object(
                o.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(v) | Value::Set(v) => {
                serde_json::Value::Array(v.iter().map(Value::to_json).collect())
            }
            Value::Map(m) | Value::Object(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Stable textual form used for hashing and diagnostics
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::Set(v) => {
                let mut hashes: Vec<String> = v.iter().map(Value::canonical).collect();
                hashes.sort();
                format!("[{}]", hashes.join(","))
            }
            _ => self.to_json().to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                let mut ha: Vec<i64> = a.iter().map(hash_value).collect();
                let mut hb: Vec<i64> = b.iter().map(hash_value).collect();
                ha.sort_unstable();
                hb.sort_unstable();
                ha == hb
            }
            (Value::Map(a), Value::Map(b)) | (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

/// Build an [`Object`] from `key => value` pairs
#[macro_export]
macro_rules! object {
    () => { $crate::value::Object::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut o = $crate::value::Object::new();
        $( o.insert(($key).to_string(), $crate::value::Value::from($value)); )+
        o
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_dedup_and_unordered_eq() {
        let a = Value::string_set(["u1", "u2", "u1"]);
        assert_eq!(a.as_items().len(), 2);
        assert_eq!(a, Value::string_set(["u2", "u1"]));
        assert_ne!(
            Value::string_list(["u1", "u2"]),
            Value::string_list(["u2", "u1"])
        );
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }

    #[test]
    fn test_json_conversion() {
        let j = json!({"name": "k", "tags": ["a", "b"], "size": 3, "on": true, "x": null});
        let v = Value::from_json(&j);
        assert_eq!(v.get("name").as_str(), Some("k"));
        assert_eq!(v.get("size").as_int(), Some(3));
        assert_eq!(v.get("tags").as_items().len(), 2);
        assert!(v.get("missing").is_null());
        assert_eq!(v.to_json(), j);
    }

    #[test]
    fn test_object_macro() {
        let o = object! { "name" => "a", "size" => 2i64 };
        assert_eq!(o.get("size"), Some(&Value::Int(2)));
    }
}
