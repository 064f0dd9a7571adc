//! Declarative resource schemas
//!
//! A [`Schema`] declares the attribute tree of one resource type together with
//! its per-phase timeouts and state version. The driver uses it to decode host
//! JSON into [`Value`]s, validate configuration before any remote call, and
//! compute plan diffs.

use crate::convert::Cidr;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::duration::{format_duration, parse_duration};
use crate::error::{CoreError, Result};
use crate::id::validate_uuid_or_uuid_with_locality;
use crate::path::AttributePath;
use crate::value::{Object, Value};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

/// `(attribute, old, new, full config) -> true` when the change is not
/// semantic
pub type DiffSuppressFn = fn(&str, &Value, &Value, &Object) -> bool;

/// Extra validation on a set value; returns an error message
pub type ValidateFn = fn(&Value) -> std::result::Result<(), String>;

#[derive(Debug, Clone)]
pub enum Type {
    String,
    Int,
    Bool,
    /// Go-style duration string
    Duration,
    /// RFC 3339 timestamp
    Time,
    /// Bare uuid or `{locality}/{uuid}`
    Uuid,
    Cidr,
    Ip,
    List(Box<Type>),
    Set(Box<Type>),
    Map,
    Object(Block),
}

impl Type {
    pub fn list(inner: Type) -> Type {
        Type::List(Box::new(inner))
    }

    pub fn set(inner: Type) -> Type {
        Type::Set(Box::new(inner))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Type::String => "string",
            Type::Int => "int",
            Type::Bool => "bool",
            Type::Duration => "duration",
            Type::Time => "time",
            Type::Uuid => "uuid",
            Type::Cidr => "cidr",
            Type::Ip => "ip",
            Type::List(_) => "list",
            Type::Set(_) => "set",
            Type::Map => "map",
            Type::Object(_) => "object",
        }
    }

    fn is_string_like(&self) -> bool {
        matches!(
            self,
            Type::String | Type::Duration | Type::Time | Type::Uuid | Type::Cidr | Type::Ip
        )
    }

    /// The nested block of a list/set of objects
    pub fn nested_block(&self) -> Option<&Block> {
        match self {
            Type::List(inner) | Type::Set(inner) => match inner.as_ref() {
                Type::Object(block) => Some(block),
                _ => None,
            },
            Type::Object(block) => Some(block),
            _ => None,
        }
    }

    /// Decode host JSON into a typed value
    pub fn decode(&self, json: &serde_json::Value, path: &AttributePath) -> Result<Value> {
        let mismatch = || CoreError::TypeMismatch {
            path: path.to_string(),
            expected: self.name(),
        };
        if json.is_null() {
            return Ok(Value::Null);
        }
        match self {
            t if t.is_string_like() => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            Type::Int => json.as_i64().map(Value::Int).ok_or_else(mismatch),
            Type::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            Type::List(inner) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| inner.decode(item, &path.index(i)))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            Type::Set(inner) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| inner.decode(item, &path.index(i)))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::set)
            }
            Type::Map => {
                let obj = json.as_object().ok_or_else(mismatch)?;
                obj.iter()
                    .map(|(k, v)| {
                        v.as_str()
                            .map(|s| (k.clone(), Value::String(s.to_string())))
                            .ok_or_else(mismatch)
                    })
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map)
            }
            Type::Object(block) => block.decode(json, path).map(Value::Object),
            _ => Err(mismatch()),
        }
    }

    fn describe(&self) -> serde_json::Value {
        match self {
            Type::List(inner) => json!(["list", inner.describe()]),
            Type::Set(inner) => json!(["set", inner.describe()]),
            Type::Object(block) => json!(["object", block.describe()]),
            other => json!(other.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub ty: Type,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub conflicts_with: Vec<&'static str>,
    pub one_of: Option<&'static [&'static str]>,
    pub max_items: Option<usize>,
    pub validate: Option<ValidateFn>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub description: &'static str,
    pub deprecated: Option<&'static str>,
}

impl Attribute {
    fn new(ty: Type) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            conflicts_with: Vec::new(),
            one_of: None,
            max_items: None,
            validate: None,
            diff_suppress: None,
            description: "",
            deprecated: None,
        }
    }

    pub fn required(ty: Type) -> Self {
        Self {
            required: true,
            ..Self::new(ty)
        }
    }

    pub fn optional(ty: Type) -> Self {
        Self {
            optional: true,
            ..Self::new(ty)
        }
    }

    /// Set by the cloud only
    pub fn computed(ty: Type) -> Self {
        Self {
            computed: true,
            ..Self::new(ty)
        }
    }

    /// The user may set it; when omitted the cloud picks a value
    pub fn optional_computed(ty: Type) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(ty)
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn conflicts_with(mut self, names: &[&'static str]) -> Self {
        self.conflicts_with = names.to_vec();
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn validate(mut self, f: ValidateFn) -> Self {
        self.validate = Some(f);
        self
    }

    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn description(mut self, d: &'static str) -> Self {
        self.description = d;
        self
    }

    pub fn deprecated(mut self, msg: &'static str) -> Self {
        self.deprecated = Some(msg);
        self
    }

    /// Computed and never user-settable
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "type": self.ty.describe(),
            "required": self.required,
            "optional": self.optional,
            "computed": self.computed,
            "force_new": self.force_new,
            "sensitive": self.sensitive,
            "default": self.default.as_ref().map(Value::to_json),
            "conflicts_with": self.conflicts_with,
            "description": self.description,
            "deprecated": self.deprecated,
        })
    }
}

/// Named attributes of an object
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: BTreeMap<&'static str, Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Decode an object; the reserved `id` key is skipped
    pub fn decode(&self, json: &serde_json::Value, path: &AttributePath) -> Result<Object> {
        let raw = json.as_object().ok_or_else(|| CoreError::TypeMismatch {
            path: path.to_string(),
            expected: "object",
        })?;
        if let Some(unknown) = raw
            .keys()
            .find(|k| k.as_str() != "id" && !self.attributes.contains_key(k.as_str()))
        {
            return Err(CoreError::TypeMismatch {
                path: path.join(unknown.clone()).to_string(),
                expected: "a declared attribute",
            });
        }
        let mut out = Object::new();
        for (name, attribute) in &self.attributes {
            let value = match raw.get(*name) {
                Some(v) => attribute.ty.decode(v, &path.join(*name))?,
                None => Value::Null,
            };
            out.insert((*name).to_string(), value);
        }
        Ok(out)
    }

    /// Names of sensitive attributes, nested ones included, as dotted paths
    pub fn sensitive_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, attribute) in &self.attributes {
            if attribute.sensitive {
                out.push((*name).to_string());
            }
            if let Some(nested) = attribute.ty.nested_block() {
                for p in nested.sensitive_paths() {
                    out.push(format!("{name}.{p}"));
                }
            }
        }
        out
    }

    /// Values of every sensitive attribute present in `obj`
    pub fn sensitive_values(&self, obj: &Object) -> Vec<String> {
        let mut out = Vec::new();
        for (name, attribute) in &self.attributes {
            let value = obj.get(*name).unwrap_or(&Value::Null);
            if attribute.sensitive && !value.is_empty() {
                out.push(value.canonical());
            }
            if let Some(nested) = attribute.ty.nested_block() {
                for item in value.as_items() {
                    if let Some(o) = item.as_object() {
                        out.extend(nested.sensitive_values(o));
                    }
                }
            }
        }
        out
    }

    /// Fill declared defaults for attributes the config leaves unset
    pub fn apply_defaults(&self, obj: &mut Object) {
        for (name, attribute) in &self.attributes {
            let slot = obj.entry((*name).to_string()).or_insert(Value::Null);
            if slot.is_null() {
                if let Some(default) = &attribute.default {
                    *slot = default.clone();
                }
            }
        }
    }

    /// Schema-time validation of user configuration
    pub fn validate(&self, config: &Object, path: &AttributePath) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for (name, attribute) in &self.attributes {
            let attr_path = path.join(*name);
            let value = config.get(*name).unwrap_or(&Value::Null);

            if value.is_null() {
                if attribute.required {
                    diags.push(
                        Diagnostic::error("Missing required argument")
                            .with_detail(format!("The argument \"{attr_path}\" is required."))
                            .with_path(attr_path),
                    );
                }
                continue;
            }

            if attribute.is_read_only() {
                diags.push(
                    Diagnostic::error("Value for unconfigurable attribute")
                        .with_detail(format!("\"{attr_path}\" is computed by the cloud."))
                        .with_path(attr_path),
                );
                continue;
            }

            if let Some(msg) = attribute.deprecated {
                diags.push(
                    Diagnostic::warning("Argument is deprecated")
                        .with_detail(msg)
                        .with_path(attr_path.clone()),
                );
            }

            for other in &attribute.conflicts_with {
                let other_set = config.get(*other).is_some_and(is_set);
                if is_set(value) && other_set {
                    let other_path = path.join(*other);
                    diags.push(
                        Diagnostic::error("Conflicting configuration arguments")
                            .with_detail(format!(
                                "\"{attr_path}\": conflicts with \"{other_path}\""
                            ))
                            .with_path(attr_path.clone()),
                    );
                }
            }

            validate_value(attribute, &attribute.ty, value, &attr_path, &mut diags);
        }
        diags
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attributes
                .iter()
                .map(|(k, a)| ((*k).to_string(), a.describe()))
                .collect(),
        )
    }
}

/// `false` counts as unset for conflict checks
fn is_set(v: &Value) -> bool {
    !v.is_null() && *v != Value::Bool(false)
}

fn invalid(path: &AttributePath, detail: String) -> Diagnostic {
    Diagnostic::error("Invalid attribute value")
        .with_detail(detail)
        .with_path(path.clone())
}

fn validate_value(
    attribute: &Attribute,
    ty: &Type,
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) {
    match (ty, value) {
        (_, Value::Null) => {}
        (Type::Duration, Value::String(s)) => {
            if let Err(e) = parse_duration(s) {
                diags.push(invalid(path, e.to_string()));
            }
        }
        (Type::Time, Value::String(s)) => {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                diags.push(invalid(path, CoreError::InvalidTime(s.clone()).to_string()));
            }
        }
        (Type::Uuid, Value::String(s)) => {
            if let Err(e) = validate_uuid_or_uuid_with_locality(s) {
                diags.push(invalid(path, e.to_string()));
            }
        }
        (Type::Cidr, Value::String(s)) => {
            if let Err(e) = s.parse::<Cidr>() {
                diags.push(invalid(path, e.to_string()));
            }
        }
        (Type::Ip, Value::String(s)) => {
            if s.parse::<IpAddr>().is_err() {
                diags.push(invalid(path, CoreError::InvalidIp(s.clone()).to_string()));
            }
        }
        (Type::List(inner), Value::List(items)) | (Type::Set(inner), Value::Set(items)) => {
            if let Some(max) = attribute.max_items {
                if items.len() > max {
                    diags.push(invalid(
                        path,
                        format!("at most {max} item(s) allowed, got {}", items.len()),
                    ));
                }
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = path.index(i);
                match (inner.as_ref(), item) {
                    (Type::Object(block), Value::Object(o)) => {
                        diags.extend(block.validate(o, &item_path));
                    }
                    _ => validate_value(attribute, inner, item, &item_path, diags),
                }
            }
            return;
        }
        (Type::Object(block), Value::Object(o)) => {
            diags.extend(block.validate(o, path));
            return;
        }
        (Type::Int, Value::Int(_))
        | (Type::Bool, Value::Bool(_))
        | (Type::String, Value::String(_))
        | (Type::Map, Value::Map(_)) => {}
        (ty, _) => {
            diags.push(invalid(path, format!("expected {}", ty.name())));
            return;
        }
    }

    if let (Some(allowed), Value::String(s)) = (attribute.one_of, value) {
        if !allowed.contains(&s.as_str()) {
            diags.push(invalid(
                path,
                format!("expected one of [{}], got {s:?}", allowed.join(", ")),
            ));
        }
    }
    if let Some(f) = attribute.validate {
        if let Err(msg) = f(value) {
            diags.push(invalid(path, msg));
        }
    }
}

/// Per-phase timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_TIMEOUT)
    }
}

impl Timeouts {
    pub fn uniform(d: Duration) -> Self {
        Self {
            create: d,
            read: d,
            update: d,
            delete: d,
        }
    }

    pub fn describe(&self) -> serde_json::Value {
        json!({
            "create": format_duration(self.create),
            "read": format_duration(self.read),
            "update": format_duration(self.update),
            "delete": format_duration(self.delete),
        })
    }
}

/// Schema of one resource, data source or ephemeral resource
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: u32,
    pub block: Block,
    pub timeouts: Timeouts,
    pub description: &'static str,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            ..Self::default()
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn description(mut self, d: &'static str) -> Self {
        self.description = d;
        self
    }

    pub fn describe(&self) -> serde_json::Value {
        json!({
            "version": self.version,
            "description": self.description,
            "attributes": self.block.describe(),
            "timeouts": self.timeouts.describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object;

    fn policy_block() -> Block {
        Block::new()
            .attr("name", Attribute::optional_computed(Type::String))
            .attr(
                "user_id",
                Attribute::optional(Type::Uuid).conflicts_with(&["no_principal"]),
            )
            .attr(
                "no_principal",
                Attribute::optional(Type::Bool).conflicts_with(&["user_id"]),
            )
            .attr("created_at", Attribute::computed(Type::Time))
            .attr(
                "rule",
                Attribute::required(Type::list(Type::Object(
                    Block::new().attr(
                        "permission_set_names",
                        Attribute::required(Type::set(Type::String)),
                    ),
                ))),
            )
    }

    #[test]
    fn test_decode_typed() {
        let block = policy_block();
        let json = json!({
            "id": "ignored",
            "name": "p",
            "rule": [{"permission_set_names": ["A", "B", "A"]}],
        });
        let obj = block.decode(&json, &AttributePath::root()).unwrap();
        assert!(obj["user_id"].is_null());
        let rule = &obj["rule"].as_items()[0];
        assert!(matches!(rule.get("permission_set_names"), Value::Set(s) if s.len() == 2));
    }

    #[test]
    fn test_decode_rejects_unknown_and_mismatch() {
        let block = policy_block();
        assert!(block.decode(&json!({"bogus": 1}), &AttributePath::root()).is_err());
        assert!(matches!(
            block.decode(&json!({"no_principal": "yes"}), &AttributePath::root()),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_conflicts_cite_both_paths() {
        let block = policy_block();
        let config = object! {
            "user_id" => "1a2b3c4d-0000-4000-8000-00000000beef",
            "no_principal" => true,
            "rule" => Value::List(vec![Value::Object(object! {
                "permission_set_names" => Value::string_set(["AllProductsFullAccess"]),
            })]),
        };
        let diags = block.validate(&config, &AttributePath::root());
        let conflicts: Vec<_> = diags
            .iter()
            .filter(|d| d.summary == "Conflicting configuration arguments")
            .collect();
        assert_eq!(conflicts.len(), 2);
        let paths: Vec<String> = conflicts
            .iter()
            .map(|d| d.path.as_ref().unwrap().to_string())
            .collect();
        assert!(paths.contains(&"user_id".to_string()));
        assert!(paths.contains(&"no_principal".to_string()));
        assert!(conflicts[0].detail.contains("user_id"));
        assert!(conflicts[0].detail.contains("no_principal"));
    }

    #[test]
    fn test_validate_required_and_computed() {
        let block = policy_block();
        let config = object! { "created_at" => "2025-01-01T00:00:00Z" };
        let diags = block.validate(&config, &AttributePath::root());
        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Missing required argument"));
        assert!(summaries.contains(&"Value for unconfigurable attribute"));
    }

    #[test]
    fn test_validate_leaf_formats() {
        let block = Block::new()
            .attr("ttl", Attribute::optional(Type::Duration))
            .attr("at", Attribute::optional(Type::Time))
            .attr("net", Attribute::optional(Type::Cidr))
            .attr("ip", Attribute::optional(Type::Ip))
            .attr("kind", Attribute::optional(Type::String).one_of(&["a", "b"]));
        let bad = object! {
            "ttl" => "10 minutes",
            "at" => "yesterday",
            "net" => "10.0.0.0/33",
            "ip" => "300.1.1.1",
            "kind" => "c",
        };
        assert_eq!(block.validate(&bad, &AttributePath::root()).len(), 5);
        let good = object! {
            "ttl" => "10m",
            "at" => "2025-07-06T11:00:00+02:00",
            "net" => "10.0.0.0/24",
            "ip" => "192.168.1.1",
            "kind" => "a",
        };
        assert!(block.validate(&good, &AttributePath::root()).is_empty());
    }

    #[test]
    fn test_nested_validation_paths() {
        let block = policy_block();
        let config = object! {
            "rule" => Value::List(vec![Value::Object(object! {})]),
        };
        let diags = block.validate(&config, &AttributePath::root());
        let d = diags.iter().next().unwrap();
        assert_eq!(
            d.path.as_ref().unwrap().to_string(),
            "rule.0.permission_set_names"
        );
    }

    #[test]
    fn test_sensitive_values() {
        let block = Block::new()
            .attr("secret_key", Attribute::computed(Type::String).sensitive())
            .attr("name", Attribute::optional(Type::String));
        let obj = object! { "secret_key" => "s3cr3t", "name" => "n" };
        assert_eq!(block.sensitive_values(&obj), vec!["s3cr3t".to_string()]);
        assert_eq!(block.sensitive_paths(), vec!["secret_key".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let block = Block::new().attr("disabled", Attribute::optional(Type::Bool).default(false));
        let mut obj = Object::new();
        block.apply_defaults(&mut obj);
        assert_eq!(obj["disabled"], Value::Bool(false));
    }
}
