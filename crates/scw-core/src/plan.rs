//! Plan diffs and change sets
//!
//! [`plan_diff`] merges user configuration over prior state the way the host
//! expects a plan: configured values win, defaults fill gaps, computed values
//! carry over from prior state. The attributes whose planned value differs
//! from the prior one form a [`ChangeSet`], which update handlers iterate to
//! build request bodies.

use crate::path::AttributePath;
use crate::schema::{Attribute, Block, Type};
use crate::value::{Object, Value};
use std::collections::BTreeMap;

/// Prior and planned value of one top-level attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet(BTreeMap<String, Change>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, change: Change) {
        self.0.insert(name.into(), change);
    }

    pub fn has_change(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_change(n))
    }

    pub fn get(&self, name: &str) -> Option<&Change> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Changes between two full states of the same schema
    pub fn between(block: &Block, prior: &Object, planned: &Object) -> Self {
        let mut out = ChangeSet::new();
        for name in block.attributes.keys() {
            let old = prior.get(*name).unwrap_or(&Value::Null);
            let new = planned.get(*name).unwrap_or(&Value::Null);
            if !zero_equal(old, new) {
                out.insert(
                    *name,
                    Change {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
        }
        out
    }
}

/// Result of planning one resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedDiff {
    pub planned: Object,
    pub changes: ChangeSet,
    pub requires_replace: Vec<AttributePath>,
}

impl PlannedDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn is_zero(v: &Value) -> bool {
    match v {
        Value::Bool(b) => !b,
        Value::Int(i) => *i == 0,
        other => other.is_empty(),
    }
}

/// Equality where an absent value equals the zero value of its type
pub fn zero_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return is_zero(a) && is_zero(b);
    }
    a == b
}

/// Plan `config` against `prior` (absent on create)
pub fn plan_diff(block: &Block, prior: Option<&Object>, config: &Object) -> PlannedDiff {
    let empty = Object::new();
    let prior_obj = prior.unwrap_or(&empty);
    let mut out = PlannedDiff::default();
    plan_block(block, prior_obj, config, prior.is_some(), &mut out);
    out
}

fn plan_block(
    block: &Block,
    prior: &Object,
    config: &Object,
    has_prior: bool,
    out: &mut PlannedDiff,
) {
    for (name, attribute) in &block.attributes {
        let attr_path = AttributePath::attr(*name);
        let old = prior.get(*name).cloned().unwrap_or_default();
        let configured = config.get(*name).cloned().unwrap_or_default();

        let mut planned = plan_value(attribute, &old, &configured);
        let mut changed = !zero_equal(&old, &planned);

        if changed && !old.is_null() {
            if let Some(suppress) = attribute.diff_suppress {
                if suppress(&attr_path.to_string(), &old, &planned, config) {
                    planned = old.clone();
                    changed = false;
                }
            }
        }

        if changed && has_prior {
            if attribute.force_new {
                out.requires_replace.push(attr_path.clone());
            } else if let Some(nested) = attribute.ty.nested_block() {
                nested_force_new(nested, &old, &planned, &attr_path, out);
            }
        }

        if changed {
            out.changes.insert(
                *name,
                Change {
                    old,
                    new: planned.clone(),
                },
            );
        }
        out.planned.insert((*name).to_string(), planned);
    }
}

/// Planned value: configured, else default, else prior when computed
fn plan_value(attribute: &Attribute, old: &Value, configured: &Value) -> Value {
    if !configured.is_null() {
        if let Some(nested) = attribute.ty.nested_block() {
            return plan_nested(&attribute.ty, nested, old, configured);
        }
        return configured.clone();
    }
    if let Some(default) = &attribute.default {
        return default.clone();
    }
    if attribute.computed {
        return old.clone();
    }
    Value::Null
}

/// Merge computed sub-attributes of nested blocks from prior elements
fn plan_nested(ty: &Type, nested: &Block, old: &Value, configured: &Value) -> Value {
    let merge = |prior_elem: Option<&Value>, cfg_elem: &Value| -> Value {
        let Some(cfg) = cfg_elem.as_object() else {
            return cfg_elem.clone();
        };
        let empty = Object::new();
        let prior = prior_elem.and_then(Value::as_object).unwrap_or(&empty);
        let mut merged = Object::new();
        for (name, attribute) in &nested.attributes {
            let o = prior.get(*name).cloned().unwrap_or_default();
            let c = cfg.get(*name).cloned().unwrap_or_default();
            let mut v = plan_value(attribute, &o, &c);
            if let Some(suppress) = attribute.diff_suppress {
                if !o.is_null() && !zero_equal(&o, &v) && suppress(name, &o, &v, cfg) {
                    v = o;
                }
            }
            merged.insert((*name).to_string(), v);
        }
        Value::Object(merged)
    };

    match (ty, configured) {
        (Type::List(_), Value::List(items)) => {
            let prior_items = old.as_items();
            Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| merge(prior_items.get(i), item))
                    .collect(),
            )
        }
        (Type::Set(_), Value::Set(items)) => {
            // Match prior elements on their configurable sub-attributes
            let prior_items = old.as_items();
            Value::set(items.iter().map(|item| {
                let prior = prior_items
                    .iter()
                    .find(|p| configurable_equal(nested, p, item));
                merge(prior, item)
            }))
        }
        (Type::Object(_), Value::Object(_)) => merge(Some(old), configured),
        _ => configured.clone(),
    }
}

fn configurable_equal(block: &Block, a: &Value, b: &Value) -> bool {
    block
        .attributes
        .iter()
        .filter(|(_, attr)| !attr.is_read_only())
        .all(|(name, attr)| {
            let x = a.get(name);
            let y = b.get(name);
            if attr.computed && y.is_null() {
                return true;
            }
            if zero_equal(x, y) {
                return true;
            }
            match attr.diff_suppress {
                Some(suppress) => suppress(name, x, y, &Object::new()),
                None => false,
            }
        })
}

fn nested_force_new(
    block: &Block,
    old: &Value,
    planned: &Value,
    path: &AttributePath,
    out: &mut PlannedDiff,
) {
    let old_items = old.as_items();
    for (i, item) in planned.as_items().iter().enumerate() {
        let Some(prior) = old_items.get(i) else {
            continue;
        };
        for (name, attribute) in &block.attributes {
            if attribute.force_new && !zero_equal(prior.get(name), item.get(name)) {
                out.requires_replace.push(path.index(i).join(*name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::suppress_time;
    use crate::object;
    use pretty_assertions::assert_eq;

    fn api_key_block() -> Block {
        Block::new()
            .attr("application_id", Attribute::optional(Type::Uuid).force_new())
            .attr("description", Attribute::optional(Type::String))
            .attr(
                "expires_at",
                Attribute::optional(Type::Time)
                    .force_new()
                    .diff_suppress(suppress_time),
            )
            .attr("access_key", Attribute::computed(Type::String))
            .attr(
                "default_project_id",
                Attribute::optional_computed(Type::Uuid),
            )
            .attr("editable", Attribute::computed(Type::Bool))
    }

    #[test]
    fn test_plan_on_create() {
        let config = object! { "application_id" => "a", "description" => "d" };
        let diff = plan_diff(&api_key_block(), None, &config);
        assert!(diff.requires_replace.is_empty());
        assert!(diff.changes.has_change("application_id"));
        assert!(diff.changes.has_change("description"));
        assert!(!diff.changes.has_change("access_key"));
        assert_eq!(diff.planned["access_key"], Value::Null);
    }

    #[test]
    fn test_computed_values_carry_over() {
        let prior = object! {
            "application_id" => "a",
            "description" => "",
            "expires_at" => "2025-07-06T09:00:00Z",
            "access_key" => "SCWXXXXXXXXXXXXXXXXX",
            "default_project_id" => "p",
            "editable" => true,
        };
        let config = object! {
            "application_id" => "a",
            "expires_at" => "2025-07-06T11:00:00+02:00",
        };
        let diff = plan_diff(&api_key_block(), Some(&prior), &config);
        assert!(diff.is_empty(), "unexpected changes: {:?}", diff.changes);
        assert!(diff.requires_replace.is_empty());
        assert_eq!(diff.planned["expires_at"], Value::from("2025-07-06T09:00:00Z"));
        assert_eq!(diff.planned["access_key"], Value::from("SCWXXXXXXXXXXXXXXXXX"));
    }

    #[test]
    fn test_force_new_change() {
        let prior = object! { "application_id" => "a", "expires_at" => "2025-07-06T09:00:00Z" };
        let config = object! { "application_id" => "a", "expires_at" => "2026-01-01T00:00:00Z" };
        let diff = plan_diff(&api_key_block(), Some(&prior), &config);
        assert_eq!(diff.requires_replace, vec![AttributePath::attr("expires_at")]);
    }

    #[test]
    fn test_nested_computed_merge() {
        let pn = Block::new()
            .attr("private_network_id", Attribute::required(Type::Uuid))
            .attr(
                "static_config",
                Attribute::optional(Type::list(Type::Ip)),
            )
            .attr("status", Attribute::computed(Type::String));
        let block = Block::new().attr(
            "private_network",
            Attribute::optional(Type::set(Type::Object(pn))),
        );
        let prior_elem = Value::Object(object! {
            "private_network_id" => "pn1",
            "static_config" => Value::string_list(["192.168.1.1"]),
            "status" => "ready",
        });
        let prior = object! { "private_network" => Value::set([prior_elem]) };

        let same = object! {
            "private_network" => Value::set([Value::Object(object! {
                "private_network_id" => "pn1",
                "static_config" => Value::string_list(["192.168.1.1"]),
            })]),
        };
        assert!(plan_diff(&block, Some(&prior), &same).is_empty());

        let moved = object! {
            "private_network" => Value::set([Value::Object(object! {
                "private_network_id" => "pn1",
                "static_config" => Value::string_list(["192.168.1.2"]),
            })]),
        };
        let diff = plan_diff(&block, Some(&prior), &moved);
        assert!(diff.changes.has_change("private_network"));
    }

    #[test]
    fn test_change_set_between() {
        let block = api_key_block();
        let prior = object! { "description" => "a" };
        let planned = object! { "description" => "b", "editable" => false };
        let changes = ChangeSet::between(&block, &prior, &planned);
        assert_eq!(changes.names().collect::<Vec<_>>(), vec!["description"]);
    }

    #[test]
    fn test_zero_equal() {
        assert!(zero_equal(&Value::Null, &Value::from("")));
        assert!(zero_equal(&Value::Null, &Value::Bool(false)));
        assert!(!zero_equal(&Value::Null, &Value::from("x")));
        assert!(zero_equal(&Value::List(vec![]), &Value::Null));
    }
}
