use super::{require_id, set_timestamps};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::iam::{CreatePolicyRequest, Rule, RuleSpecs, UpdatePolicyRequest};
use scw_core::convert::{
    expand_bool, expand_id_ptr, expand_string, expand_string_ptr, expand_string_set,
    expand_strings, expand_strings_ptr, expand_updated_string_ptr, expand_updated_strings_ptr,
    flatten_string_ptr, flatten_string_set, flatten_strings,
};
use scw_core::{Attribute, Block, Context, Diagnostic, Diagnostics, Object, Schema, Type, Value};

pub struct IamPolicy;

const PRINCIPALS: [&str; 4] = ["user_id", "group_id", "application_id", "no_principal"];

fn principal(name: &'static str, others: &'static [&'static str]) -> Attribute {
    let ty = if name == "no_principal" {
        Type::Bool
    } else {
        Type::Uuid
    };
    Attribute::optional(ty).conflicts_with(others)
}

fn rule_block() -> Block {
    Block::new()
        .attr(
            "permission_set_names",
            Attribute::required(Type::set(Type::String)),
        )
        .attr(
            "project_ids",
            Attribute::optional_computed(Type::list(Type::Uuid)),
        )
        .attr("organization_id", Attribute::optional_computed(Type::Uuid))
}

fn expand_rules(v: &Value) -> Vec<RuleSpecs> {
    v.as_items()
        .iter()
        .map(|rule| RuleSpecs {
            permission_set_names: expand_string_set(rule.get("permission_set_names")),
            project_ids: expand_strings_ptr(rule.get("project_ids")),
            organization_id: expand_string_ptr(rule.get("organization_id")),
        })
        .collect()
}

fn flatten_rules(rules: &[Rule]) -> Value {
    Value::List(
        rules
            .iter()
            .map(|r| {
                let mut o = Object::new();
                o.insert(
                    "permission_set_names".to_string(),
                    flatten_string_set(&r.permission_set_names),
                );
                o.insert(
                    "project_ids".to_string(),
                    flatten_strings(r.project_ids.as_deref().unwrap_or_default()),
                );
                o.insert(
                    "organization_id".to_string(),
                    flatten_string_ptr(r.organization_id.as_deref()),
                );
                Value::Object(o)
            })
            .collect(),
    )
}

#[async_trait]
impl Resource for IamPolicy {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_policy"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr("name", Attribute::optional_computed(Type::String))
                .attr("description", Attribute::optional(Type::String))
                .attr(
                    "organization_id",
                    Attribute::optional_computed(Type::Uuid).force_new(),
                )
                .attr("tags", Attribute::optional(Type::list(Type::String)))
                .attr(
                    "user_id",
                    principal("user_id", &["group_id", "application_id", "no_principal"]),
                )
                .attr(
                    "group_id",
                    principal("group_id", &["user_id", "application_id", "no_principal"]),
                )
                .attr(
                    "application_id",
                    principal("application_id", &["user_id", "group_id", "no_principal"]),
                )
                .attr(
                    "no_principal",
                    principal("no_principal", &["user_id", "group_id", "application_id"])
                        .description("Policy bound to no principal"),
                )
                .attr("editable", Attribute::computed(Type::Bool))
                .attr(
                    "rule",
                    Attribute::required(Type::list(Type::Object(rule_block())))
                        .description("Ordered permission rules"),
                )
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("IAM policy")
    }

    fn validate(&self, config: &Object) -> Diagnostics {
        let set = |name: &str| {
            config
                .get(name)
                .is_some_and(|v| !v.is_empty() && *v != Value::Bool(false))
        };
        if PRINCIPALS.iter().any(|p| set(p)) {
            return Diagnostics::new();
        }
        Diagnostic::error("Missing principal")
            .with_detail(format!("one of {} must be set", PRINCIPALS.join(", ")))
            .with_path("user_id")
            .into()
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let req = CreatePolicyRequest {
            name: expand_string(d.get("name")),
            description: expand_string(d.get("description")),
            organization_id: meta.organization_of(d),
            rules: expand_rules(d.get("rule")),
            tags: expand_strings(d.get("tags")),
            user_id: expand_id_ptr(d.get("user_id")),
            group_id: expand_id_ptr(d.get("group_id")),
            application_id: expand_id_ptr(d.get("application_id")),
            no_principal: expand_bool(d.get("no_principal")).then_some(true),
        };
        let policy = meta.iam().create_policy(ctx, &req).await?;
        d.set_id(&policy.id);
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = require_id(d)?.to_string();
        let policy = meta.iam().get_policy(ctx, &id).await?;
        let rules = meta.iam().list_rules(ctx, &id).await?;
        d.set("name", policy.name.as_str());
        d.set("description", policy.description.as_str());
        d.set("organization_id", policy.organization_id.as_str());
        d.set("tags", flatten_strings(&policy.tags));
        d.set("user_id", flatten_string_ptr(policy.user_id.as_deref()));
        d.set("group_id", flatten_string_ptr(policy.group_id.as_deref()));
        d.set(
            "application_id",
            flatten_string_ptr(policy.application_id.as_deref()),
        );
        d.set("no_principal", policy.no_principal);
        d.set("editable", policy.editable);
        d.set("rule", flatten_rules(&rules));
        set_timestamps(d, policy.created_at.as_ref(), policy.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = require_id(d)?.to_string();

        let principal_changed = d.has_any_change(&PRINCIPALS);
        if principal_changed || d.has_any_change(&["name", "description", "tags"]) {
            let mut req = UpdatePolicyRequest {
                name: expand_string_ptr(d.get("name")),
                description: expand_updated_string_ptr(d.get("description")),
                tags: expand_updated_strings_ptr(d.get("tags")),
                ..UpdatePolicyRequest::default()
            };
            if principal_changed {
                req.user_id = expand_id_ptr(d.get("user_id"));
                req.group_id = expand_id_ptr(d.get("group_id"));
                req.application_id = expand_id_ptr(d.get("application_id"));
                req.no_principal = Some(expand_bool(d.get("no_principal")));
            }
            meta.iam().update_policy(ctx, &id, &req).await?;
        }

        if d.has_change("rule") {
            meta.iam()
                .set_rules(ctx, &id, &expand_rules(d.get("rule")))
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        meta.iam().delete_policy(ctx, require_id(d)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::{AttributePath, object};

    #[test]
    fn test_user_and_no_principal_conflict() {
        let schema = IamPolicy.schema();
        let config = object! {
            "user_id" => "44444444-4444-4444-8444-444444444444",
            "no_principal" => true,
            "rule" => Value::List(vec![Value::Object(object! {
                "permission_set_names" => Value::string_set(["AllProductsFullAccess"]),
            })]),
        };
        let diags = schema.block.validate(&config, &AttributePath::root());
        let paths: Vec<String> = diags
            .iter()
            .filter(|d| d.is_error())
            .filter_map(|d| d.path.as_ref().map(ToString::to_string))
            .collect();
        assert!(paths.contains(&"user_id".to_string()));
        assert!(paths.contains(&"no_principal".to_string()));
    }

    #[test]
    fn test_rules_expand_in_order() {
        let rules = Value::List(vec![
            Value::Object(object! {
                "permission_set_names" => Value::string_set(["B", "A"]),
                "project_ids" => Value::string_list(["p1"]),
            }),
            Value::Object(object! {
                "permission_set_names" => Value::string_set(["C"]),
                "organization_id" => "o1",
            }),
        ]);
        let specs = expand_rules(&rules);
        assert_eq!(specs[0].permission_set_names, vec!["A", "B"]);
        assert_eq!(specs[0].project_ids, Some(vec!["p1".to_string()]));
        assert_eq!(specs[1].organization_id.as_deref(), Some("o1"));
    }
}
