use super::{require_id, set_timestamps};
use crate::error::Result;
use crate::meta::Meta;
use crate::relation::{Relation, reconcile};
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::iam::{CreateGroupRequest, GroupMember, UpdateGroupRequest};
use scw_core::convert::{
    expand_string, expand_string_ptr, expand_string_set, expand_strings,
    expand_updated_string_ptr, expand_updated_strings_ptr, flatten_string_set, flatten_strings,
};
use scw_core::{Attribute, Block, Context, MemberKind, Schema, Type, Value};
use std::fmt;

pub struct IamGroup;

/// One user or application in a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Member {
    pub kind: MemberKind,
    pub id: String,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl Member {
    pub(crate) fn to_api(&self) -> GroupMember {
        match self.kind {
            MemberKind::User => GroupMember::UserId(self.id.clone()),
            MemberKind::App => GroupMember::ApplicationId(self.id.clone()),
        }
    }
}

fn members(user_ids: &Value, application_ids: &Value) -> Vec<Member> {
    let users = expand_string_set(user_ids).into_iter().map(|id| Member {
        kind: MemberKind::User,
        id,
    });
    let apps = expand_string_set(application_ids)
        .into_iter()
        .map(|id| Member {
            kind: MemberKind::App,
            id,
        });
    users.chain(apps).collect()
}

struct GroupMembers<'a> {
    meta: &'a Meta,
    group_id: &'a str,
}

#[async_trait]
impl Relation for GroupMembers<'_> {
    type Member = Member;

    fn attribute(&self) -> &'static str {
        "user_ids"
    }

    async fn detach(&self, ctx: &Context, member: &Member) -> Result<()> {
        self.meta
            .iam()
            .remove_group_member(ctx, self.group_id, &member.to_api())
            .await?;
        Ok(())
    }

    async fn attach(&self, ctx: &Context, member: &Member) -> Result<()> {
        self.meta
            .iam()
            .add_group_member(ctx, self.group_id, &member.to_api())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for IamGroup {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_group"
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
                .attr(
                    "user_ids",
                    Attribute::optional(Type::set(Type::Uuid)).description("Users in the group"),
                )
                .attr(
                    "application_ids",
                    Attribute::optional(Type::set(Type::Uuid))
                        .description("Applications in the group"),
                )
                .attr(
                    "external_membership",
                    Attribute::optional(Type::Bool)
                        .default(false)
                        .description("Membership is managed by scaleway_iam_group_membership"),
                )
                .attr("tags", Attribute::optional(Type::list(Type::String)))
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("IAM group")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let req = CreateGroupRequest {
            organization_id: meta.organization_of(d),
            name: expand_string(d.get("name")),
            description: expand_string(d.get("description")),
            tags: expand_strings(d.get("tags")),
        };
        let group = meta.iam().create_group(ctx, &req).await?;
        d.set_id(&group.id);

        if !d.get_bool("external_membership") {
            let rel = GroupMembers {
                meta,
                group_id: &group.id,
            };
            let desired = members(d.get("user_ids"), d.get("application_ids"));
            reconcile(ctx, &rel, &[], &desired).await?;
        }
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let group = meta.iam().get_group(ctx, require_id(d)?).await?;
        d.set("name", group.name.as_str());
        d.set("description", group.description.as_str());
        d.set("organization_id", group.organization_id.as_str());
        d.set("tags", flatten_strings(&group.tags));
        if !d.get_bool("external_membership") {
            d.set("user_ids", flatten_string_set(&group.user_ids));
            d.set("application_ids", flatten_string_set(&group.application_ids));
        }
        set_timestamps(d, group.created_at.as_ref(), group.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = require_id(d)?.to_string();
        if d.has_any_change(&["name", "description", "tags"]) {
            let req = UpdateGroupRequest {
                name: expand_string_ptr(d.get("name")),
                description: expand_updated_string_ptr(d.get("description")),
                tags: expand_updated_strings_ptr(d.get("tags")),
            };
            meta.iam().update_group(ctx, &id, &req).await?;
        }

        if !d.get_bool("external_membership") && d.has_any_change(&["user_ids", "application_ids"])
        {
            let old = members(d.prior("user_ids"), d.prior("application_ids"));
            let new = members(d.get("user_ids"), d.get("application_ids"));
            let rel = GroupMembers {
                meta,
                group_id: &id,
            };
            reconcile(ctx, &rel, &old, &new).await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        meta.iam().delete_group(ctx, require_id(d)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_display_kind() {
        let m = members(
            &Value::string_set(["u1"]),
            &Value::string_set(["a1", "a2"]),
        );
        let shown: Vec<String> = m.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["user:u1", "app:a1", "app:a2"]);
    }
}
