use super::iam_group::Member;
use super::require_id;
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_core::convert::expand_id_ptr;
use scw_core::{
    Attribute, Block, Context, Diagnostic, Diagnostics, MemberId, MemberKind, Object, Schema, Type,
};

/// Attaches a single user or application to a group
pub struct IamGroupMembership;

fn member_of(d: &ResourceData) -> Result<(String, Member)> {
    let group_id = expand_id_ptr(d.get("group_id"))
        .ok_or_else(|| ProviderError::invalid("group_id", "group_id is required"))?;
    let member = match (
        expand_id_ptr(d.get("user_id")),
        expand_id_ptr(d.get("application_id")),
    ) {
        (Some(id), None) => Member {
            kind: MemberKind::User,
            id,
        },
        (None, Some(id)) => Member {
            kind: MemberKind::App,
            id,
        },
        _ => {
            return Err(ProviderError::invalid(
                "user_id",
                "exactly one of user_id and application_id is required",
            ));
        }
    };
    Ok((group_id, member))
}

#[async_trait]
impl Resource for IamGroupMembership {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_group_membership"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr("group_id", Attribute::required(Type::Uuid).force_new())
                .attr(
                    "user_id",
                    Attribute::optional(Type::Uuid)
                        .force_new()
                        .conflicts_with(&["application_id"]),
                )
                .attr(
                    "application_id",
                    Attribute::optional(Type::Uuid)
                        .force_new()
                        .conflicts_with(&["user_id"]),
                ),
        )
        .description("Membership of one user or application in an IAM group")
    }

    fn validate(&self, config: &Object) -> Diagnostics {
        let set = |name: &str| config.get(name).is_some_and(|v| !v.is_empty());
        if set("user_id") || set("application_id") {
            return Diagnostics::new();
        }
        Diagnostic::error("Missing member")
            .with_detail("one of \"user_id\" or \"application_id\" must be set")
            .with_path("user_id")
            .into()
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let (group_id, member) = member_of(d)?;
        meta.iam()
            .add_group_member(ctx, &group_id, &member.to_api())
            .await?;
        d.set_id(MemberId::new(group_id, member.kind, member.id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id: MemberId = require_id(d)?.parse()?;
        let group = meta.iam().get_group(ctx, &id.parent_id).await?;
        let listed = match id.kind {
            MemberKind::User => &group.user_ids,
            MemberKind::App => &group.application_ids,
        };
        if !listed.contains(&id.member_id) {
            tracing::warn!(%id, "member no longer in group");
            d.clear_id();
            return Ok(());
        }
        d.set("group_id", id.parent_id.as_str());
        let (user, app) = match id.kind {
            MemberKind::User => (id.member_id.as_str(), ""),
            MemberKind::App => ("", id.member_id.as_str()),
        };
        d.set("user_id", user);
        d.set("application_id", app);
        Ok(())
    }

    async fn update(&self, _ctx: &Context, _meta: &Meta, _d: &mut ResourceData) -> Result<()> {
        // Every attribute forces a new membership
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id: MemberId = require_id(d)?.parse()?;
        let member = Member {
            kind: id.kind,
            id: id.member_id,
        };
        meta.iam()
            .remove_group_member(ctx, &id.parent_id, &member.to_api())
            .await?;
        Ok(())
    }

    fn import_id(&self, id: &str) -> Result<String> {
        let id: MemberId = id.parse()?;
        Ok(id.to_string())
    }
}
