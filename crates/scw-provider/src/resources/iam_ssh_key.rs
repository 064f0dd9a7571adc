use super::{require_id, set_timestamps};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::iam::{CreateSshKeyRequest, UpdateSshKeyRequest};
use scw_core::convert::{expand_string, expand_string_ptr, expand_updated_string_ptr};
use scw_core::diff::suppress_ssh_key;
use scw_core::{Attribute, Block, Context, Schema, Type};

pub struct IamSshKey;

#[async_trait]
impl Resource for IamSshKey {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr(
                    "name",
                    Attribute::optional_computed(Type::String).description("Name of the SSH key"),
                )
                .attr(
                    "public_key",
                    Attribute::required(Type::String)
                        .force_new()
                        .diff_suppress(suppress_ssh_key)
                        .description("OpenSSH public key; comments and surrounding whitespace are ignored"),
                )
                .attr(
                    "project_id",
                    Attribute::optional_computed(Type::Uuid).force_new(),
                )
                .attr("organization_id", Attribute::computed(Type::String))
                .attr("fingerprint", Attribute::computed(Type::String))
                .attr(
                    "disabled",
                    Attribute::optional(Type::Bool)
                        .default(false)
                        .description("Disable the key without deleting it"),
                )
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("IAM SSH key")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let req = CreateSshKeyRequest {
            name: expand_string_ptr(d.get("name")),
            public_key: expand_string(d.get("public_key")),
            project_id: meta.project_of(d, "project_id"),
        };
        let key = meta.iam().create_ssh_key(ctx, &req).await?;
        d.set_id(&key.id);

        if d.get_bool("disabled") {
            meta.iam().disable_ssh_key(ctx, &key.id).await?;
        }
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let key = meta.iam().get_ssh_key(ctx, require_id(d)?).await?;
        d.set("name", key.name.as_str());
        d.set("public_key", key.public_key.as_str());
        d.set("project_id", key.project_id.as_str());
        d.set("organization_id", key.organization_id.as_str());
        d.set("fingerprint", key.fingerprint.as_str());
        d.set("disabled", key.disabled);
        set_timestamps(d, key.created_at.as_ref(), key.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = require_id(d)?.to_string();
        if d.has_change("name") {
            let req = UpdateSshKeyRequest {
                name: expand_updated_string_ptr(d.get("name")),
            };
            meta.iam().update_ssh_key(ctx, &id, &req).await?;
        }
        if d.has_change("disabled") {
            if d.get_bool("disabled") {
                meta.iam().disable_ssh_key(ctx, &id).await?;
            } else {
                meta.iam().enable_ssh_key(ctx, &id).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        meta.iam().delete_ssh_key(ctx, require_id(d)?).await?;
        Ok(())
    }
}
