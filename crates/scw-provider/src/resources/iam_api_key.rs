use super::{require_id, set_timestamps};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::iam::{ApiKey, CreateApiKeyRequest, UpdateApiKeyRequest};
use scw_core::convert::{
    expand_id_ptr, expand_string_ptr, expand_time_ptr, expand_updated_string_ptr, flatten_string_ptr,
    flatten_time,
};
use scw_core::diff::suppress_time;
use scw_core::{Attribute, Block, Context, Diagnostic, Diagnostics, Object, Schema, Type};

pub struct IamApiKey;

/// Attributes shared with the ephemeral variant
pub(crate) fn key_block() -> Block {
    Block::new()
        .attr(
            "application_id",
            Attribute::optional(Type::Uuid)
                .force_new()
                .conflicts_with(&["user_id"])
                .description("Application owning the key"),
        )
        .attr(
            "user_id",
            Attribute::optional(Type::Uuid)
                .force_new()
                .conflicts_with(&["application_id"])
                .description("User owning the key"),
        )
        .attr("description", Attribute::optional(Type::String))
        .attr(
            "default_project_id",
            Attribute::optional_computed(Type::Uuid),
        )
        .attr(
            "expires_at",
            Attribute::optional(Type::Time)
                .force_new()
                .diff_suppress(suppress_time),
        )
        .attr("access_key", Attribute::computed(Type::String))
        .attr("secret_key", Attribute::computed(Type::String).sensitive())
        .attr("editable", Attribute::computed(Type::Bool))
        .attr("creation_ip", Attribute::computed(Type::String))
        .attr("created_at", Attribute::computed(Type::Time))
        .attr("updated_at", Attribute::computed(Type::Time))
}

pub(crate) fn validate_owner(config: &Object) -> Diagnostics {
    let set = |name: &str| config.get(name).is_some_and(|v| !v.is_empty());
    if set("application_id") || set("user_id") {
        return Diagnostics::new();
    }
    Diagnostic::error("Missing key owner")
        .with_detail("one of \"application_id\" or \"user_id\" must be set")
        .with_path("application_id")
        .into()
}

pub(crate) fn create_request(meta: &Meta, d: &ResourceData) -> Result<CreateApiKeyRequest> {
    Ok(CreateApiKeyRequest {
        application_id: expand_id_ptr(d.get("application_id")),
        user_id: expand_id_ptr(d.get("user_id")),
        expires_at: expand_time_ptr(d.get("expires_at"))
            .map_err(|e| ProviderError::at("expires_at", e))?,
        default_project_id: meta.project_of(d, "default_project_id"),
        description: expand_string_ptr(d.get("description")),
    })
}

/// Everything but the secret, which only the create reply carries
pub(crate) fn flatten_key(d: &mut ResourceData, key: &ApiKey) {
    d.set("access_key", key.access_key.as_str());
    d.set("application_id", flatten_string_ptr(key.application_id.as_deref()));
    d.set("user_id", flatten_string_ptr(key.user_id.as_deref()));
    d.set("description", key.description.as_str());
    d.set("default_project_id", key.default_project_id.as_str());
    d.set("editable", key.editable);
    d.set("creation_ip", key.creation_ip.as_str());
    d.set("expires_at", flatten_time(key.expires_at.as_ref()));
    set_timestamps(d, key.created_at.as_ref(), key.updated_at.as_ref());
}

#[async_trait]
impl Resource for IamApiKey {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_api_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(key_block()).description("IAM API key")
    }

    fn validate(&self, config: &Object) -> Diagnostics {
        validate_owner(config)
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let req = create_request(meta, d)?;
        let key = meta.iam().create_api_key(ctx, &req).await?;
        d.set_id(&key.access_key);
        // Not recoverable after this reply
        if let Some(secret) = &key.secret_key {
            d.set("secret_key", secret.as_str());
        }
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let key = meta.iam().get_api_key(ctx, require_id(d)?).await?;
        flatten_key(d, &key);
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        if !d.has_any_change(&["description", "default_project_id"]) {
            return Ok(());
        }
        let req = UpdateApiKeyRequest {
            description: d
                .has_change("description")
                .then(|| expand_updated_string_ptr(d.get("description")))
                .flatten(),
            default_project_id: d
                .has_change("default_project_id")
                .then(|| expand_string_ptr(d.get("default_project_id")))
                .flatten(),
        };
        meta.iam().update_api_key(ctx, require_id(d)?, &req).await?;
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        meta.iam().delete_api_key(ctx, require_id(d)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::object;

    #[test]
    fn test_owner_required() {
        let none = object! { "description" => "ci" };
        assert!(validate_owner(&none).has_errors());
        let app = object! { "application_id" => "11111111-1111-4111-8111-111111111111" };
        assert!(validate_owner(&app).is_empty());
    }

    #[test]
    fn test_secret_is_sensitive() {
        let block = key_block();
        assert!(block.get("secret_key").is_some_and(|a| a.sensitive));
        assert_eq!(block.sensitive_paths(), vec!["secret_key".to_string()]);
    }
}
