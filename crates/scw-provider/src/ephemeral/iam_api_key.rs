use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{EphemeralResource, ResourceData};
use crate::resources::iam_api_key::{create_request, flatten_key, key_block, validate_owner};
use async_trait::async_trait;
use scw_core::{Context, Schema};

/// Mints a fresh access key and secret key on every open
pub struct IamApiKeyEphemeral;

#[async_trait]
impl EphemeralResource for IamApiKeyEphemeral {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_api_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(key_block()).description("Short-lived IAM API key")
    }

    async fn open(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let owner = validate_owner(d.state());
        if owner.has_errors() {
            return Err(ProviderError::invalid(
                "application_id",
                "one of \"application_id\" or \"user_id\" must be set",
            ));
        }
        let req = create_request(meta, d)?;
        let key = meta.iam().create_api_key(ctx, &req).await?;
        tracing::debug!(access_key = %key.access_key, "minted ephemeral api key");
        d.set_id(&key.access_key);
        flatten_key(d, &key);
        d.set(
            "secret_key",
            key.secret_key.as_deref().unwrap_or_default(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_api::fake::FakeCloud;
    use scw_core::{Region, Zone, object};
    use std::sync::Arc;

    fn meta() -> Meta {
        let zone: Zone = "fr-par-1".parse().unwrap();
        let region: Region = "fr-par".parse().unwrap();
        Meta::new(Arc::new(FakeCloud::new()), zone, region)
            .with_project_id("11111111-1111-4111-8111-111111111111")
    }

    #[tokio::test]
    async fn test_each_open_mints_a_new_key() {
        let meta = meta();
        let ctx = Context::background();
        let config = object! { "application_id" => "22222222-2222-4222-8222-222222222222" };

        let mut first = ResourceData::new(None, config.clone());
        IamApiKeyEphemeral.open(&ctx, &meta, &mut first).await.unwrap();
        let mut second = ResourceData::new(None, config);
        IamApiKeyEphemeral.open(&ctx, &meta, &mut second).await.unwrap();

        assert_ne!(first.get_str("access_key"), second.get_str("access_key"));
        assert!(!first.get_str("secret_key").is_empty());
        assert_eq!(first.id(), Some(first.get_str("access_key")));
    }

    #[tokio::test]
    async fn test_owner_required() {
        let mut d = ResourceData::new(None, object! { "description" => "ci" });
        let err = IamApiKeyEphemeral
            .open(&Context::background(), &meta(), &mut d)
            .await
            .unwrap_err();
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("application_id"));
    }
}
