//! Type registries and request dispatch

use crate::driver::{Driver, Outcome, open_ephemeral, read_data_source};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::protocol::{Request, Response, TimeoutsSpec, TypeKind};
use crate::resource::{DataSource, EphemeralResource, Resource};
use crate::{datasources, ephemeral, resources};
use scw_config::{ProviderConfig, ProviderInput, retry_interval_from_env};
use scw_core::waiter::set_retry_interval_override;
use scw_core::{AttributePath, Attribute, Block, Context, Diagnostic, Diagnostics, Schema, Type};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

pub struct Provider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    ephemeral: BTreeMap<&'static str, Arc<dyn EphemeralResource>>,
    meta: OnceLock<Meta>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

/// Attributes of the provider block
pub fn provider_schema() -> Schema {
    let string = || Attribute::optional(Type::String);
    Schema::new(
        Block::new()
            .attr("access_key", string())
            .attr("secret_key", string().sensitive())
            .attr("project_id", Attribute::optional(Type::Uuid))
            .attr("organization_id", Attribute::optional(Type::Uuid))
            .attr("zone", string())
            .attr("region", string())
            .attr("api_url", string())
            .attr("profile", string().description("Profile of the config file")),
    )
    .description("Scaleway")
}

impl Provider {
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: datasources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            ephemeral: ephemeral::all()
                .into_iter()
                .map(|e| (e.type_name(), e))
                .collect(),
            meta: OnceLock::new(),
        }
    }

    /// Provider already configured with `meta`
    pub fn with_meta(meta: Meta) -> Self {
        let provider = Self::new();
        let _ = provider.meta.set(meta);
        provider
    }

    pub fn meta(&self) -> Result<&Meta> {
        self.meta.get().ok_or(ProviderError::NotConfigured)
    }

    fn resource(&self, name: &str) -> Result<&dyn Resource> {
        self.resources
            .get(name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownType {
                category: "resource",
                name: name.to_string(),
            })
    }

    fn data_source(&self, name: &str) -> Result<&dyn DataSource> {
        self.data_sources
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownType {
                category: "data source",
                name: name.to_string(),
            })
    }

    fn ephemeral_resource(&self, name: &str) -> Result<&dyn EphemeralResource> {
        self.ephemeral
            .get(name)
            .map(|e| e.as_ref())
            .ok_or_else(|| ProviderError::UnknownType {
                category: "ephemeral resource",
                name: name.to_string(),
            })
    }

    /// Catalog of everything this provider serves
    pub fn schema(&self) -> Json {
        fn catalog<'a>(items: impl Iterator<Item = (&'a &'static str, Schema)>) -> Json {
            Json::Object(
                items
                    .map(|(name, schema)| (name.to_string(), schema.describe()))
                    .collect::<Map<_, _>>(),
            )
        }
        serde_json::json!({
            "provider": provider_schema().describe(),
            "resources": catalog(self.resources.iter().map(|(n, r)| (n, r.schema()))),
            "data_sources": catalog(self.data_sources.iter().map(|(n, d)| (n, d.schema()))),
            "ephemeral_resources": catalog(self.ephemeral.iter().map(|(n, e)| (n, e.schema()))),
        })
    }

    /// Build the meta once per process
    pub fn configure(&self, config: &Json) -> Diagnostics {
        if self.meta.get().is_some() {
            tracing::warn!("provider configured twice, keeping the first configuration");
            return Diagnostics::new();
        }
        if !config.is_null() {
            let diags = validate_block(&provider_schema(), config);
            if diags.has_errors() {
                return diags;
            }
        }
        match build_meta(config) {
            Ok(meta) => {
                let _ = self.meta.set(meta);
                Diagnostics::new()
            }
            Err(e) => e.to_diagnostic("Error configuring provider").into(),
        }
    }

    pub async fn handle(&self, request: Request, ctx: &Context) -> Response {
        tracing::debug!(
            method = request.method(),
            type_name = request.type_name().unwrap_or_default(),
            "handling request"
        );
        match self.dispatch(request, ctx).await {
            Ok(resp) => resp,
            Err((summary, e)) => Response::diagnostics(e.to_diagnostic(&summary).into()),
        }
    }

    async fn dispatch(
        &self,
        request: Request,
        ctx: &Context,
    ) -> std::result::Result<Response, (String, ProviderError)> {
        let failed = |summary: &str| {
            let summary = summary.to_string();
            move |e: ProviderError| (summary, e)
        };
        let resp = match request {
            Request::GetProviderSchema => Response {
                schema: Some(self.schema()),
                ..Response::default()
            },
            Request::ConfigureProvider { config } => Response::diagnostics(self.configure(&config)),
            Request::Stop => Response::default(),
            Request::Validate {
                type_name,
                kind,
                config,
            } => {
                let invalid = failed("Invalid type");
                let diags = match kind {
                    TypeKind::Resource => {
                        Driver::new(self.resource(&type_name).map_err(invalid)?).validate(&config)
                    }
                    TypeKind::DataSource => {
                        let d = self.data_source(&type_name).map_err(invalid)?;
                        validate_block(&d.schema(), &config)
                    }
                    TypeKind::Ephemeral => {
                        let e = self.ephemeral_resource(&type_name).map_err(invalid)?;
                        validate_block(&e.schema(), &config)
                    }
                };
                Response::diagnostics(diags)
            }
            Request::PlanDiff {
                type_name,
                prior_state,
                config,
            } => {
                let r = self.resource(&type_name).map_err(failed("Invalid type"))?;
                let plan = Driver::new(r).plan(prior_state.as_ref(), &config);
                Response {
                    planned_state: plan.planned_state,
                    requires_replace: Some(plan.requires_replace),
                    changed_paths: Some(plan.changed_paths),
                    diagnostics: plan.diagnostics,
                    ..Response::default()
                }
            }
            Request::Create {
                type_name,
                planned_state,
                private,
                timeouts,
            } => {
                let (driver, meta) = self.driver(&type_name, &timeouts)?;
                let outcome = driver.create(ctx, meta, &planned_state).await;
                with_private(outcome, private)
            }
            Request::Read {
                type_name,
                prior_state,
                private,
                timeouts,
            } => {
                let (driver, meta) = self.driver(&type_name, &timeouts)?;
                let outcome = driver.read(ctx, meta, &prior_state).await;
                with_private(outcome, private)
            }
            Request::Update {
                type_name,
                prior_state,
                planned_state,
                private,
                timeouts,
            } => {
                let (driver, meta) = self.driver(&type_name, &timeouts)?;
                let outcome = driver
                    .update(ctx, meta, &prior_state, &planned_state)
                    .await;
                with_private(outcome, private)
            }
            Request::Delete {
                type_name,
                prior_state,
                timeouts,
            } => {
                let (driver, meta) = self.driver(&type_name, &timeouts)?;
                let outcome = driver.delete(ctx, meta, &prior_state).await;
                Response::state(outcome.new_state, outcome.diagnostics)
            }
            Request::Import {
                type_name,
                id,
                timeouts,
            } => {
                let (driver, meta) = self.driver(&type_name, &timeouts)?;
                let outcome = driver.import(ctx, meta, &id).await;
                Response::state(outcome.new_state, outcome.diagnostics)
            }
            Request::UpgradeState {
                type_name,
                version,
                raw_state,
            } => {
                let summary = format!("Error upgrading state of {type_name}");
                let r = self.resource(&type_name).map_err(failed(&summary))?;
                let upgraded = Driver::new(r)
                    .upgrade(version, &raw_state)
                    .map_err(failed(&summary))?;
                Response {
                    upgraded_state: Some(upgraded),
                    ..Response::default()
                }
            }
            Request::ReadDataSource { type_name, config } => {
                let d = self.data_source(&type_name).map_err(failed("Invalid type"))?;
                let meta = self.meta().map_err(failed("Error reading data source"))?;
                let outcome = read_data_source(d, ctx, meta, &config).await;
                Response {
                    result: outcome.new_state,
                    diagnostics: outcome.diagnostics,
                    ..Response::default()
                }
            }
            Request::OpenEphemeral { type_name, config } => {
                let e = self
                    .ephemeral_resource(&type_name)
                    .map_err(failed("Invalid type"))?;
                let meta = self.meta().map_err(failed("Error opening resource"))?;
                let outcome = open_ephemeral(e, ctx, meta, &config).await;
                Response {
                    result: outcome.new_state,
                    diagnostics: outcome.diagnostics,
                    ..Response::default()
                }
            }
        };
        Ok(resp)
    }

    fn driver(
        &self,
        type_name: &str,
        timeouts: &TimeoutsSpec,
    ) -> std::result::Result<(Driver<'_>, &Meta), (String, ProviderError)> {
        let summary = format!("Error handling {type_name}");
        let resource = self
            .resource(type_name)
            .map_err(|e| (summary.clone(), e))?;
        let meta = self.meta().map_err(|e| (summary.clone(), e))?;
        let driver = Driver::new(resource);
        let timeouts = timeouts
            .apply(driver.schema().timeouts)
            .map_err(|e| (summary, ProviderError::at("timeouts", e)))?;
        Ok((driver.with_timeouts(timeouts), meta))
    }
}

fn with_private(outcome: Outcome, private: Option<Json>) -> Response {
    Response {
        private,
        ..Response::state(outcome.new_state, outcome.diagnostics)
    }
}

fn validate_block(schema: &Schema, config: &Json) -> Diagnostics {
    match schema.block.decode(config, &AttributePath::root()) {
        Ok(obj) => schema.block.validate(&obj, &AttributePath::root()),
        Err(e) => Diagnostic::error("Invalid configuration")
            .with_detail(e.to_string())
            .into(),
    }
}

fn build_meta(config: &Json) -> Result<Meta> {
    let input: ProviderInput = if config.is_null() {
        ProviderInput::default()
    } else {
        serde_json::from_value(config.clone())
            .map_err(|e| ProviderError::invalid("provider", e.to_string()))?
    };
    let resolved = ProviderConfig::load(&input)?;
    let interval = retry_interval_from_env()?;
    if let Some(i) = interval {
        tracing::info!(interval = ?i, "overriding wait retry interval");
    }
    set_retry_interval_override(interval);
    Meta::from_config(&resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_api::fake::FakeCloud;
    use scw_core::{Region, Zone};
    use serde_json::json;

    fn provider() -> Provider {
        let zone: Zone = "fr-par-1".parse().unwrap();
        let region: Region = "fr-par".parse().unwrap();
        Provider::with_meta(Meta::new(Arc::new(FakeCloud::new()), zone, region))
    }

    #[test]
    fn test_catalog_lists_every_kind() {
        let schema = provider().schema();
        assert!(schema["resources"]["scaleway_lb"].is_object());
        assert!(schema["data_sources"]["scaleway_iam_group"].is_object());
        assert!(schema["ephemeral_resources"]["scaleway_iam_api_key"].is_object());
        assert_eq!(schema["resources"]["scaleway_lb"]["version"], json!(1));
    }

    #[tokio::test]
    async fn test_unknown_type_is_a_diagnostic() {
        let resp = provider()
            .handle(
                Request::PlanDiff {
                    type_name: "scaleway_nope".into(),
                    prior_state: None,
                    config: json!({}),
                },
                &Context::background(),
            )
            .await;
        assert!(resp.diagnostics.has_errors());
        assert!(resp.planned_state.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_create_fails() {
        let resp = Provider::new()
            .handle(
                Request::Create {
                    type_name: "scaleway_iam_ssh_key".into(),
                    planned_state: json!({}),
                    private: None,
                    timeouts: TimeoutsSpec::default(),
                },
                &Context::background(),
            )
            .await;
        let detail = &resp.diagnostics.iter().next().unwrap().detail;
        assert!(detail.contains("not configured"), "{detail}");
    }
}
