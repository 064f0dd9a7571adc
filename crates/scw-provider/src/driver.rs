//! Resource lifecycle driver
//!
//! Turns host requests into calls on a [`Resource`]: decodes state trees
//! against the schema, derives change sets, runs each phase under its own
//! timeout, re-reads after create and update, absorbs not-found on read and
//! delete, and redacts sensitive values from every diagnostic.

use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{DataSource, EphemeralResource, Resource, ResourceData};
use scw_core::{
    AttributePath, ChangeSet, Classify, Context, Diagnostic, Diagnostics, Object, Schema, Timeouts,
    Value, plan_diff,
};
use serde_json::Value as Json;

/// New state (`None` once the object is gone) plus diagnostics
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub new_state: Option<Json>,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    fn failed(summary: &str, err: &ProviderError, state: Option<Json>) -> Self {
        Self {
            new_state: state,
            diagnostics: err.to_diagnostic(summary).into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub planned_state: Option<Json>,
    pub requires_replace: Vec<String>,
    pub changed_paths: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Encode a state tree for the host, `id` first-class
pub fn encode_state(id: Option<&str>, state: &Object) -> Json {
    let mut out = serde_json::Map::new();
    out.insert(
        "id".to_string(),
        id.map(|s| Json::String(s.to_string())).unwrap_or(Json::Null),
    );
    for (k, v) in state {
        out.insert(k.clone(), v.to_json());
    }
    Json::Object(out)
}

fn decode_state(schema: &Schema, json: &Json) -> Result<(Option<String>, Object)> {
    let id = json
        .get("id")
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let state = schema.block.decode(json, &AttributePath::root())?;
    Ok((id, state))
}

fn null_state(schema: &Schema) -> Object {
    schema
        .block
        .attributes
        .keys()
        .map(|k| ((*k).to_string(), Value::Null))
        .collect()
}

pub struct Driver<'a> {
    resource: &'a dyn Resource,
    schema: Schema,
    timeouts: Timeouts,
}

impl<'a> Driver<'a> {
    pub fn new(resource: &'a dyn Resource) -> Self {
        let schema = resource.schema();
        let timeouts = schema.timeouts;
        Self {
            resource,
            schema,
            timeouts,
        }
    }

    /// Override the declared timeouts for this request
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    fn encode(&self, d: &ResourceData) -> Option<Json> {
        d.id().map(|id| encode_state(Some(id), d.state()))
    }

    fn redact(&self, meta: Option<&Meta>, states: &[&Object], diags: &mut Diagnostics) {
        let mut secrets: Vec<String> = states
            .iter()
            .flat_map(|s| self.schema.block.sensitive_values(s))
            .collect();
        if let Some(meta) = meta {
            secrets.extend(meta.secrets().iter().cloned());
        }
        diags.redact(&secrets);
    }

    pub fn validate(&self, config: &Json) -> Diagnostics {
        let config = match self.schema.block.decode(config, &AttributePath::root()) {
            Ok(c) => c,
            Err(e) => return Diagnostic::error("Invalid configuration").with_detail(e.to_string()).into(),
        };
        let mut diags = self.schema.block.validate(&config, &AttributePath::root());
        diags.extend(self.resource.validate(&config));
        self.redact(None, &[&config], &mut diags);
        diags
    }

    pub fn plan(&self, prior: Option<&Json>, config: &Json) -> PlanOutcome {
        let decoded = decode_state(&self.schema, config).and_then(|(_, c)| {
            let prior = match prior.filter(|p| !p.is_null()) {
                Some(p) => Some(decode_state(&self.schema, p)?),
                None => None,
            };
            Ok((c, prior))
        });
        let (config, prior) = match decoded {
            Ok(v) => v,
            Err(e) => {
                return PlanOutcome {
                    diagnostics: e.to_diagnostic("Invalid plan input").into(),
                    ..PlanOutcome::default()
                };
            }
        };
        let (id, prior_state) = match &prior {
            Some((Some(id), state)) => (Some(id.as_str()), Some(state)),
            _ => (None, None),
        };
        let diff = plan_diff(&self.schema.block, prior_state, &config);
        tracing::debug!(
            resource = self.type_name(),
            changes = diff.changes.len(),
            replace = diff.requires_replace.len(),
            "planned"
        );
        PlanOutcome {
            planned_state: Some(encode_state(id, &diff.planned)),
            requires_replace: diff.requires_replace.iter().map(ToString::to_string).collect(),
            changed_paths: diff.changes.names().map(str::to_string).collect(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub async fn create(&self, ctx: &Context, meta: &Meta, planned: &Json) -> Outcome {
        let summary = format!("Error creating {}", self.type_name());
        let state = match decode_state(&self.schema, planned) {
            Ok((_, s)) => s,
            Err(e) => return Outcome::failed(&summary, &e, None),
        };
        let ctx = ctx.with_timeout(self.timeouts.create);
        let changes = ChangeSet::between(&self.schema.block, &Object::new(), &state);
        let mut d = ResourceData::new(None, state.clone())
            .with_changes(changes)
            .with_timeout(self.timeouts.create);

        tracing::info!(resource = self.type_name(), "creating");
        let result = match self.resource.create(&ctx, meta, &mut d).await {
            Ok(()) => self.refresh_after_write(&ctx, meta, &mut d).await,
            Err(e) => Err(e),
        };
        self.finish(meta, &summary, d, result, &[&state])
    }

    async fn refresh_after_write(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        if d.id().is_none() {
            return Err(ProviderError::InvalidState(format!(
                "{} returned no id",
                self.type_name()
            )));
        }
        self.resource.read(ctx, meta, d).await?;
        if d.id().is_none() {
            return Err(ProviderError::InvalidState(format!(
                "{} disappeared right after being written",
                self.type_name()
            )));
        }
        Ok(())
    }

    fn finish(
        &self,
        meta: &Meta,
        summary: &str,
        d: ResourceData,
        result: Result<()>,
        inputs: &[&Object],
    ) -> Outcome {
        let new_state = self.encode(&d);
        let (_, state, mut diagnostics) = d.into_parts();
        if let Err(e) = &result {
            tracing::warn!(resource = self.type_name(), error = %e, "{summary}");
            diagnostics.push(e.to_diagnostic(summary));
        } else {
            tracing::info!(resource = self.type_name(), "done");
        }
        let mut all: Vec<&Object> = inputs.to_vec();
        all.push(&state);
        self.redact(Some(meta), &all, &mut diagnostics);
        Outcome {
            new_state,
            diagnostics,
        }
    }

    pub async fn read(&self, ctx: &Context, meta: &Meta, prior: &Json) -> Outcome {
        let summary = format!("Error reading {}", self.type_name());
        let (id, state) = match decode_state(&self.schema, prior) {
            Ok(v) => v,
            Err(e) => return Outcome::failed(&summary, &e, Some(prior.clone())),
        };
        if id.is_none() {
            return Outcome::default();
        }
        let ctx = ctx.with_timeout(self.timeouts.read);
        let mut d = ResourceData::new(id, state.clone()).with_timeout(self.timeouts.read);
        match self.resource.read(&ctx, meta, &mut d).await {
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = self.type_name(), "not found, removing from state");
                Outcome::default()
            }
            Err(e) => {
                let mut out = Outcome::failed(&summary, &e, Some(prior.clone()));
                self.redact(Some(meta), &[&state], &mut out.diagnostics);
                out
            }
            Ok(()) if d.id().is_none() => {
                tracing::warn!(resource = self.type_name(), "gone remotely, removing from state");
                Outcome::default()
            }
            Ok(()) => self.finish(meta, &summary, d, Ok(()), &[&state]),
        }
    }

    pub async fn update(&self, ctx: &Context, meta: &Meta, prior: &Json, planned: &Json) -> Outcome {
        let summary = format!("Error updating {}", self.type_name());
        let decoded = decode_state(&self.schema, prior)
            .and_then(|p| Ok((p, decode_state(&self.schema, planned)?.1)));
        let ((id, prior_state), planned_state) = match decoded {
            Ok(v) => v,
            Err(e) => return Outcome::failed(&summary, &e, Some(prior.clone())),
        };
        let Some(id) = id else {
            let err = ProviderError::InvalidState("update without an id".to_string());
            return Outcome::failed(&summary, &err, None);
        };

        let changes = ChangeSet::between(&self.schema.block, &prior_state, &planned_state);
        if changes.is_empty() {
            tracing::debug!(resource = self.type_name(), %id, "no change, skipping update");
            return Outcome {
                new_state: Some(encode_state(Some(&id), &planned_state)),
                diagnostics: Diagnostics::new(),
            };
        }

        let ctx = ctx.with_timeout(self.timeouts.update);
        let mut d = ResourceData::new(Some(id), planned_state.clone())
            .with_changes(changes)
            .with_timeout(self.timeouts.update);
        tracing::info!(resource = self.type_name(), id = ?d.id(), "updating");
        if let Err(e) = self.resource.update(&ctx, meta, &mut d).await {
            let mut out = Outcome::failed(&summary, &e, Some(prior.clone()));
            self.redact(Some(meta), &[&prior_state, &planned_state], &mut out.diagnostics);
            return out;
        }
        let result = self.refresh_after_write(&ctx, meta, &mut d).await;
        self.finish(meta, &summary, d, result, &[&prior_state, &planned_state])
    }

    pub async fn delete(&self, ctx: &Context, meta: &Meta, prior: &Json) -> Outcome {
        let summary = format!("Error deleting {}", self.type_name());
        let (id, state) = match decode_state(&self.schema, prior) {
            Ok(v) => v,
            Err(e) => return Outcome::failed(&summary, &e, Some(prior.clone())),
        };
        if id.is_none() {
            return Outcome::default();
        }
        let ctx = ctx.with_timeout(self.timeouts.delete);
        let mut d = ResourceData::new(id, state.clone()).with_timeout(self.timeouts.delete);
        tracing::info!(resource = self.type_name(), id = ?d.id(), "deleting");
        match self.resource.delete(&ctx, meta, &mut d).await {
            Ok(()) => Outcome::default(),
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = self.type_name(), "already deleted");
                Outcome::default()
            }
            Err(e) => {
                let mut out = Outcome::failed(&summary, &e, Some(prior.clone()));
                self.redact(Some(meta), &[&state], &mut out.diagnostics);
                out
            }
        }
    }

    pub async fn import(&self, ctx: &Context, meta: &Meta, raw_id: &str) -> Outcome {
        let summary = format!("Error importing {}", self.type_name());
        let id = match self.resource.import_id(raw_id) {
            Ok(id) => id,
            Err(e) => return Outcome::failed(&summary, &e, None),
        };
        let ctx = ctx.with_timeout(self.timeouts.read);
        let mut d =
            ResourceData::new(Some(id.clone()), null_state(&self.schema)).with_timeout(self.timeouts.read);
        let result = match self.resource.read(&ctx, meta, &mut d).await {
            Ok(()) if d.id().is_none() => Err(ProviderError::invalid(
                AttributePath::root(),
                format!("cannot import non-existent remote object {id}"),
            )),
            Err(e) if e.is_not_found() => Err(ProviderError::invalid(
                AttributePath::root(),
                format!("cannot import non-existent remote object {id}"),
            )),
            other => other,
        };
        if result.is_err() {
            d.clear_id();
        }
        self.finish(meta, &summary, d, result, &[])
    }

    /// Run the migration chain from `version` to the current schema version
    pub fn upgrade(&self, version: u32, raw: &Json) -> Result<Json> {
        let current = self.schema.version;
        if version > current {
            return Err(ProviderError::InvalidState(format!(
                "state version {version} is newer than schema version {current}"
            )));
        }
        let mut state = raw
            .as_object()
            .cloned()
            .ok_or_else(|| ProviderError::InvalidState("state is not an object".to_string()))?;
        for v in version..current {
            tracing::info!(resource = self.type_name(), from = v, to = v + 1, "upgrading state");
            state = self.resource.upgrade(v, state)?;
        }
        let upgraded = Json::Object(state);
        decode_state(&self.schema, &upgraded)?;
        Ok(upgraded)
    }
}

/// Look up a data source and encode its result
pub async fn read_data_source(
    source: &dyn DataSource,
    ctx: &Context,
    meta: &Meta,
    config: &Json,
) -> Outcome {
    let summary = format!("Error reading data source {}", source.type_name());
    let schema = source.schema();
    let state = match schema.block.decode(config, &AttributePath::root()) {
        Ok(s) => s,
        Err(e) => return Outcome::failed(&summary, &ProviderError::from(e), None),
    };
    let diags = schema.block.validate(&state, &AttributePath::root());
    if diags.has_errors() {
        return Outcome {
            new_state: None,
            diagnostics: diags,
        };
    }
    let ctx = ctx.with_timeout(schema.timeouts.read);
    let mut d = ResourceData::new(None, state).with_timeout(schema.timeouts.read);
    let result = source.read(&ctx, meta, &mut d).await;
    let new_state = result.as_ref().ok().map(|_| encode_state(d.id(), d.state()));
    let (_, state, mut diagnostics) = d.into_parts();
    if let Err(e) = result {
        diagnostics.push(e.to_diagnostic(&summary));
    }
    let mut secrets = schema.block.sensitive_values(&state);
    secrets.extend(meta.secrets().iter().cloned());
    diagnostics.redact(&secrets);
    Outcome {
        new_state,
        diagnostics,
    }
}

/// Mint an ephemeral value; a fresh one on every call
pub async fn open_ephemeral(
    resource: &dyn EphemeralResource,
    ctx: &Context,
    meta: &Meta,
    config: &Json,
) -> Outcome {
    let summary = format!("Error opening {}", resource.type_name());
    let schema = resource.schema();
    let state = match schema.block.decode(config, &AttributePath::root()) {
        Ok(s) => s,
        Err(e) => return Outcome::failed(&summary, &ProviderError::from(e), None),
    };
    let diags = schema.block.validate(&state, &AttributePath::root());
    if diags.has_errors() {
        return Outcome {
            new_state: None,
            diagnostics: diags,
        };
    }
    let ctx = ctx.with_timeout(schema.timeouts.create);
    let mut d = ResourceData::new(None, state).with_timeout(schema.timeouts.create);
    let result = resource.open(&ctx, meta, &mut d).await;
    let new_state = result.as_ref().ok().map(|_| encode_state(d.id(), d.state()));
    let (_, state, mut diagnostics) = d.into_parts();
    if let Err(e) = result {
        diagnostics.push(e.to_diagnostic(&summary));
    }
    let mut secrets = schema.block.sensitive_values(&state);
    secrets.extend(meta.secrets().iter().cloned());
    diagnostics.redact(&secrets);
    Outcome {
        new_state,
        diagnostics,
    }
}
