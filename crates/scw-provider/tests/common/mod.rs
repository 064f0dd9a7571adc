use scw_api::fake::{FAKE_ORGANIZATION_ID, FAKE_PROJECT_ID, FakeCloud};
use scw_core::waiter::set_retry_interval_override;
use scw_core::{Context, Region, Zone};
use scw_provider::protocol::TimeoutsSpec;
use scw_provider::{Meta, Provider, Request, Response};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;

pub const USER_A: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
pub const USER_B: &str = "bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb";
#[allow(dead_code)]
pub const USER_C: &str = "cccccccc-cccc-4ccc-8ccc-cccccccccccc";

#[allow(dead_code)]
pub const PN_1: &str = "55555555-5555-4555-8555-555555555555";
#[allow(dead_code)]
pub const PN_2: &str = "66666666-6666-4666-8666-666666666666";

#[allow(dead_code)]
pub const KEY_1: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8g";
#[allow(dead_code)]
pub const KEY_2: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAICEiIyQlJicoKSorLC0uLzAxMjM0NTY3ODk6Ozw9Pj9A";

/// A configured provider over an in-memory cloud
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub provider: Provider,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cloud(FakeCloud::new())
    }

    pub fn with_cloud(cloud: FakeCloud) -> Self {
        set_retry_interval_override(Some(Duration::from_millis(1)));
        let cloud = Arc::new(cloud);
        let zone: Zone = "fr-par-1".parse().unwrap();
        let region: Region = "fr-par".parse().unwrap();
        let meta = Meta::new(cloud.clone(), zone, region)
            .with_project_id(FAKE_PROJECT_ID)
            .with_organization_id(FAKE_ORGANIZATION_ID);
        Self {
            cloud,
            provider: Provider::with_meta(meta),
            ctx: Context::background(),
        }
    }

    pub async fn call(&self, request: Request) -> Response {
        self.provider.handle(request, &self.ctx).await
    }

    /// Create and return the new state, failing on any error diagnostic
    pub async fn create(&self, type_name: &str, config: Json) -> Json {
        let resp = self.create_raw(type_name, config).await;
        assert!(
            !resp.diagnostics.has_errors(),
            "create {type_name}: {:?}",
            resp.diagnostics
        );
        resp.new_state.unwrap()
    }

    pub async fn create_raw(&self, type_name: &str, config: Json) -> Response {
        let planned = self.plan(type_name, None, &config).await;
        self.call(Request::Create {
            type_name: type_name.to_string(),
            planned_state: planned.planned_state.unwrap(),
            private: None,
            timeouts: TimeoutsSpec::default(),
        })
        .await
    }

    pub async fn read(&self, type_name: &str, state: &Json) -> Response {
        self.call(Request::Read {
            type_name: type_name.to_string(),
            prior_state: state.clone(),
            private: None,
            timeouts: TimeoutsSpec::default(),
        })
        .await
    }

    pub async fn plan(&self, type_name: &str, prior: Option<&Json>, config: &Json) -> Response {
        self.call(Request::PlanDiff {
            type_name: type_name.to_string(),
            prior_state: prior.cloned(),
            config: config.clone(),
        })
        .await
    }

    /// Plan `config` over `prior` and apply it
    #[allow(dead_code)]
    pub async fn update(&self, type_name: &str, prior: &Json, config: &Json) -> Response {
        let planned = self.plan(type_name, Some(prior), config).await;
        assert!(planned.requires_replace.as_ref().unwrap().is_empty());
        self.update_to(type_name, prior, planned.planned_state.unwrap())
            .await
    }

    #[allow(dead_code)]
    pub async fn update_to(&self, type_name: &str, prior: &Json, planned: Json) -> Response {
        self.call(Request::Update {
            type_name: type_name.to_string(),
            prior_state: prior.clone(),
            planned_state: planned,
            private: None,
            timeouts: TimeoutsSpec::default(),
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, type_name: &str, state: &Json) -> Response {
        self.call(Request::Delete {
            type_name: type_name.to_string(),
            prior_state: state.clone(),
            timeouts: TimeoutsSpec::default(),
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn lookup(&self, type_name: &str, config: Json) -> Response {
        self.call(Request::ReadDataSource {
            type_name: type_name.to_string(),
            config,
        })
        .await
    }

    /// Calls recorded by the cloud whose name starts with `prefix`
    #[allow(dead_code)]
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.cloud
            .calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}
