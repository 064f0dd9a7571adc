//! Provider meta
//!
//! Built once by `ConfigureProvider` and shared read-only by every request:
//! the API handles and the provider-level locality and project defaults.

use crate::error::Result;
use crate::resource::ResourceData;
use scw_api::{ClientConfig, CloudApi, IamApi, K8sApi, LbApi, ScwClient};
use scw_config::ProviderConfig;
use scw_core::{Region, Zone};
use std::fmt;
use std::sync::Arc;

const USER_AGENT: &str = concat!("scw-provider/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct Meta {
    iam: Arc<dyn IamApi>,
    lb: Arc<dyn LbApi>,
    k8s: Arc<dyn K8sApi>,
    zone: Zone,
    region: Region,
    project_id: Option<String>,
    organization_id: Option<String>,
    secrets: Vec<String>,
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("zone", &self.zone)
            .field("region", &self.region)
            .field("project_id", &self.project_id)
            .field("organization_id", &self.organization_id)
            .finish_non_exhaustive()
    }
}

impl Meta {
    pub fn new<A: CloudApi + 'static>(api: Arc<A>, zone: Zone, region: Region) -> Self {
        Self {
            iam: api.clone(),
            lb: api.clone(),
            k8s: api,
            zone,
            region,
            project_id: None,
            organization_id: None,
            secrets: Vec::new(),
        }
    }

    /// HTTP-backed meta from a resolved provider configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let (access_key, secret_key) = config.credentials()?;
        let client = ScwClient::new(ClientConfig {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            api_url: config.api_url.clone(),
            user_agent: USER_AGENT.to_string(),
        })?;
        tracing::info!(
            zone = %config.zone,
            region = %config.region,
            profile = %config.profile,
            "provider configured"
        );
        let mut meta = Self::new(Arc::new(client), config.zone.clone(), config.region.clone());
        meta.project_id = config.project_id.clone();
        meta.organization_id = config.organization_id.clone();
        meta.secrets = vec![secret_key.to_string()];
        Ok(meta)
    }

    pub fn with_project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    pub fn with_organization_id(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }

    pub fn iam(&self) -> &dyn IamApi {
        self.iam.as_ref()
    }

    pub fn lb(&self) -> &dyn LbApi {
        self.lb.as_ref()
    }

    pub fn k8s(&self) -> &dyn K8sApi {
        self.k8s.as_ref()
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Values that must never reach a diagnostic
    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }

    /// The resource's `zone` attribute, else the provider default
    pub fn zone_of(&self, d: &ResourceData) -> Result<Zone> {
        match d.get_str("zone") {
            "" => Ok(self.zone.clone()),
            z => Ok(z.parse()?),
        }
    }

    /// The resource's `region` attribute, else the provider default
    pub fn region_of(&self, d: &ResourceData) -> Result<Region> {
        match d.get_str("region") {
            "" => Ok(self.region.clone()),
            r => Ok(r.parse()?),
        }
    }

    /// Project id set on the resource wins over the provider default
    pub fn project_of(&self, d: &ResourceData, attr: &str) -> Option<String> {
        match d.get_str(attr) {
            "" => self.project_id.clone(),
            p => Some(p.to_string()),
        }
    }

    pub fn organization_of(&self, d: &ResourceData) -> Option<String> {
        match d.get_str("organization_id") {
            "" => self.organization_id.clone(),
            o => Some(o.to_string()),
        }
    }
}
