//! Load Balancer API (`/lb/v1/zones/{zone}`)

use crate::client::ScwClient;
use crate::error::Result;
use crate::iam::ListRequest;
use crate::wire::duration_opt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scw_core::{Context, Zone};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const LB_STATUS_READY: &str = "ready";
pub const LB_STATUS_ERROR: &str = "error";
pub const PN_STATUS_READY: &str = "ready";
pub const PN_STATUS_ERROR: &str = "error";
pub const CERT_STATUS_PENDING: &str = "pending";
pub const CERT_STATUS_ERROR: &str = "error";

#[async_trait]
pub trait LbApi: Send + Sync {
    async fn create_lb(&self, ctx: &Context, zone: &Zone, req: &CreateLbRequest) -> Result<Lb>;
    async fn get_lb(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Lb>;
    async fn update_lb(&self, ctx: &Context, zone: &Zone, id: &str, req: &UpdateLbRequest)
    -> Result<Lb>;
    async fn delete_lb(&self, ctx: &Context, zone: &Zone, id: &str, release_ip: bool)
    -> Result<()>;
    async fn list_lbs(&self, ctx: &Context, zone: &Zone, req: &ListRequest) -> Result<Vec<Lb>>;

    async fn list_lb_private_networks(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
    ) -> Result<Vec<LbPrivateNetwork>>;
    async fn attach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &AttachPrivateNetworkRequest,
    ) -> Result<LbPrivateNetwork>;
    async fn detach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        private_network_id: &str,
    ) -> Result<()>;

    async fn create_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &BackendSpec,
    ) -> Result<Backend>;
    async fn get_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Backend>;
    async fn update_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        req: &BackendSpec,
    ) -> Result<Backend>;
    async fn update_health_check(
        &self,
        ctx: &Context,
        zone: &Zone,
        backend_id: &str,
        req: &HealthCheck,
    ) -> Result<HealthCheck>;
    async fn delete_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()>;

    async fn create_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &CreateCertificateRequest,
    ) -> Result<Certificate>;
    async fn get_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Certificate>;
    async fn update_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        name: &str,
    ) -> Result<Certificate>;
    async fn delete_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()>;
}

fn base(zone: &Zone) -> String {
    format!("/lb/v1/zones/{zone}")
}

#[async_trait]
impl LbApi for ScwClient {
    async fn create_lb(&self, ctx: &Context, zone: &Zone, req: &CreateLbRequest) -> Result<Lb> {
        self.post(ctx, &format!("{}/lbs", base(zone)), req).await
    }

    async fn get_lb(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Lb> {
        self.get(ctx, &format!("{}/lbs/{id}", base(zone)), &[]).await
    }

    async fn update_lb(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        req: &UpdateLbRequest,
    ) -> Result<Lb> {
        self.put(ctx, &format!("{}/lbs/{id}", base(zone)), req).await
    }

    async fn delete_lb(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        release_ip: bool,
    ) -> Result<()> {
        self.delete(
            ctx,
            &format!("{}/lbs/{id}", base(zone)),
            &[("release_ip", release_ip.to_string())],
        )
        .await
    }

    async fn list_lbs(&self, ctx: &Context, zone: &Zone, req: &ListRequest) -> Result<Vec<Lb>> {
        self.list_all(
            ctx,
            &format!("{}/lbs", base(zone)),
            &req.query(),
            |p: ListLbsResponse| (p.lbs, p.total_count),
        )
        .await
    }

    async fn list_lb_private_networks(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
    ) -> Result<Vec<LbPrivateNetwork>> {
        self.list_all(
            ctx,
            &format!("{}/lbs/{lb_id}/private-networks", base(zone)),
            &[],
            |p: ListLbPrivateNetworksResponse| (p.private_network, p.total_count),
        )
        .await
    }

    async fn attach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &AttachPrivateNetworkRequest,
    ) -> Result<LbPrivateNetwork> {
        self.post(
            ctx,
            &format!("{}/lbs/{lb_id}/attach-private-network", base(zone)),
            req,
        )
        .await
    }

    async fn detach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        private_network_id: &str,
    ) -> Result<()> {
        self.post_empty(
            ctx,
            &format!("{}/lbs/{lb_id}/detach-private-network", base(zone)),
            &serde_json::json!({ "private_network_id": private_network_id }),
        )
        .await
    }

    async fn create_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &BackendSpec,
    ) -> Result<Backend> {
        self.post(ctx, &format!("{}/lbs/{lb_id}/backends", base(zone)), req)
            .await
    }

    async fn get_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Backend> {
        self.get(ctx, &format!("{}/backends/{id}", base(zone)), &[])
            .await
    }

    async fn update_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        req: &BackendSpec,
    ) -> Result<Backend> {
        self.put(ctx, &format!("{}/backends/{id}", base(zone)), req)
            .await
    }

    async fn update_health_check(
        &self,
        ctx: &Context,
        zone: &Zone,
        backend_id: &str,
        req: &HealthCheck,
    ) -> Result<HealthCheck> {
        self.put(
            ctx,
            &format!("{}/backends/{backend_id}/healthcheck", base(zone)),
            req,
        )
        .await
    }

    async fn delete_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{}/backends/{id}", base(zone)), &[])
            .await
    }

    async fn create_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &CreateCertificateRequest,
    ) -> Result<Certificate> {
        self.post(ctx, &format!("{}/lbs/{lb_id}/certificates", base(zone)), req)
            .await
    }

    async fn get_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Certificate> {
        self.get(ctx, &format!("{}/certificates/{id}", base(zone)), &[])
            .await
    }

    async fn update_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        name: &str,
    ) -> Result<Certificate> {
        self.put(
            ctx,
            &format!("{}/certificates/{id}", base(zone)),
            &serde_json::json!({ "name": name }),
        )
        .await
    }

    async fn delete_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{}/certificates/{id}", base(zone)), &[])
            .await
    }
}

// ============ API Types ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lb {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    pub zone: Zone,
    pub organization_id: String,
    pub project_id: String,
    #[serde(default)]
    pub ip: Vec<LbIp>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(default)]
    pub ssl_compatibility_level: String,
    #[serde(default)]
    pub private_network_count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbIp {
    pub id: String,
    pub ip_address: String,
    pub lb_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateLbRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_flexible_ip: Option<bool>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateLbRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListLbsResponse {
    #[serde(default)]
    lbs: Vec<Lb>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub ip_address: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DhcpConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbPrivateNetwork {
    pub private_network_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_config: Option<StaticConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_config: Option<DhcpConfig>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LbPrivateNetwork {
    /// Static addresses, empty under DHCP
    pub fn static_ips(&self) -> &[String] {
        self.static_config
            .as_ref()
            .map(|c| c.ip_address.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AttachPrivateNetworkRequest {
    pub private_network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_config: Option<StaticConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_config: Option<DhcpConfig>,
}

#[derive(Debug, Deserialize)]
struct ListLbPrivateNetworksResponse {
    #[serde(default)]
    private_network: Vec<LbPrivateNetwork>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpHealthCheck {
    pub uri: String,
    #[serde(default)]
    pub method: String,
    pub code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    pub port: i32,
    #[serde(default, with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub check_delay: Option<Duration>,
    #[serde(default, with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub check_timeout: Option<Duration>,
    #[serde(default)]
    pub check_max_retries: i32,
    #[serde(default)]
    pub check_send_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpHealthCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub id: String,
    pub lb_id: String,
    pub name: String,
    pub forward_protocol: String,
    pub forward_port: i32,
    pub forward_port_algorithm: String,
    #[serde(default)]
    pub sticky_sessions: String,
    #[serde(default)]
    pub sticky_sessions_cookie_name: String,
    #[serde(default)]
    pub server_ip: Vec<String>,
    #[serde(default, with = "duration_opt")]
    pub timeout_server: Option<Duration>,
    #[serde(default, with = "duration_opt")]
    pub timeout_connect: Option<Duration>,
    #[serde(default, with = "duration_opt")]
    pub timeout_tunnel: Option<Duration>,
    #[serde(default)]
    pub on_marked_down_action: String,
    #[serde(default)]
    pub proxy_protocol: String,
    /// Echoed by the API, derived from `proxy_protocol`
    #[serde(default)]
    pub send_proxy_v2: bool,
    #[serde(default)]
    pub health_check: HealthCheck,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of backend create (with health check) and update (without)
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BackendSpec {
    pub name: String,
    pub forward_protocol: String,
    pub forward_port: i32,
    pub forward_port_algorithm: String,
    pub sticky_sessions: String,
    pub sticky_sessions_cookie_name: String,
    pub server_ip: Vec<String>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub timeout_server: Option<Duration>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub timeout_connect: Option<Duration>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub timeout_tunnel: Option<Duration>,
    pub on_marked_down_action: String,
    pub proxy_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LetsEncryptConfig {
    pub common_name: String,
    #[serde(default)]
    pub subject_alternative_name: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomCertificateConfig {
    pub certificate_chain: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateCertificateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letsencrypt: Option<LetsEncryptConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_certificate: Option<CustomCertificateConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub lb_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub certificate_type: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub subject_alternative_name: Vec<String>,
    #[serde(default)]
    pub fingerprint: String,
    pub not_valid_before: Option<DateTime<Utc>>,
    pub not_valid_after: Option<DateTime<Utc>>,
    pub status: String,
    pub status_details: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
