//! Kubernetes API (`/k8s/v1/regions/{region}`)

use crate::client::ScwClient;
use crate::error::Result;
use crate::iam::ListRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scw_core::{Context, Region, Zone};
use serde::{Deserialize, Serialize};

/// Cluster states a create or update wait stops on
pub const CLUSTER_TERMINAL_STATUSES: &[&str] =
    &["ready", "pool_required", "error", "warning", "locked", "deleted"];

/// Pool states a create or update wait stops on
pub const POOL_TERMINAL_STATUSES: &[&str] = &["ready", "warning"];

#[async_trait]
pub trait K8sApi: Send + Sync {
    async fn create_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        req: &CreateClusterRequest,
    ) -> Result<Cluster>;
    async fn get_cluster(&self, ctx: &Context, region: &Region, id: &str) -> Result<Cluster>;
    async fn update_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdateClusterRequest,
    ) -> Result<Cluster>;
    async fn upgrade_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        version: &str,
    ) -> Result<Cluster>;
    async fn delete_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        with_additional_resources: bool,
    ) -> Result<()>;
    async fn list_clusters(
        &self,
        ctx: &Context,
        region: &Region,
        req: &ListRequest,
    ) -> Result<Vec<Cluster>>;

    async fn create_pool(
        &self,
        ctx: &Context,
        region: &Region,
        cluster_id: &str,
        req: &CreatePoolRequest,
    ) -> Result<Pool>;
    async fn get_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<Pool>;
    async fn update_pool(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdatePoolRequest,
    ) -> Result<Pool>;
    async fn delete_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<()>;
}

fn base(region: &Region) -> String {
    format!("/k8s/v1/regions/{region}")
}

#[async_trait]
impl K8sApi for ScwClient {
    async fn create_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        req: &CreateClusterRequest,
    ) -> Result<Cluster> {
        self.post(ctx, &format!("{}/clusters", base(region)), req)
            .await
    }

    async fn get_cluster(&self, ctx: &Context, region: &Region, id: &str) -> Result<Cluster> {
        self.get(ctx, &format!("{}/clusters/{id}", base(region)), &[])
            .await
    }

    async fn update_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdateClusterRequest,
    ) -> Result<Cluster> {
        self.patch(ctx, &format!("{}/clusters/{id}", base(region)), req)
            .await
    }

    async fn upgrade_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        version: &str,
    ) -> Result<Cluster> {
        self.post(
            ctx,
            &format!("{}/clusters/{id}/upgrade", base(region)),
            &serde_json::json!({ "version": version, "upgrade_pools": true }),
        )
        .await
    }

    async fn delete_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        with_additional_resources: bool,
    ) -> Result<()> {
        self.delete(
            ctx,
            &format!("{}/clusters/{id}", base(region)),
            &[(
                "with_additional_resources",
                with_additional_resources.to_string(),
            )],
        )
        .await
    }

    async fn list_clusters(
        &self,
        ctx: &Context,
        region: &Region,
        req: &ListRequest,
    ) -> Result<Vec<Cluster>> {
        self.list_all(
            ctx,
            &format!("{}/clusters", base(region)),
            &req.query(),
            |p: ListClustersResponse| (p.clusters, p.total_count),
        )
        .await
    }

    async fn create_pool(
        &self,
        ctx: &Context,
        region: &Region,
        cluster_id: &str,
        req: &CreatePoolRequest,
    ) -> Result<Pool> {
        self.post(
            ctx,
            &format!("{}/clusters/{cluster_id}/pools", base(region)),
            req,
        )
        .await
    }

    async fn get_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<Pool> {
        self.get(ctx, &format!("{}/pools/{id}", base(region)), &[])
            .await
    }

    async fn update_pool(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdatePoolRequest,
    ) -> Result<Pool> {
        self.patch(ctx, &format!("{}/pools/{id}", base(region)), req)
            .await
    }

    async fn delete_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{}/pools/{id}", base(region)), &[])
            .await
    }
}

// ============ API Types ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub region: Region,
    pub organization_id: String,
    pub project_id: String,
    pub version: String,
    pub cni: String,
    pub status: String,
    #[serde(rename = "type", default)]
    pub cluster_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub private_network_id: Option<String>,
    #[serde(default)]
    pub cluster_url: String,
    #[serde(default)]
    pub wildcard_dns: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateClusterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub version: String,
    pub cni: String,
    pub tags: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateClusterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<Cluster>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub node_type: String,
    pub size: u32,
    #[serde(default)]
    pub min_size: u32,
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub autoscaling: bool,
    #[serde(default)]
    pub autohealing: bool,
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub zone: Zone,
    pub region: Region,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePoolRequest {
    pub name: String,
    pub node_type: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    pub autoscaling: bool,
    pub autohealing: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePoolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autohealing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_pool_body_only_changed() {
        let req = UpdatePoolRequest {
            size: Some(3),
            ..UpdatePoolRequest::default()
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"size": 3})
        );
    }

    #[test]
    fn test_cluster_decode() {
        let raw = serde_json::json!({
            "id": "c1",
            "name": "k",
            "region": "fr-par",
            "organization_id": "o",
            "project_id": "p",
            "version": "1.31.2",
            "cni": "cilium",
            "status": "ready",
            "created_at": "2025-07-06T09:00:00Z",
        });
        let cluster: Cluster = serde_json::from_value(raw).unwrap();
        assert_eq!(cluster.region.as_str(), "fr-par");
        assert!(cluster.private_network_id.is_none());
    }
}
