//! `scaleway_k8s_cluster`
//!
//! Every write waits for the cluster to reach a terminal status. Deletion can
//! also remove the volumes and load balancers the cluster created.

use super::{regional_id, set_timestamps, wait_gone, wait_options, wait_status};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::k8s::{CLUSTER_TERMINAL_STATUSES, CreateClusterRequest, UpdateClusterRequest};
use scw_core::convert::{
    expand_id_ptr, expand_string, expand_string_ptr, expand_strings, expand_updated_string_ptr,
    expand_updated_strings_ptr, flatten_string_ptr, flatten_strings,
};
use scw_core::diff::{suppress_case_insensitive, suppress_locality};
use scw_core::waiter::{SLOW_RETRY_INTERVAL, WaitOptions};
use scw_core::{Attribute, Block, Context, Region, RegionalId, Schema, Type};

pub struct K8sCluster;

const FAILED_STATUSES: &[&str] = &["error", "locked"];

async fn wait_cluster(
    ctx: &Context,
    meta: &Meta,
    region: &Region,
    id: &str,
    opts: WaitOptions,
) -> Result<()> {
    let cluster = wait_status(
        ctx,
        &format!("cluster {id}"),
        opts,
        CLUSTER_TERMINAL_STATUSES,
        || meta.k8s().get_cluster(ctx, region, id),
    )
    .await?;
    if FAILED_STATUSES.contains(&cluster.status.as_str()) {
        return Err(ProviderError::InvalidState(format!(
            "cluster {id} is in status {}",
            cluster.status
        )));
    }
    Ok(())
}

#[async_trait]
impl Resource for K8sCluster {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_cluster"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr("name", Attribute::optional_computed(Type::String))
                .attr("description", Attribute::optional(Type::String))
                .attr(
                    "type",
                    Attribute::optional_computed(Type::String)
                        .force_new()
                        .diff_suppress(suppress_case_insensitive)
                        .description("Offer, e.g. kapsule or multicloud"),
                )
                .attr(
                    "version",
                    Attribute::required(Type::String)
                        .description("Kubernetes version; a change upgrades in place"),
                )
                .attr(
                    "cni",
                    Attribute::required(Type::String)
                        .force_new()
                        .one_of(&["cilium", "calico", "kilo", "none"]),
                )
                .attr("tags", Attribute::optional(Type::list(Type::String)))
                .attr(
                    "private_network_id",
                    Attribute::optional_computed(Type::Uuid)
                        .force_new()
                        .diff_suppress(suppress_locality),
                )
                .attr(
                    "delete_additional_resources",
                    Attribute::optional(Type::Bool)
                        .default(false)
                        .description("Delete volumes and load balancers created by the cluster"),
                )
                .attr(
                    "region",
                    Attribute::optional_computed(Type::String).force_new(),
                )
                .attr(
                    "project_id",
                    Attribute::optional_computed(Type::Uuid).force_new(),
                )
                .attr("organization_id", Attribute::computed(Type::String))
                .attr("status", Attribute::computed(Type::String))
                .attr("apiserver_url", Attribute::computed(Type::String))
                .attr("wildcard_dns", Attribute::computed(Type::String))
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("Kubernetes cluster")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let region = meta.region_of(d)?;
        let req = CreateClusterRequest {
            project_id: meta.project_of(d, "project_id"),
            name: expand_string(d.get("name")),
            description: expand_string(d.get("description")),
            version: expand_string(d.get("version")),
            cni: expand_string(d.get("cni")),
            tags: expand_strings(d.get("tags")),
            cluster_type: expand_string_ptr(d.get("type")),
            private_network_id: expand_id_ptr(d.get("private_network_id")),
        };
        let cluster = meta.k8s().create_cluster(ctx, &region, &req).await?;
        d.set_id(RegionalId::new(region.clone(), &cluster.id));

        let opts = wait_options(d, SLOW_RETRY_INTERVAL);
        wait_cluster(ctx, meta, &region, &cluster.id, opts).await
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        let cluster = meta.k8s().get_cluster(ctx, &region, &id).await?;
        d.set("name", cluster.name.as_str());
        d.set("description", cluster.description.as_str());
        d.set("type", cluster.cluster_type.as_str());
        d.set("version", cluster.version.as_str());
        d.set("cni", cluster.cni.as_str());
        d.set("tags", flatten_strings(&cluster.tags));
        d.set(
            "private_network_id",
            flatten_string_ptr(cluster.private_network_id.as_deref()),
        );
        d.set("region", cluster.region.as_str());
        d.set("project_id", cluster.project_id.as_str());
        d.set("organization_id", cluster.organization_id.as_str());
        d.set("status", cluster.status.as_str());
        d.set("apiserver_url", cluster.cluster_url.as_str());
        d.set("wildcard_dns", cluster.wildcard_dns.as_str());
        set_timestamps(d, cluster.created_at.as_ref(), cluster.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        let opts = wait_options(d, SLOW_RETRY_INTERVAL);

        if d.has_any_change(&["name", "description", "tags"]) {
            let req = UpdateClusterRequest {
                name: expand_string_ptr(d.get("name")),
                description: expand_updated_string_ptr(d.get("description")),
                tags: expand_updated_strings_ptr(d.get("tags")),
            };
            meta.k8s().update_cluster(ctx, &region, &id, &req).await?;
            wait_cluster(ctx, meta, &region, &id, opts).await?;
        }

        if d.has_change("version") {
            let version = d.get_str("version");
            tracing::info!(cluster = %id, %version, "upgrading cluster");
            meta.k8s()
                .upgrade_cluster(ctx, &region, &id, version)
                .await?;
            wait_cluster(ctx, meta, &region, &id, opts).await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        let opts = wait_options(d, SLOW_RETRY_INTERVAL);
        meta.k8s()
            .delete_cluster(ctx, &region, &id, d.get_bool("delete_additional_resources"))
            .await?;
        wait_gone(ctx, &format!("deletion of cluster {id}"), opts, || {
            meta.k8s().get_cluster(ctx, &region, &id)
        })
        .await
    }

    fn import_id(&self, id: &str) -> Result<String> {
        let id: RegionalId = id.parse()?;
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_updates_in_place() {
        let schema = K8sCluster.schema();
        let version = schema.block.get("version").unwrap();
        assert!(!version.force_new);
        assert!(schema.block.get("cni").unwrap().force_new);
    }

    #[test]
    fn test_import_requires_region() {
        let id = "fr-par/11111111-1111-4111-8111-111111111111";
        assert_eq!(K8sCluster.import_id(id).unwrap(), id);
        assert!(K8sCluster.import_id("11111111-1111-4111-8111-111111111111").is_err());
    }
}
