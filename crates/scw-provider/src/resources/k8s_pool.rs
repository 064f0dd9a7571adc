use super::{regional_id, regional_ref, set_timestamps, wait_gone, wait_options, wait_status};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::k8s::{CreatePoolRequest, POOL_TERMINAL_STATUSES, UpdatePoolRequest};
use scw_core::convert::{
    expand_bool, expand_string, expand_strings, expand_u32_ptr, flatten_strings,
};
use scw_core::diff::{suppress_case_insensitive, suppress_locality};
use scw_core::waiter::{DEFAULT_RETRY_INTERVAL, WaitOptions};
use scw_core::{Attribute, Block, Context, Region, RegionalId, Schema, Type, Zone};

pub struct K8sPool;

async fn wait_pool(
    ctx: &Context,
    meta: &Meta,
    region: &Region,
    id: &str,
    opts: WaitOptions,
) -> Result<()> {
    wait_status(ctx, &format!("pool {id}"), opts, POOL_TERMINAL_STATUSES, || {
        meta.k8s().get_pool(ctx, region, id)
    })
    .await?;
    Ok(())
}

fn size(d: &ResourceData, name: &str) -> Result<Option<u32>> {
    match d.get(name).as_int() {
        Some(n) if n < 0 => Err(ProviderError::invalid(name, "must not be negative")),
        _ => Ok(expand_u32_ptr(d.get(name))),
    }
}

/// Only the fields changed by this update
fn update_request(d: &ResourceData) -> Result<UpdatePoolRequest> {
    let changed = |name: &str| d.has_change(name);
    Ok(UpdatePoolRequest {
        size: if changed("size") { size(d, "size")? } else { None },
        min_size: if changed("min_size") { size(d, "min_size")? } else { None },
        max_size: if changed("max_size") { size(d, "max_size")? } else { None },
        autoscaling: changed("autoscaling").then(|| expand_bool(d.get("autoscaling"))),
        autohealing: changed("autohealing").then(|| expand_bool(d.get("autohealing"))),
        tags: changed("tags").then(|| expand_strings(d.get("tags"))),
    })
}

#[async_trait]
impl Resource for K8sPool {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr(
                    "cluster_id",
                    Attribute::required(Type::String)
                        .force_new()
                        .diff_suppress(suppress_locality),
                )
                .attr(
                    "name",
                    Attribute::optional_computed(Type::String).force_new(),
                )
                .attr(
                    "node_type",
                    Attribute::required(Type::String)
                        .force_new()
                        .diff_suppress(suppress_case_insensitive),
                )
                .attr("size", Attribute::required(Type::Int))
                .attr("min_size", Attribute::optional_computed(Type::Int))
                .attr("max_size", Attribute::optional_computed(Type::Int))
                .attr("autoscaling", Attribute::optional(Type::Bool).default(false))
                .attr("autohealing", Attribute::optional(Type::Bool).default(false))
                .attr("tags", Attribute::optional(Type::list(Type::String)))
                .attr(
                    "zone",
                    Attribute::optional_computed(Type::String).force_new(),
                )
                .attr("region", Attribute::computed(Type::String))
                .attr("status", Attribute::computed(Type::String))
                .attr("version", Attribute::computed(Type::String))
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("Kubernetes node pool")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let cluster = regional_ref(meta, d, "cluster_id")?;
        let zone = match d.get_str("zone") {
            "" => None,
            z => Some(z.parse::<Zone>()?),
        };
        let req = CreatePoolRequest {
            name: expand_string(d.get("name")),
            node_type: expand_string(d.get("node_type")),
            size: size(d, "size")?.unwrap_or_default(),
            min_size: size(d, "min_size")?,
            max_size: size(d, "max_size")?,
            autoscaling: d.get_bool("autoscaling"),
            autohealing: d.get_bool("autohealing"),
            tags: expand_strings(d.get("tags")),
            zone,
        };
        let pool = meta
            .k8s()
            .create_pool(ctx, &cluster.region, &cluster.id, &req)
            .await?;
        d.set_id(RegionalId::new(cluster.region.clone(), &pool.id));

        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);
        wait_pool(ctx, meta, &cluster.region, &pool.id, opts).await
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        let pool = meta.k8s().get_pool(ctx, &region, &id).await?;
        d.set(
            "cluster_id",
            RegionalId::new(region.clone(), &pool.cluster_id).to_string(),
        );
        d.set("name", pool.name.as_str());
        d.set("node_type", pool.node_type.as_str());
        d.set("size", pool.size);
        d.set("min_size", pool.min_size);
        d.set("max_size", pool.max_size);
        d.set("autoscaling", pool.autoscaling);
        d.set("autohealing", pool.autohealing);
        d.set("tags", flatten_strings(&pool.tags));
        d.set("zone", pool.zone.as_str());
        d.set("region", pool.region.as_str());
        d.set("status", pool.status.as_str());
        d.set("version", pool.version.as_str());
        set_timestamps(d, pool.created_at.as_ref(), pool.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        let req = update_request(d)?;
        meta.k8s().update_pool(ctx, &region, &id, &req).await?;
        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);
        wait_pool(ctx, meta, &region, &id, opts).await
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let RegionalId { region, id } = regional_id(d)?;
        meta.k8s().delete_pool(ctx, &region, &id).await?;
        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);
        wait_gone(ctx, &format!("deletion of pool {id}"), opts, || {
            meta.k8s().get_pool(ctx, &region, &id)
        })
        .await
    }

    fn import_id(&self, id: &str) -> Result<String> {
        let id: RegionalId = id.parse()?;
        Ok(id.to_string())
    }
}
