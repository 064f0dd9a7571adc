//! `scaleway_lb`
//!
//! Schema version 1 stores zoned ids. Private network attachments are a set of
//! nested blocks reconciled member by member; a changed static address is a
//! detach followed by an attach.

use super::{set_timestamps, wait_gone, wait_options, wait_status, zoned_id};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::migrate::{regional_to_zonal, zoned_id_from_regional};
use crate::relation::{Relation, reconcile};
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::ApiError;
use scw_api::lb::{
    AttachPrivateNetworkRequest, CreateLbRequest, DhcpConfig, LB_STATUS_ERROR, LB_STATUS_READY,
    LbPrivateNetwork, PN_STATUS_ERROR, StaticConfig, UpdateLbRequest,
};
use scw_core::convert::{
    expand_bool_ptr, expand_id_ptr, expand_string, expand_string_ptr, expand_strings,
    flatten_strings,
};
use scw_core::diff::{suppress_case_insensitive, suppress_locality};
use scw_core::waiter::{DEFAULT_RETRY_INTERVAL, Poll, WaitOptions, wait_for};
use scw_core::{Attribute, Block, Context, Object, Schema, Type, Value, Zone, ZonedId};
use serde_json::{Map, Value as Json};
use std::fmt;

pub struct Lb;

const SSL_LEVELS: &[&str] = &[
    "ssl_compatibility_level_intermediate",
    "ssl_compatibility_level_modern",
    "ssl_compatibility_level_old",
];

const LB_WAIT_STATUSES: &[&str] = &[LB_STATUS_READY, LB_STATUS_ERROR];

/// One private network attachment as configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PnAttachment {
    pub private_network_id: String,
    pub static_ips: Vec<String>,
    pub dhcp: bool,
}

impl fmt::Display for PnAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.private_network_id)?;
        if !self.static_ips.is_empty() {
            write!(f, " ({})", self.static_ips.join(", "))?;
        }
        Ok(())
    }
}

impl PnAttachment {
    fn request(&self) -> AttachPrivateNetworkRequest {
        let static_config = (!self.static_ips.is_empty()).then(|| StaticConfig {
            ip_address: self.static_ips.clone(),
        });
        AttachPrivateNetworkRequest {
            private_network_id: self.private_network_id.clone(),
            dhcp_config: static_config.is_none().then_some(DhcpConfig {}),
            static_config,
        }
    }
}

fn expand_attachments(v: &Value) -> Vec<PnAttachment> {
    v.as_items()
        .iter()
        .filter_map(|item| {
            let private_network_id = expand_id_ptr(item.get("private_network_id"))?;
            let static_ips = expand_strings(item.get("static_config"));
            let dhcp = static_ips.is_empty();
            Some(PnAttachment {
                private_network_id,
                static_ips,
                dhcp,
            })
        })
        .collect()
}

fn flatten_attachments(pns: &[LbPrivateNetwork]) -> Value {
    Value::set(pns.iter().map(|pn| {
        let mut o = Object::new();
        o.insert(
            "private_network_id".to_string(),
            Value::from(pn.private_network_id.as_str()),
        );
        o.insert("static_config".to_string(), flatten_strings(pn.static_ips()));
        o.insert("dhcp_config".to_string(), Value::Bool(pn.static_ips().is_empty()));
        o.insert("status".to_string(), Value::String(pn.status.clone()));
        Value::Object(o)
    }))
}

fn private_network_block() -> Block {
    Block::new()
        .attr(
            "private_network_id",
            Attribute::required(Type::Uuid).diff_suppress(suppress_locality),
        )
        .attr(
            "static_config",
            Attribute::optional_computed(Type::list(Type::Ip))
                .max_items(1)
                .description("Static address of the load balancer on this network"),
        )
        .attr(
            "dhcp_config",
            Attribute::optional_computed(Type::Bool).description("Address assigned by DHCP"),
        )
        .attr("status", Attribute::computed(Type::String))
}

/// Wait until the load balancer leaves its transitional statuses, error included
async fn wait_lb_terminal(
    ctx: &Context,
    meta: &Meta,
    zone: &Zone,
    id: &str,
    opts: WaitOptions,
) -> Result<scw_api::lb::Lb> {
    wait_status(ctx, &format!("load balancer {id}"), opts, LB_WAIT_STATUSES, || {
        meta.lb().get_lb(ctx, zone, id)
    })
    .await
}

async fn wait_lb(ctx: &Context, meta: &Meta, zone: &Zone, id: &str, opts: WaitOptions) -> Result<()> {
    let lb = wait_lb_terminal(ctx, meta, zone, id, opts).await?;
    if lb.status == LB_STATUS_ERROR {
        return Err(ProviderError::InvalidState(format!(
            "load balancer {id} is in status {}",
            lb.status
        )));
    }
    Ok(())
}

struct PrivateNetworks<'a> {
    meta: &'a Meta,
    zone: &'a Zone,
    lb_id: &'a str,
    opts: WaitOptions,
}

impl PrivateNetworks<'_> {
    async fn status_of(&self, ctx: &Context, pn_id: &str) -> Result<Option<String>> {
        let pns = self
            .meta
            .lb()
            .list_lb_private_networks(ctx, self.zone, self.lb_id)
            .await?;
        Ok(pns
            .into_iter()
            .find(|pn| pn.private_network_id == pn_id)
            .map(|pn| pn.status))
    }
}

#[async_trait]
impl Relation for PrivateNetworks<'_> {
    type Member = PnAttachment;

    fn attribute(&self) -> &'static str {
        "private_network"
    }

    async fn detach(&self, ctx: &Context, member: &PnAttachment) -> Result<()> {
        self.meta
            .lb()
            .detach_private_network(ctx, self.zone, self.lb_id, &member.private_network_id)
            .await?;
        Ok(())
    }

    async fn attach(&self, ctx: &Context, member: &PnAttachment) -> Result<()> {
        self.meta
            .lb()
            .attach_private_network(ctx, self.zone, self.lb_id, &member.request())
            .await?;
        Ok(())
    }

    async fn settle(&self, ctx: &Context) -> Result<()> {
        let what = format!("private networks of load balancer {}", self.lb_id);
        wait_for(ctx, &what, self.opts, || async {
            let pns = self
                .meta
                .lb()
                .list_lb_private_networks(ctx, self.zone, self.lb_id)
                .await?;
            match pns.iter().find(|pn| pn.status == "pending") {
                Some(pn) => Ok::<_, ApiError>(Poll::Pending(pn.status.clone())),
                None => Ok(Poll::Ready(())),
            }
        })
        .await?;
        wait_lb_terminal(ctx, self.meta, self.zone, self.lb_id, self.opts).await?;
        Ok(())
    }

    async fn failed_status(&self, ctx: &Context, member: &PnAttachment) -> Result<Option<String>> {
        Ok(self
            .status_of(ctx, &member.private_network_id)
            .await?
            .filter(|s| s == PN_STATUS_ERROR))
    }
}

#[async_trait]
impl Resource for Lb {
    fn type_name(&self) -> &'static str {
        "scaleway_lb"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr("name", Attribute::optional_computed(Type::String))
                .attr("description", Attribute::optional(Type::String))
                .attr(
                    "type",
                    Attribute::required(Type::String)
                        .force_new()
                        .diff_suppress(suppress_case_insensitive)
                        .description("Offer, e.g. LB-S"),
                )
                .attr(
                    "zone",
                    Attribute::optional_computed(Type::String).force_new(),
                )
                .attr("region", Attribute::computed(Type::String))
                .attr(
                    "project_id",
                    Attribute::optional_computed(Type::Uuid).force_new(),
                )
                .attr("organization_id", Attribute::computed(Type::String))
                .attr(
                    "ip_id",
                    Attribute::optional_computed(Type::Uuid)
                        .force_new()
                        .diff_suppress(suppress_locality)
                        .description("Flexible IP to attach"),
                )
                .attr("ip_address", Attribute::computed(Type::String))
                .attr(
                    "assign_flexible_ip",
                    Attribute::optional(Type::Bool).force_new(),
                )
                .attr("tags", Attribute::optional(Type::list(Type::String)))
                .attr(
                    "ssl_compatibility_level",
                    Attribute::optional(Type::String)
                        .default(SSL_LEVELS[0])
                        .one_of(SSL_LEVELS),
                )
                .attr(
                    "release_ip",
                    Attribute::optional(Type::Bool)
                        .default(false)
                        .description("Release the flexible IP on delete"),
                )
                .attr(
                    "private_network",
                    Attribute::optional(Type::set(Type::Object(private_network_block()))),
                )
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .version(1)
        .description("Load balancer")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let zone = meta.zone_of(d)?;
        let req = CreateLbRequest {
            name: expand_string(d.get("name")),
            description: expand_string(d.get("description")),
            ip_id: expand_id_ptr(d.get("ip_id")),
            assign_flexible_ip: expand_bool_ptr(d.get("assign_flexible_ip")),
            tags: expand_strings(d.get("tags")),
            lb_type: expand_string(d.get("type")),
            ssl_compatibility_level: expand_string_ptr(d.get("ssl_compatibility_level")),
            project_id: meta.project_of(d, "project_id"),
        };
        let lb = meta.lb().create_lb(ctx, &zone, &req).await?;
        d.set_id(ZonedId::new(zone.clone(), &lb.id));

        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);
        wait_lb(ctx, meta, &zone, &lb.id, opts).await?;

        let desired = expand_attachments(d.get("private_network"));
        let rel = PrivateNetworks {
            meta,
            zone: &zone,
            lb_id: &lb.id,
            opts,
        };
        reconcile(ctx, &rel, &[], &desired).await
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        let lb = meta.lb().get_lb(ctx, &zone, &id).await?;
        let pns = meta.lb().list_lb_private_networks(ctx, &zone, &id).await?;

        d.set("name", lb.name.as_str());
        d.set("description", lb.description.as_str());
        d.set("type", lb.lb_type.as_str());
        d.set("zone", lb.zone.as_str());
        d.set("region", lb.zone.region().as_str());
        d.set("project_id", lb.project_id.as_str());
        d.set("organization_id", lb.organization_id.as_str());
        d.set("tags", flatten_strings(&lb.tags));
        d.set("ssl_compatibility_level", lb.ssl_compatibility_level.as_str());
        match lb.ip.first() {
            Some(ip) => {
                d.set("ip_id", ZonedId::new(zone.clone(), &ip.id).to_string());
                d.set("ip_address", ip.ip_address.as_str());
            }
            None => {
                d.set("ip_id", "");
                d.set("ip_address", "");
            }
        }
        d.set("private_network", flatten_attachments(&pns));
        set_timestamps(d, lb.created_at.as_ref(), lb.updated_at.as_ref());
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);

        if d.has_any_change(&["name", "description", "tags", "ssl_compatibility_level"]) {
            let req = UpdateLbRequest {
                name: expand_string(d.get("name")),
                description: expand_string(d.get("description")),
                tags: expand_strings(d.get("tags")),
                ssl_compatibility_level: expand_string_ptr(d.get("ssl_compatibility_level")),
            };
            meta.lb().update_lb(ctx, &zone, &id, &req).await?;
            wait_lb(ctx, meta, &zone, &id, opts).await?;
        }

        if d.has_change("private_network") {
            let old = expand_attachments(d.prior("private_network"));
            let new = expand_attachments(d.get("private_network"));
            let rel = PrivateNetworks {
                meta,
                zone: &zone,
                lb_id: &id,
                opts,
            };
            reconcile(ctx, &rel, &old, &new).await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        let opts = wait_options(d, DEFAULT_RETRY_INTERVAL);
        let lb = wait_lb_terminal(ctx, meta, &zone, &id, opts).await?;
        if lb.status == LB_STATUS_ERROR {
            tracing::warn!(lb = %id, "deleting load balancer in error status");
        }

        let attached = meta.lb().list_lb_private_networks(ctx, &zone, &id).await?;
        if !attached.is_empty() {
            let current: Vec<PnAttachment> = attached
                .iter()
                .map(|pn| PnAttachment {
                    private_network_id: pn.private_network_id.clone(),
                    static_ips: pn.static_ips().to_vec(),
                    dhcp: pn.static_ips().is_empty(),
                })
                .collect();
            let rel = PrivateNetworks {
                meta,
                zone: &zone,
                lb_id: &id,
                opts,
            };
            reconcile(ctx, &rel, &current, &[]).await?;
        }

        meta.lb()
            .delete_lb(ctx, &zone, &id, d.get_bool("release_ip"))
            .await?;
        wait_gone(ctx, &format!("deletion of load balancer {id}"), opts, || {
            meta.lb().get_lb(ctx, &zone, &id)
        })
        .await
    }

    fn import_id(&self, id: &str) -> Result<String> {
        zoned_id_from_regional(id)
    }

    fn upgrade(&self, from: u32, state: Map<String, Json>) -> Result<Map<String, Json>> {
        match from {
            0 => regional_to_zonal(state),
            _ => Ok(state),
        }
    }
}
