use super::{Lookup, lookup_block, select_exact};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{DataSource, Resource, ResourceData};
use crate::resources::Lb;
use async_trait::async_trait;
use scw_api::iam::ListRequest;
use scw_core::convert::expand_string_ptr;
use scw_core::{Context, Schema, ZonedId};

pub struct LbDataSource;

#[async_trait]
impl DataSource for LbDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_lb"
    }

    fn schema(&self) -> Schema {
        Schema::new(lookup_block(&Lb, "lb_id", &["zone", "project_id"]))
            .description("Look up a load balancer by id or name")
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let zone = match d.get_str("lb_id").parse::<ZonedId>() {
            Ok(id) => id.zone,
            Err(_) => meta.zone_of(d)?,
        };
        let id = match Lookup::from_data(d, "lb_id")? {
            Lookup::Id(id) => id,
            Lookup::Name(name) => {
                let req = ListRequest {
                    name: Some(name.clone()),
                    organization_id: None,
                    project_id: expand_string_ptr(d.get("project_id")),
                };
                let lbs = meta.lb().list_lbs(ctx, &zone, &req).await?;
                select_exact("load balancer", &name, lbs, |lb| &lb.name)?.id
            }
        };
        let id = ZonedId::new(zone, id);
        d.set_id(&id);
        d.set("lb_id", id.to_string());
        Lb.read(ctx, meta, d).await
    }
}
