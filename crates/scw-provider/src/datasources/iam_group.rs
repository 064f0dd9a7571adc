use super::{Lookup, lookup_block, select_exact};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{DataSource, Resource, ResourceData};
use crate::resources::IamGroup;
use async_trait::async_trait;
use scw_api::iam::ListRequest;
use scw_core::convert::expand_string_ptr;
use scw_core::{Context, Schema};

pub struct IamGroupDataSource;

#[async_trait]
impl DataSource for IamGroupDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_group"
    }

    fn schema(&self) -> Schema {
        Schema::new(lookup_block(&IamGroup, "group_id", &["organization_id"]))
            .description("Look up an IAM group by id or name")
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = match Lookup::from_data(d, "group_id")? {
            Lookup::Id(id) => id,
            Lookup::Name(name) => {
                let req = ListRequest {
                    name: Some(name.clone()),
                    organization_id: expand_string_ptr(d.get("organization_id"))
                        .or_else(|| meta.organization_id().map(str::to_string)),
                    project_id: None,
                };
                let groups = meta.iam().list_groups(ctx, &req).await?;
                select_exact("group", &name, groups, |g| &g.name)?.id
            }
        };
        d.set_id(&id);
        d.set("group_id", id.as_str());
        IamGroup.read(ctx, meta, d).await
    }
}
