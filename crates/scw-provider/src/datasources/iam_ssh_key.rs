use super::{Lookup, lookup_block, select_exact};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{DataSource, Resource, ResourceData};
use crate::resources::IamSshKey;
use async_trait::async_trait;
use scw_api::iam::ListRequest;
use scw_core::convert::expand_string_ptr;
use scw_core::{Context, Schema};

pub struct IamSshKeyDataSource;

#[async_trait]
impl DataSource for IamSshKeyDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_iam_ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(lookup_block(
            &IamSshKey,
            "ssh_key_id",
            &["organization_id", "project_id"],
        ))
        .description("Look up an SSH key by id or name")
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = match Lookup::from_data(d, "ssh_key_id")? {
            Lookup::Id(id) => id,
            Lookup::Name(name) => {
                let req = ListRequest {
                    name: Some(name.clone()),
                    organization_id: expand_string_ptr(d.get("organization_id")),
                    project_id: expand_string_ptr(d.get("project_id")),
                };
                let keys = meta.iam().list_ssh_keys(ctx, &req).await?;
                select_exact("SSH key", &name, keys, |k| &k.name)?.id
            }
        };
        d.set_id(&id);
        d.set("ssh_key_id", id.as_str());
        IamSshKey.read(ctx, meta, d).await
    }
}
