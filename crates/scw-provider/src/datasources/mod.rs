//! Read-only lookups
//!
//! A data source takes its attributes from the matching resource, all of them
//! computed except the lookup keys. Lookup by id fetches directly; lookup by
//! name lists, then keeps only exact matches because the list endpoints
//! filter names loosely.

mod iam_group;
mod iam_ssh_key;
mod lb;

pub use iam_group::IamGroupDataSource;
pub use iam_ssh_key::IamSshKeyDataSource;
pub use lb::LbDataSource;

use crate::error::{ProviderError, Result};
use crate::resource::{DataSource, Resource, ResourceData};
use scw_core::{Attribute, Block, ErrorKind};
use std::sync::Arc;

pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(IamGroupDataSource),
        Arc::new(IamSshKeyDataSource),
        Arc::new(LbDataSource),
    ]
}

/// Schema of `resource` with every attribute computed but `filters`, plus an
/// optional `id_attr` that conflicts with `name`
pub(crate) fn lookup_block(
    resource: &dyn Resource,
    id_attr: &'static str,
    filters: &[&str],
) -> Block {
    let source = resource.schema().block;
    let mut block = Block::new().attr(
        id_attr,
        Attribute::optional(scw_core::Type::Uuid).conflicts_with(&["name"]),
    );
    for (name, attr) in source.attributes {
        let mut derived = if name == "name" {
            Attribute::optional_computed(attr.ty).conflicts_with(&[id_attr])
        } else if filters.contains(&name) {
            Attribute::optional_computed(attr.ty)
        } else {
            Attribute::computed(attr.ty)
        };
        derived.sensitive = attr.sensitive;
        derived.diff_suppress = attr.diff_suppress;
        derived.description = attr.description;
        block = block.attr(name, derived);
    }
    block
}

/// How a data source was asked to find its object
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookup {
    Id(String),
    Name(String),
}

impl Lookup {
    pub(crate) fn from_data(d: &ResourceData, id_attr: &str) -> Result<Self> {
        match (d.get_str(id_attr), d.get_str("name")) {
            ("", "") => Err(ProviderError::invalid(
                "name",
                format!("one of \"{id_attr}\" or \"name\" must be set"),
            )),
            ("", name) => Ok(Lookup::Name(name.to_string())),
            (id, _) => Ok(Lookup::Id(scw_core::id::expand_id(id).to_string())),
        }
    }
}

/// The single listed item whose name is exactly `name`
pub(crate) fn select_exact<T>(
    kind: &str,
    name: &str,
    items: Vec<T>,
    name_of: impl Fn(&T) -> &str,
) -> Result<T> {
    let listed = items.len();
    let mut matches: Vec<T> = items.into_iter().filter(|i| name_of(i) == name).collect();
    tracing::debug!(kind, name, listed, exact = matches.len(), "name lookup");
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ProviderError::Attribute {
            path: "name".into(),
            kind: ErrorKind::NotFound,
            message: format!("no {kind} found with name {name:?}"),
        }),
        n => Err(ProviderError::invalid(
            "name",
            format!("{n} {kind}s found with name {name:?}, add a scope filter"),
        )),
    }
}
