//! Managed resource types

pub(crate) mod iam_api_key;
mod iam_group;
mod iam_group_membership;
mod iam_policy;
mod iam_ssh_key;
mod k8s_cluster;
mod k8s_pool;
mod lb;
mod lb_backend;
mod lb_certificate;

pub use iam_api_key::IamApiKey;
pub use iam_group::IamGroup;
pub use iam_group_membership::IamGroupMembership;
pub use iam_policy::IamPolicy;
pub use iam_ssh_key::IamSshKey;
pub use k8s_cluster::K8sCluster;
pub use k8s_pool::K8sPool;
pub use lb::Lb;
pub use lb_backend::LbBackend;
pub use lb_certificate::LbCertificate;

use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use scw_api::k8s::{Cluster, Pool};
use scw_api::lb::{self as lb_api, Certificate};
use scw_core::convert::flatten_time;
use scw_core::id::is_uuid;
use scw_core::waiter::{Poll, WaitOptions, wait_for};
use scw_core::{AttributePath, Classify, Context, RegionalId, ZonedId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(IamSshKey),
        Arc::new(IamApiKey),
        Arc::new(IamGroup),
        Arc::new(IamGroupMembership),
        Arc::new(IamPolicy),
        Arc::new(Lb),
        Arc::new(LbBackend),
        Arc::new(LbCertificate),
        Arc::new(K8sCluster),
        Arc::new(K8sPool),
    ]
}

/// Objects that report a lifecycle status
pub(crate) trait Status {
    fn status(&self) -> &str;
}

impl Status for lb_api::Lb {
    fn status(&self) -> &str {
        &self.status
    }
}

impl Status for Certificate {
    fn status(&self) -> &str {
        &self.status
    }
}

impl Status for Cluster {
    fn status(&self) -> &str {
        &self.status
    }
}

impl Status for Pool {
    fn status(&self) -> &str {
        &self.status
    }
}

pub(crate) fn wait_options(d: &ResourceData, interval: Duration) -> WaitOptions {
    WaitOptions::new(d.timeout(), interval)
}

/// Poll `get` until the object reports one of `terminal`
pub(crate) async fn wait_status<T, F, Fut>(
    ctx: &Context,
    what: &str,
    opts: WaitOptions,
    terminal: &[&str],
    mut get: F,
) -> Result<T>
where
    T: Status,
    F: FnMut() -> Fut,
    Fut: Future<Output = scw_api::Result<T>>,
{
    let item = wait_for(ctx, what, opts, || {
        let fut = get();
        async move {
            let item = fut.await?;
            if terminal.contains(&item.status()) {
                Ok::<_, scw_api::ApiError>(Poll::Ready(item))
            } else {
                Ok(Poll::Pending(item.status().to_string()))
            }
        }
    })
    .await?;
    Ok(item)
}

/// Poll `get` until it answers not found
pub(crate) async fn wait_gone<T, F, Fut>(
    ctx: &Context,
    what: &str,
    opts: WaitOptions,
    mut get: F,
) -> Result<()>
where
    T: Status,
    F: FnMut() -> Fut,
    Fut: Future<Output = scw_api::Result<T>>,
{
    wait_for(ctx, what, opts, || {
        let fut = get();
        async move {
            match fut.await {
                Ok(item) => Ok(Poll::Pending(item.status().to_string())),
                Err(e) if e.is_not_found() => Ok(Poll::Ready(())),
                Err(e) => Err(e),
            }
        }
    })
    .await?;
    Ok(())
}

pub(crate) fn require_id(d: &ResourceData) -> Result<&str> {
    d.id()
        .ok_or_else(|| ProviderError::InvalidState("resource has no id".to_string()))
}

pub(crate) fn zoned_id(d: &ResourceData) -> Result<ZonedId> {
    Ok(require_id(d)?.parse()?)
}

pub(crate) fn regional_id(d: &ResourceData) -> Result<RegionalId> {
    Ok(require_id(d)?.parse()?)
}

/// Parse a zoned reference held by attribute `name`; a bare uuid lives in
/// the resource zone
pub(crate) fn zoned_ref(meta: &Meta, d: &ResourceData, name: &str) -> Result<ZonedId> {
    let raw = d.get_str(name);
    if is_uuid(raw) {
        return Ok(ZonedId::new(meta.zone_of(d)?, raw));
    }
    raw.parse()
        .map_err(|e| ProviderError::at(AttributePath::attr(name), ProviderError::Core(e)))
}

/// Same as [`zoned_ref`] for regional references
pub(crate) fn regional_ref(meta: &Meta, d: &ResourceData, name: &str) -> Result<RegionalId> {
    let raw = d.get_str(name);
    if is_uuid(raw) {
        return Ok(RegionalId::new(meta.region_of(d)?, raw));
    }
    raw.parse()
        .map_err(|e| ProviderError::at(AttributePath::attr(name), ProviderError::Core(e)))
}

pub(crate) fn set_timestamps(
    d: &mut ResourceData,
    created_at: Option<&DateTime<Utc>>,
    updated_at: Option<&DateTime<Utc>>,
) {
    d.set("created_at", flatten_time(created_at));
    d.set("updated_at", flatten_time(updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_type_names_unique_and_prefixed() {
        let names: BTreeSet<&str> = all().iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), all().len());
        assert!(names.iter().all(|n| n.starts_with("scaleway_")));
    }

    #[test]
    fn test_schemas_have_no_reserved_id_attribute() {
        for r in all() {
            assert!(r.schema().block.get("id").is_none(), "{}", r.type_name());
        }
    }
}
