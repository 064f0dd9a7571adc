//! Membership reconciliation for many-to-many associations
//!
//! Members are compared by full equality, so a member whose attributes changed
//! (a private network with a new static address) is detached and attached
//! again while untouched members are left alone.

use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use scw_core::{Classify, Context};
use std::fmt;

/// Split the transition from `old` to `new` into `(to_detach, to_attach)`
pub fn compare<M: PartialEq + Clone>(old: &[M], new: &[M]) -> (Vec<M>, Vec<M>) {
    let to_detach = old.iter().filter(|m| !new.contains(m)).cloned().collect();
    let to_attach = new.iter().filter(|m| !old.contains(m)).cloned().collect();
    (to_detach, to_attach)
}

#[async_trait]
pub trait Relation: Send + Sync {
    type Member: Clone + PartialEq + fmt::Display + Send + Sync;

    /// Attribute holding the membership, for diagnostics
    fn attribute(&self) -> &'static str;

    async fn detach(&self, ctx: &Context, member: &Self::Member) -> Result<()>;

    async fn attach(&self, ctx: &Context, member: &Self::Member) -> Result<()>;

    /// Block until the parent is quiescent again
    async fn settle(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    /// Status of an attached member that ended up failed
    async fn failed_status(&self, _ctx: &Context, _member: &Self::Member) -> Result<Option<String>> {
        Ok(None)
    }
}

fn member_error<R: Relation>(rel: &R, member: &R::Member, err: ProviderError) -> ProviderError {
    ProviderError::Attribute {
        path: rel.attribute().into(),
        kind: err.kind(),
        message: format!("{member}: {err}"),
    }
}

/// Apply the membership transition from `old` to `new`
pub async fn reconcile<R: Relation>(
    ctx: &Context,
    rel: &R,
    old: &[R::Member],
    new: &[R::Member],
) -> Result<()> {
    let (to_detach, to_attach) = compare(old, new);
    tracing::debug!(
        attribute = rel.attribute(),
        detach = to_detach.len(),
        attach = to_attach.len(),
        "reconciling membership"
    );

    for member in &to_detach {
        match rel.detach(ctx, member).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(%member, "member already detached");
            }
            Err(e) => return Err(member_error(rel, member, e)),
        }
    }
    if !to_detach.is_empty() {
        rel.settle(ctx).await?;
    }

    if to_attach.is_empty() {
        return Ok(());
    }
    for member in &to_attach {
        rel.attach(ctx, member)
            .await
            .map_err(|e| member_error(rel, member, e))?;
    }
    rel.settle(ctx).await?;

    let mut failed = Vec::new();
    for member in &to_attach {
        if let Some(status) = rel.failed_status(ctx, member).await? {
            failed.push((member, status));
        }
    }
    if failed.is_empty() {
        return Ok(());
    }

    for (member, status) in &failed {
        tracing::warn!(%member, %status, "rolling back failed attach");
        if let Err(e) = rel.detach(ctx, member).await {
            if !e.is_not_found() {
                tracing::warn!(%member, error = %e, "detach after failed attach");
            }
        }
    }
    rel.settle(ctx).await?;
    Err(ProviderError::AttachFailed {
        failed: failed
            .iter()
            .map(|(member, status)| format!("{member} ({status})"))
            .collect(),
    })
}
