//! In-memory Scaleway cloud
//!
//! Implements every API trait against process-local state so that provider
//! lifecycles can be exercised without network access. Transitional objects
//! (load balancers, attachments, certificates, clusters, pools) settle after
//! a configurable number of reads, and deletions take as many reads to
//! disappear. Every call is recorded for assertions.

use crate::error::{ApiError, Result};
use crate::iam::*;
use crate::k8s::*;
use crate::lb::*;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use scw_core::diff::canonical_authorized_key;
use scw_core::{Context, CoreError, Region, Zone};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const FAKE_ORGANIZATION_ID: &str = "11111111-1111-4111-8111-111111111111";
pub const FAKE_PROJECT_ID: &str = "22222222-2222-4222-8222-222222222222";

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn new_access_key() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("SCW{}", &raw[..17])
}

fn name_matches(filter: &Option<String>, name: &str) -> bool {
    // The real list endpoints match names loosely
    filter.as_deref().is_none_or(|f| name.contains(f))
}

/// Objects that pass through a transitional status
trait Settle {
    fn id(&self) -> &str;
    fn settle(&mut self, failing: &State);
    fn set_status(&mut self, status: &str);
}

struct Tracked<T> {
    item: T,
    settle_in: usize,
    deleting: bool,
}

impl<T: Settle> Tracked<T> {
    fn new(item: T, settle_in: usize) -> Self {
        Self {
            item,
            settle_in,
            deleting: false,
        }
    }
}

/// Advance the object `id` by one read; `None` once it is gone
fn poll<T: Settle + Clone>(items: &mut Vec<Tracked<T>>, id: &str, state: &State) -> Option<T> {
    let pos = items.iter().position(|t| t.item.id() == id)?;
    let t = &mut items[pos];
    if t.settle_in > 0 {
        t.settle_in -= 1;
        if t.settle_in == 0 && !t.deleting {
            t.item.settle(state);
        }
        return Some(t.item.clone());
    }
    if t.deleting {
        items.remove(pos);
        return None;
    }
    Some(t.item.clone())
}

fn begin_delete<T: Settle>(items: &mut Vec<Tracked<T>>, id: &str, settle: usize) -> bool {
    let Some(pos) = items.iter().position(|t| t.item.id() == id && !t.deleting) else {
        return false;
    };
    if settle == 0 {
        items.remove(pos);
    } else {
        let t = &mut items[pos];
        t.deleting = true;
        t.settle_in = settle;
        t.item.set_status("deleting");
    }
    true
}

impl Settle for Lb {
    fn id(&self) -> &str {
        &self.id
    }
    fn settle(&mut self, _: &State) {
        self.status = LB_STATUS_READY.to_string();
    }
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

/// Private network attachment keyed by `{lb}/{pn}`
#[derive(Clone)]
struct Attachment {
    key: String,
    lb_id: String,
    pn: LbPrivateNetwork,
}

impl Settle for Attachment {
    fn id(&self) -> &str {
        &self.key
    }
    fn settle(&mut self, state: &State) {
        self.pn.status = if state.failing_private_networks.contains(&self.pn.private_network_id) {
            PN_STATUS_ERROR.to_string()
        } else {
            PN_STATUS_READY.to_string()
        };
    }
    fn set_status(&mut self, status: &str) {
        self.pn.status = status.to_string();
    }
}

impl Settle for Certificate {
    fn id(&self) -> &str {
        &self.id
    }
    fn settle(&mut self, state: &State) {
        if state.failing_certificates.contains(&self.common_name) {
            self.status = CERT_STATUS_ERROR.to_string();
            self.status_details = Some("domain validation failed".to_string());
        } else {
            self.status = "ready".to_string();
            let start = now();
            self.not_valid_before = Some(start);
            self.not_valid_after = Some(start + chrono::Duration::days(90));
        }
    }
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl Settle for Cluster {
    fn id(&self) -> &str {
        &self.id
    }
    fn settle(&mut self, _: &State) {
        self.status = "ready".to_string();
    }
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl Settle for Pool {
    fn id(&self) -> &str {
        &self.id
    }
    fn settle(&mut self, state: &State) {
        self.status = state
            .pool_settle_status
            .clone()
            .unwrap_or_else(|| "ready".to_string());
    }
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

#[derive(Default)]
struct Objects {
    ssh_keys: Vec<SshKey>,
    api_keys: Vec<ApiKey>,
    groups: Vec<Group>,
    policies: Vec<(Policy, Vec<Rule>)>,
    lbs: Vec<Tracked<Lb>>,
    attachments: Vec<Tracked<Attachment>>,
    backends: Vec<Backend>,
    certificates: Vec<Tracked<Certificate>>,
    clusters: Vec<Tracked<Cluster>>,
    pools: Vec<Tracked<Pool>>,
}

#[derive(Default)]
struct State {
    settle_polls: usize,
    calls: Vec<String>,
    fail_next: Option<(u16, String)>,
    failing_private_networks: HashSet<String>,
    failing_certificates: HashSet<String>,
    pool_settle_status: Option<String>,
}

pub struct FakeCloud {
    state: Mutex<State>,
    objects: Mutex<Objects>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                settle_polls: 1,
                ..State::default()
            }),
            objects: Mutex::new(Objects::default()),
        }
    }

    /// Reads a transitional object needs before it settles
    pub fn with_settle_polls(self, n: usize) -> Self {
        self.lock_state().settle_polls = n;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recorded calls, oldest first, as `method args`
    pub fn calls(&self) -> Vec<String> {
        self.lock_state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock_state().calls.clear();
    }

    /// Fail the next call with `status`
    pub fn fail_next(&self, status: u16, error_type: &str) {
        self.lock_state().fail_next = Some((status, error_type.to_string()));
    }

    /// Attachments of this private network settle in the error state
    pub fn fail_attach(&self, private_network_id: &str) {
        self.lock_state()
            .failing_private_networks
            .insert(private_network_id.to_string());
    }

    /// Certificates for this common name settle in the error state
    pub fn fail_certificate(&self, common_name: &str) {
        self.lock_state()
            .failing_certificates
            .insert(common_name.to_string());
    }

    /// Pools settle in `status` instead of ready
    pub fn settle_pools_as(&self, status: &str) {
        self.lock_state().pool_settle_status = Some(status.to_string());
    }

    /// Put the object with this id straight into `status`, as if it changed
    /// remotely
    pub fn force_status(&self, id: &str, status: &str) {
        fn force<T: Settle>(items: &mut [Tracked<T>], id: &str, status: &str) {
            for t in items.iter_mut().filter(|t| t.item.id() == id) {
                t.settle_in = 0;
                t.item.set_status(status);
            }
        }
        let mut o = self.lock_objects();
        force(&mut o.lbs, id, status);
        force(&mut o.certificates, id, status);
        force(&mut o.clusters, id, status);
        force(&mut o.pools, id, status);
    }

    /// Remove any object with this id, as if deleted from the console
    pub fn delete_out_of_band(&self, id: &str) {
        let mut o = self.lock_objects();
        o.ssh_keys.retain(|k| k.id != id);
        o.api_keys.retain(|k| k.access_key != id);
        o.groups.retain(|g| g.id != id);
        o.policies.retain(|(p, _)| p.id != id);
        o.lbs.retain(|t| t.item.id != id);
        o.backends.retain(|b| b.id != id);
        o.certificates.retain(|t| t.item.id != id);
        o.clusters.retain(|t| t.item.id != id);
        o.pools.retain(|t| t.item.id != id);
    }

    /// Record the call and apply injected failures
    fn enter(&self, ctx: &Context, call: String) -> Result<MutexGuard<'_, State>> {
        if ctx.is_cancelled() {
            return Err(CoreError::Cancelled.into());
        }
        let mut state = self.lock_state();
        tracing::debug!(call = %call, "fake cloud call");
        state.calls.push(call);
        if let Some((status, kind)) = state.fail_next.take() {
            return Err(ApiError::status(status, Some(&kind), "injected failure"));
        }
        Ok(state)
    }

    fn settle(&self) -> usize {
        self.lock_state().settle_polls
    }
}

#[async_trait]
impl IamApi for FakeCloud {
    async fn create_ssh_key(&self, ctx: &Context, req: &CreateSshKeyRequest) -> Result<SshKey> {
        drop(self.enter(ctx, "create_ssh_key".into())?);
        let public_key = canonical_authorized_key(&req.public_key).ok_or_else(|| {
            ApiError::status(400, Some("invalid_arguments"), "invalid public key")
        })?;
        let ts = now();
        let key = SshKey {
            id: new_id(),
            name: req.name.clone().unwrap_or_default(),
            fingerprint: format!("256 SHA256:{}", &public_key[public_key.len().saturating_sub(16)..]),
            public_key,
            organization_id: FAKE_ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone().unwrap_or_else(|| FAKE_PROJECT_ID.to_string()),
            disabled: false,
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        self.lock_objects().ssh_keys.push(key.clone());
        Ok(key)
    }

    async fn get_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        drop(self.enter(ctx, format!("get_ssh_key {id}"))?);
        self.lock_objects()
            .ssh_keys
            .iter()
            .find(|k| k.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("ssh_key", id))
    }

    async fn update_ssh_key(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdateSshKeyRequest,
    ) -> Result<SshKey> {
        drop(self.enter(ctx, format!("update_ssh_key {id}"))?);
        let mut o = self.lock_objects();
        let key = o
            .ssh_keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or_else(|| ApiError::not_found("ssh_key", id))?;
        if let Some(name) = &req.name {
            key.name = name.clone();
        }
        key.updated_at = Some(now());
        Ok(key.clone())
    }

    async fn enable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        drop(self.enter(ctx, format!("enable_ssh_key {id}"))?);
        let mut o = self.lock_objects();
        let key = o
            .ssh_keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or_else(|| ApiError::not_found("ssh_key", id))?;
        key.disabled = false;
        Ok(key.clone())
    }

    async fn disable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        drop(self.enter(ctx, format!("disable_ssh_key {id}"))?);
        let mut o = self.lock_objects();
        let key = o
            .ssh_keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or_else(|| ApiError::not_found("ssh_key", id))?;
        key.disabled = true;
        Ok(key.clone())
    }

    async fn delete_ssh_key(&self, ctx: &Context, id: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_ssh_key {id}"))?);
        let mut o = self.lock_objects();
        let before = o.ssh_keys.len();
        o.ssh_keys.retain(|k| k.id != id);
        if o.ssh_keys.len() == before {
            return Err(ApiError::not_found("ssh_key", id));
        }
        Ok(())
    }

    async fn list_ssh_keys(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<SshKey>> {
        drop(self.enter(ctx, "list_ssh_keys".into())?);
        Ok(self
            .lock_objects()
            .ssh_keys
            .iter()
            .filter(|k| name_matches(&req.name, &k.name))
            .filter(|k| req.project_id.as_ref().is_none_or(|p| *p == k.project_id))
            .filter(|k| {
                req.organization_id
                    .as_ref()
                    .is_none_or(|o| *o == k.organization_id)
            })
            .cloned()
            .collect())
    }

    async fn create_api_key(&self, ctx: &Context, req: &CreateApiKeyRequest) -> Result<ApiKey> {
        drop(self.enter(ctx, "create_api_key".into())?);
        if req.application_id.is_some() == req.user_id.is_some() {
            return Err(ApiError::status(
                400,
                Some("invalid_arguments"),
                "exactly one of application_id and user_id is required",
            ));
        }
        let ts = now();
        let key = ApiKey {
            access_key: new_access_key(),
            secret_key: Some(new_id()),
            application_id: req.application_id.clone(),
            user_id: req.user_id.clone(),
            description: req.description.clone().unwrap_or_default(),
            default_project_id: req
                .default_project_id
                .clone()
                .unwrap_or_else(|| FAKE_PROJECT_ID.to_string()),
            editable: true,
            creation_ip: "192.0.2.10".to_string(),
            expires_at: req.expires_at,
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        let stored = ApiKey {
            secret_key: None,
            ..key.clone()
        };
        self.lock_objects().api_keys.push(stored);
        Ok(key)
    }

    async fn get_api_key(&self, ctx: &Context, access_key: &str) -> Result<ApiKey> {
        drop(self.enter(ctx, format!("get_api_key {access_key}"))?);
        self.lock_objects()
            .api_keys
            .iter()
            .find(|k| k.access_key == access_key)
            .cloned()
            .ok_or_else(|| ApiError::not_found("api_key", access_key))
    }

    async fn update_api_key(
        &self,
        ctx: &Context,
        access_key: &str,
        req: &UpdateApiKeyRequest,
    ) -> Result<ApiKey> {
        drop(self.enter(ctx, format!("update_api_key {access_key}"))?);
        let mut o = self.lock_objects();
        let key = o
            .api_keys
            .iter_mut()
            .find(|k| k.access_key == access_key)
            .ok_or_else(|| ApiError::not_found("api_key", access_key))?;
        if let Some(d) = &req.description {
            key.description = d.clone();
        }
        if let Some(p) = &req.default_project_id {
            key.default_project_id = p.clone();
        }
        key.updated_at = Some(now());
        Ok(key.clone())
    }

    async fn delete_api_key(&self, ctx: &Context, access_key: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_api_key {access_key}"))?);
        let mut o = self.lock_objects();
        let before = o.api_keys.len();
        o.api_keys.retain(|k| k.access_key != access_key);
        if o.api_keys.len() == before {
            return Err(ApiError::not_found("api_key", access_key));
        }
        Ok(())
    }

    async fn create_group(&self, ctx: &Context, req: &CreateGroupRequest) -> Result<Group> {
        drop(self.enter(ctx, "create_group".into())?);
        let ts = now();
        let group = Group {
            id: new_id(),
            organization_id: req
                .organization_id
                .clone()
                .unwrap_or_else(|| FAKE_ORGANIZATION_ID.to_string()),
            name: req.name.clone(),
            description: req.description.clone(),
            user_ids: Vec::new(),
            application_ids: Vec::new(),
            tags: req.tags.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        self.lock_objects().groups.push(group.clone());
        Ok(group)
    }

    async fn get_group(&self, ctx: &Context, id: &str) -> Result<Group> {
        drop(self.enter(ctx, format!("get_group {id}"))?);
        self.lock_objects()
            .groups
            .iter()
            .find(|g| g.id == id)
            .map(reversed_members)
            .ok_or_else(|| ApiError::not_found("group", id))
    }

    async fn update_group(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdateGroupRequest,
    ) -> Result<Group> {
        drop(self.enter(ctx, format!("update_group {id}"))?);
        let mut o = self.lock_objects();
        let group = o
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| ApiError::not_found("group", id))?;
        if let Some(name) = &req.name {
            group.name = name.clone();
        }
        if let Some(d) = &req.description {
            group.description = d.clone();
        }
        if let Some(tags) = &req.tags {
            group.tags = tags.clone();
        }
        group.updated_at = Some(now());
        Ok(reversed_members(group))
    }

    async fn delete_group(&self, ctx: &Context, id: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_group {id}"))?);
        let mut o = self.lock_objects();
        let before = o.groups.len();
        o.groups.retain(|g| g.id != id);
        if o.groups.len() == before {
            return Err(ApiError::not_found("group", id));
        }
        Ok(())
    }

    async fn list_groups(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<Group>> {
        drop(self.enter(ctx, "list_groups".into())?);
        Ok(self
            .lock_objects()
            .groups
            .iter()
            .filter(|g| name_matches(&req.name, &g.name))
            .filter(|g| {
                req.organization_id
                    .as_ref()
                    .is_none_or(|o| *o == g.organization_id)
            })
            .map(reversed_members)
            .collect())
    }

    async fn add_group_member(
        &self,
        ctx: &Context,
        group_id: &str,
        member: &GroupMember,
    ) -> Result<Group> {
        drop(self.enter(ctx, format!("add_group_member {group_id} {}", member_label(member)))?);
        let mut o = self.lock_objects();
        let group = o
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        let (list, id) = member_slot(group, member);
        if !list.iter().any(|m| m == id) {
            list.push(id.to_string());
        }
        Ok(reversed_members(group))
    }

    async fn remove_group_member(
        &self,
        ctx: &Context,
        group_id: &str,
        member: &GroupMember,
    ) -> Result<Group> {
        drop(self.enter(
            ctx,
            format!("remove_group_member {group_id} {}", member_label(member)),
        )?);
        let mut o = self.lock_objects();
        let group = o
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        let (list, id) = member_slot(group, member);
        let before = list.len();
        list.retain(|m| m != id);
        if list.len() == before {
            return Err(ApiError::not_found("group_member", id));
        }
        Ok(reversed_members(group))
    }

    async fn create_policy(&self, ctx: &Context, req: &CreatePolicyRequest) -> Result<Policy> {
        drop(self.enter(ctx, "create_policy".into())?);
        let principals = [
            req.user_id.is_some(),
            req.group_id.is_some(),
            req.application_id.is_some(),
            req.no_principal == Some(true),
        ];
        if principals.iter().filter(|p| **p).count() != 1 {
            return Err(ApiError::status(
                400,
                Some("invalid_arguments"),
                "exactly one principal is required",
            ));
        }
        let ts = now();
        let policy = Policy {
            id: new_id(),
            name: req.name.clone(),
            description: req.description.clone(),
            organization_id: req
                .organization_id
                .clone()
                .unwrap_or_else(|| FAKE_ORGANIZATION_ID.to_string()),
            user_id: req.user_id.clone(),
            group_id: req.group_id.clone(),
            application_id: req.application_id.clone(),
            no_principal: req.no_principal.unwrap_or(false),
            editable: true,
            tags: req.tags.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        let rules = req.rules.iter().map(to_rule).collect();
        self.lock_objects().policies.push((policy.clone(), rules));
        Ok(policy)
    }

    async fn get_policy(&self, ctx: &Context, id: &str) -> Result<Policy> {
        drop(self.enter(ctx, format!("get_policy {id}"))?);
        self.lock_objects()
            .policies
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.clone())
            .ok_or_else(|| ApiError::not_found("policy", id))
    }

    async fn update_policy(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdatePolicyRequest,
    ) -> Result<Policy> {
        drop(self.enter(ctx, format!("update_policy {id}"))?);
        let mut o = self.lock_objects();
        let (policy, _) = o
            .policies
            .iter_mut()
            .find(|(p, _)| p.id == id)
            .ok_or_else(|| ApiError::not_found("policy", id))?;
        if let Some(name) = &req.name {
            policy.name = name.clone();
        }
        if let Some(d) = &req.description {
            policy.description = d.clone();
        }
        if let Some(tags) = &req.tags {
            policy.tags = tags.clone();
        }
        let principal_changed = req.user_id.is_some()
            || req.group_id.is_some()
            || req.application_id.is_some()
            || req.no_principal.is_some();
        if principal_changed {
            policy.user_id = req.user_id.clone();
            policy.group_id = req.group_id.clone();
            policy.application_id = req.application_id.clone();
            policy.no_principal = req.no_principal.unwrap_or(false);
        }
        policy.updated_at = Some(now());
        Ok(policy.clone())
    }

    async fn delete_policy(&self, ctx: &Context, id: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_policy {id}"))?);
        let mut o = self.lock_objects();
        let before = o.policies.len();
        o.policies.retain(|(p, _)| p.id != id);
        if o.policies.len() == before {
            return Err(ApiError::not_found("policy", id));
        }
        Ok(())
    }

    async fn list_rules(&self, ctx: &Context, policy_id: &str) -> Result<Vec<Rule>> {
        drop(self.enter(ctx, format!("list_rules {policy_id}"))?);
        self.lock_objects()
            .policies
            .iter()
            .find(|(p, _)| p.id == policy_id)
            .map(|(_, rules)| rules.clone())
            .ok_or_else(|| ApiError::not_found("policy", policy_id))
    }

    async fn set_rules(
        &self,
        ctx: &Context,
        policy_id: &str,
        rules: &[RuleSpecs],
    ) -> Result<Vec<Rule>> {
        drop(self.enter(ctx, format!("set_rules {policy_id}"))?);
        let mut o = self.lock_objects();
        let (_, stored) = o
            .policies
            .iter_mut()
            .find(|(p, _)| p.id == policy_id)
            .ok_or_else(|| ApiError::not_found("policy", policy_id))?;
        *stored = rules.iter().map(to_rule).collect();
        Ok(stored.clone())
    }
}

fn to_rule(spec: &RuleSpecs) -> Rule {
    Rule {
        id: new_id(),
        permission_set_names: spec.permission_set_names.clone(),
        project_ids: spec.project_ids.clone(),
        organization_id: spec.organization_id.clone(),
    }
}

fn member_label(member: &GroupMember) -> String {
    match member {
        GroupMember::UserId(id) => format!("user_id={id}"),
        GroupMember::ApplicationId(id) => format!("application_id={id}"),
    }
}

fn member_slot<'a>(group: &'a mut Group, member: &'a GroupMember) -> (&'a mut Vec<String>, &'a str) {
    match member {
        GroupMember::UserId(id) => (&mut group.user_ids, id),
        GroupMember::ApplicationId(id) => (&mut group.application_ids, id),
    }
}

/// The real API does not preserve insertion order
fn reversed_members(group: &Group) -> Group {
    let mut g = group.clone();
    g.user_ids.reverse();
    g.application_ids.reverse();
    g
}

#[async_trait]
impl LbApi for FakeCloud {
    async fn create_lb(&self, ctx: &Context, zone: &Zone, req: &CreateLbRequest) -> Result<Lb> {
        let settle = self.enter(ctx, format!("create_lb {zone}"))?.settle_polls;
        let ts = now();
        let id = new_id();
        let ip = if req.assign_flexible_ip == Some(false) {
            Vec::new()
        } else {
            vec![LbIp {
                id: req.ip_id.clone().unwrap_or_else(new_id),
                ip_address: "51.15.0.10".to_string(),
                lb_id: Some(id.clone()),
            }]
        };
        let lb = Lb {
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            status: if settle == 0 { LB_STATUS_READY } else { "to_create" }.to_string(),
            zone: zone.clone(),
            organization_id: FAKE_ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone().unwrap_or_else(|| FAKE_PROJECT_ID.to_string()),
            ip,
            tags: req.tags.clone(),
            lb_type: req.lb_type.clone(),
            ssl_compatibility_level: req
                .ssl_compatibility_level
                .clone()
                .unwrap_or_else(|| "ssl_compatibility_level_intermediate".to_string()),
            private_network_count: 0,
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        self.lock_objects().lbs.push(Tracked::new(lb.clone(), settle));
        Ok(lb)
    }

    async fn get_lb(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Lb> {
        let state = self.enter(ctx, format!("get_lb {zone}/{id}"))?;
        let mut o = self.lock_objects();
        let count = o.attachments.iter().filter(|t| t.item.lb_id == id).count();
        let mut lb = poll(&mut o.lbs, id, &state)
            .filter(|lb| lb.zone == *zone)
            .ok_or_else(|| ApiError::not_found("lb", id))?;
        lb.private_network_count = u32::try_from(count).unwrap_or(u32::MAX);
        Ok(lb)
    }

    async fn update_lb(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        req: &UpdateLbRequest,
    ) -> Result<Lb> {
        drop(self.enter(ctx, format!("update_lb {zone}/{id}"))?);
        let mut o = self.lock_objects();
        let t = o
            .lbs
            .iter_mut()
            .find(|t| t.item.id == id && !t.deleting)
            .ok_or_else(|| ApiError::not_found("lb", id))?;
        t.item.name = req.name.clone();
        t.item.description = req.description.clone();
        t.item.tags = req.tags.clone();
        if let Some(level) = &req.ssl_compatibility_level {
            t.item.ssl_compatibility_level = level.clone();
        }
        t.item.updated_at = Some(now());
        Ok(t.item.clone())
    }

    async fn delete_lb(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        release_ip: bool,
    ) -> Result<()> {
        let settle = self
            .enter(ctx, format!("delete_lb {zone}/{id} release_ip={release_ip}"))?
            .settle_polls;
        let mut o = self.lock_objects();
        if !begin_delete(&mut o.lbs, id, settle) {
            return Err(ApiError::not_found("lb", id));
        }
        o.attachments.retain(|t| t.item.lb_id != id);
        o.backends.retain(|b| b.lb_id != id);
        o.certificates.retain(|t| t.item.lb_id != id);
        Ok(())
    }

    async fn list_lbs(&self, ctx: &Context, zone: &Zone, req: &ListRequest) -> Result<Vec<Lb>> {
        drop(self.enter(ctx, format!("list_lbs {zone}"))?);
        Ok(self
            .lock_objects()
            .lbs
            .iter()
            .filter(|t| !t.deleting && t.item.zone == *zone)
            .map(|t| &t.item)
            .filter(|lb| name_matches(&req.name, &lb.name))
            .filter(|lb| req.project_id.as_ref().is_none_or(|p| *p == lb.project_id))
            .cloned()
            .collect())
    }

    async fn list_lb_private_networks(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
    ) -> Result<Vec<LbPrivateNetwork>> {
        let state = self.enter(ctx, format!("list_lb_private_networks {zone}/{lb_id}"))?;
        let mut o = self.lock_objects();
        if !o.lbs.iter().any(|t| t.item.id == lb_id) {
            return Err(ApiError::not_found("lb", lb_id));
        }
        let keys: Vec<String> = o
            .attachments
            .iter()
            .filter(|t| t.item.lb_id == lb_id)
            .map(|t| t.item.key.clone())
            .collect();
        Ok(keys
            .iter()
            .filter_map(|k| poll(&mut o.attachments, k, &state))
            .map(|a| a.pn)
            .collect())
    }

    async fn attach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &AttachPrivateNetworkRequest,
    ) -> Result<LbPrivateNetwork> {
        let state = self.enter(
            ctx,
            format!(
                "attach_private_network {zone}/{lb_id} {} ips={}",
                req.private_network_id,
                req.static_config
                    .as_ref()
                    .map(|c| c.ip_address.join(","))
                    .unwrap_or_default()
            ),
        )?;
        let settle = state.settle_polls;
        let mut o = self.lock_objects();
        if !o.lbs.iter().any(|t| t.item.id == lb_id && !t.deleting) {
            return Err(ApiError::not_found("lb", lb_id));
        }
        let key = format!("{lb_id}/{}", req.private_network_id);
        if o.attachments.iter().any(|t| t.item.key == key) {
            return Err(ApiError::status(
                409,
                Some("conflict"),
                "private network already attached",
            ));
        }
        let ts = now();
        let mut attachment = Attachment {
            key,
            lb_id: lb_id.to_string(),
            pn: LbPrivateNetwork {
                private_network_id: req.private_network_id.clone(),
                status: "pending".to_string(),
                static_config: req.static_config.clone(),
                dhcp_config: req.dhcp_config.clone(),
                created_at: Some(ts),
                updated_at: Some(ts),
            },
        };
        if settle == 0 {
            attachment.settle(&state);
        }
        let pn = attachment.pn.clone();
        o.attachments.push(Tracked::new(attachment, settle));
        Ok(pn)
    }

    async fn detach_private_network(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        private_network_id: &str,
    ) -> Result<()> {
        drop(self.enter(
            ctx,
            format!("detach_private_network {zone}/{lb_id} {private_network_id}"),
        )?);
        let key = format!("{lb_id}/{private_network_id}");
        let mut o = self.lock_objects();
        let before = o.attachments.len();
        o.attachments.retain(|t| t.item.key != key);
        if o.attachments.len() == before {
            return Err(ApiError::not_found("private_network", private_network_id));
        }
        Ok(())
    }

    async fn create_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &BackendSpec,
    ) -> Result<Backend> {
        drop(self.enter(
            ctx,
            format!("create_backend {zone}/{lb_id} proxy={}", req.proxy_protocol),
        )?);
        let mut o = self.lock_objects();
        if !o.lbs.iter().any(|t| t.item.id == lb_id && !t.deleting) {
            return Err(ApiError::not_found("lb", lb_id));
        }
        let ts = now();
        let health_check = req.health_check.clone().unwrap_or_else(|| HealthCheck {
            port: req.forward_port,
            check_delay: Some(Duration::from_secs(60)),
            check_timeout: Some(Duration::from_secs(30)),
            check_max_retries: 2,
            check_send_proxy: false,
            http_config: None,
        });
        let mut backend = Backend {
            id: new_id(),
            lb_id: lb_id.to_string(),
            name: String::new(),
            forward_protocol: String::new(),
            forward_port: 0,
            forward_port_algorithm: String::new(),
            sticky_sessions: String::new(),
            sticky_sessions_cookie_name: String::new(),
            server_ip: Vec::new(),
            timeout_server: None,
            timeout_connect: None,
            timeout_tunnel: None,
            on_marked_down_action: String::new(),
            proxy_protocol: String::new(),
            send_proxy_v2: false,
            health_check,
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        apply_backend_spec(&mut backend, req);
        o.backends.push(backend.clone());
        Ok(backend)
    }

    async fn get_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Backend> {
        drop(self.enter(ctx, format!("get_backend {zone}/{id}"))?);
        self.lock_objects()
            .backends
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("backend", id))
    }

    async fn update_backend(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        req: &BackendSpec,
    ) -> Result<Backend> {
        drop(self.enter(
            ctx,
            format!("update_backend {zone}/{id} proxy={}", req.proxy_protocol),
        )?);
        let mut o = self.lock_objects();
        let backend = o
            .backends
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| ApiError::not_found("backend", id))?;
        apply_backend_spec(backend, req);
        backend.updated_at = Some(now());
        Ok(backend.clone())
    }

    async fn update_health_check(
        &self,
        ctx: &Context,
        zone: &Zone,
        backend_id: &str,
        req: &HealthCheck,
    ) -> Result<HealthCheck> {
        drop(self.enter(ctx, format!("update_health_check {zone}/{backend_id}"))?);
        let mut o = self.lock_objects();
        let backend = o
            .backends
            .iter_mut()
            .find(|b| b.id == backend_id)
            .ok_or_else(|| ApiError::not_found("backend", backend_id))?;
        backend.health_check = req.clone();
        Ok(req.clone())
    }

    async fn delete_backend(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_backend {zone}/{id}"))?);
        let mut o = self.lock_objects();
        let before = o.backends.len();
        o.backends.retain(|b| b.id != id);
        if o.backends.len() == before {
            return Err(ApiError::not_found("backend", id));
        }
        Ok(())
    }

    async fn create_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        lb_id: &str,
        req: &CreateCertificateRequest,
    ) -> Result<Certificate> {
        let state = self.enter(ctx, format!("create_certificate {zone}/{lb_id}"))?;
        let settle = state.settle_polls;
        let mut o = self.lock_objects();
        if !o.lbs.iter().any(|t| t.item.id == lb_id && !t.deleting) {
            return Err(ApiError::not_found("lb", lb_id));
        }
        let (certificate_type, common_name, sans) = match (&req.letsencrypt, &req.custom_certificate) {
            (Some(le), None) => (
                "letsencryt",
                le.common_name.clone(),
                le.subject_alternative_name.clone(),
            ),
            (None, Some(_)) => ("custom_certificate", "custom.example.com".to_string(), Vec::new()),
            _ => {
                return Err(ApiError::status(
                    400,
                    Some("invalid_arguments"),
                    "exactly one of letsencrypt and custom_certificate is required",
                ));
            }
        };
        let ts = now();
        let mut cert = Certificate {
            id: new_id(),
            lb_id: lb_id.to_string(),
            name: req.name.clone(),
            certificate_type: certificate_type.to_string(),
            fingerprint: format!("{:x}", uuid::Uuid::new_v4().as_u128()),
            common_name,
            subject_alternative_name: sans,
            not_valid_before: None,
            not_valid_after: None,
            status: CERT_STATUS_PENDING.to_string(),
            status_details: None,
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        if settle == 0 {
            cert.settle(&state);
        }
        o.certificates.push(Tracked::new(cert.clone(), settle));
        Ok(cert)
    }

    async fn get_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<Certificate> {
        let state = self.enter(ctx, format!("get_certificate {zone}/{id}"))?;
        let mut o = self.lock_objects();
        poll(&mut o.certificates, id, &state).ok_or_else(|| ApiError::not_found("certificate", id))
    }

    async fn update_certificate(
        &self,
        ctx: &Context,
        zone: &Zone,
        id: &str,
        name: &str,
    ) -> Result<Certificate> {
        drop(self.enter(ctx, format!("update_certificate {zone}/{id}"))?);
        let mut o = self.lock_objects();
        let t = o
            .certificates
            .iter_mut()
            .find(|t| t.item.id == id)
            .ok_or_else(|| ApiError::not_found("certificate", id))?;
        t.item.name = name.to_string();
        t.item.updated_at = Some(now());
        Ok(t.item.clone())
    }

    async fn delete_certificate(&self, ctx: &Context, zone: &Zone, id: &str) -> Result<()> {
        drop(self.enter(ctx, format!("delete_certificate {zone}/{id}"))?);
        let mut o = self.lock_objects();
        if !begin_delete(&mut o.certificates, id, 0) {
            return Err(ApiError::not_found("certificate", id));
        }
        Ok(())
    }
}

fn apply_backend_spec(backend: &mut Backend, spec: &BackendSpec) {
    backend.name = spec.name.clone();
    backend.forward_protocol = spec.forward_protocol.clone();
    backend.forward_port = spec.forward_port;
    backend.forward_port_algorithm = spec.forward_port_algorithm.clone();
    backend.sticky_sessions = spec.sticky_sessions.clone();
    backend.sticky_sessions_cookie_name = spec.sticky_sessions_cookie_name.clone();
    backend.server_ip = spec.server_ip.clone();
    backend.timeout_server = spec.timeout_server;
    backend.timeout_connect = spec.timeout_connect;
    backend.timeout_tunnel = spec.timeout_tunnel;
    backend.on_marked_down_action = spec.on_marked_down_action.clone();
    backend.proxy_protocol = spec.proxy_protocol.clone();
    backend.send_proxy_v2 = spec.proxy_protocol == "proxy_protocol_v2";
    if let Some(hc) = &spec.health_check {
        backend.health_check = hc.clone();
    }
}

#[async_trait]
impl K8sApi for FakeCloud {
    async fn create_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        req: &CreateClusterRequest,
    ) -> Result<Cluster> {
        let settle = self.enter(ctx, format!("create_cluster {region}"))?.settle_polls;
        let ts = now();
        let id = new_id();
        let cluster = Cluster {
            cluster_url: format!("https://{id}.api.k8s.{region}.scw.cloud:6443"),
            wildcard_dns: format!("*.{id}.nodes.k8s.{region}.scw.cloud"),
            id,
            name: req.name.clone(),
            description: req.description.clone(),
            region: region.clone(),
            organization_id: FAKE_ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone().unwrap_or_else(|| FAKE_PROJECT_ID.to_string()),
            version: req.version.clone(),
            cni: req.cni.clone(),
            status: if settle == 0 { "ready" } else { "creating" }.to_string(),
            cluster_type: req.cluster_type.clone().unwrap_or_else(|| "kapsule".to_string()),
            tags: req.tags.clone(),
            private_network_id: req.private_network_id.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        self.lock_objects()
            .clusters
            .push(Tracked::new(cluster.clone(), settle));
        Ok(cluster)
    }

    async fn get_cluster(&self, ctx: &Context, region: &Region, id: &str) -> Result<Cluster> {
        let state = self.enter(ctx, format!("get_cluster {region}/{id}"))?;
        let mut o = self.lock_objects();
        poll(&mut o.clusters, id, &state)
            .filter(|c| c.region == *region)
            .ok_or_else(|| ApiError::not_found("cluster", id))
    }

    async fn update_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdateClusterRequest,
    ) -> Result<Cluster> {
        drop(self.enter(ctx, format!("update_cluster {region}/{id}"))?);
        let mut o = self.lock_objects();
        let t = o
            .clusters
            .iter_mut()
            .find(|t| t.item.id == id && !t.deleting)
            .ok_or_else(|| ApiError::not_found("cluster", id))?;
        if let Some(name) = &req.name {
            t.item.name = name.clone();
        }
        if let Some(d) = &req.description {
            t.item.description = d.clone();
        }
        if let Some(tags) = &req.tags {
            t.item.tags = tags.clone();
        }
        t.item.updated_at = Some(now());
        Ok(t.item.clone())
    }

    async fn upgrade_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        version: &str,
    ) -> Result<Cluster> {
        let settle = self
            .enter(ctx, format!("upgrade_cluster {region}/{id} {version}"))?
            .settle_polls;
        let mut o = self.lock_objects();
        let t = o
            .clusters
            .iter_mut()
            .find(|t| t.item.id == id && !t.deleting)
            .ok_or_else(|| ApiError::not_found("cluster", id))?;
        t.item.version = version.to_string();
        if settle > 0 {
            t.item.status = "updating".to_string();
            t.settle_in = settle;
        }
        Ok(t.item.clone())
    }

    async fn delete_cluster(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        with_additional_resources: bool,
    ) -> Result<()> {
        let settle = self
            .enter(
                ctx,
                format!(
                    "delete_cluster {region}/{id} with_additional_resources={with_additional_resources}"
                ),
            )?
            .settle_polls;
        let mut o = self.lock_objects();
        if !begin_delete(&mut o.clusters, id, settle) {
            return Err(ApiError::not_found("cluster", id));
        }
        o.pools.retain(|t| t.item.cluster_id != id);
        Ok(())
    }

    async fn list_clusters(
        &self,
        ctx: &Context,
        region: &Region,
        req: &ListRequest,
    ) -> Result<Vec<Cluster>> {
        drop(self.enter(ctx, format!("list_clusters {region}"))?);
        Ok(self
            .lock_objects()
            .clusters
            .iter()
            .filter(|t| t.item.region == *region)
            .map(|t| &t.item)
            .filter(|c| name_matches(&req.name, &c.name))
            .filter(|c| req.project_id.as_ref().is_none_or(|p| *p == c.project_id))
            .cloned()
            .collect())
    }

    async fn create_pool(
        &self,
        ctx: &Context,
        region: &Region,
        cluster_id: &str,
        req: &CreatePoolRequest,
    ) -> Result<Pool> {
        let settle = self
            .enter(ctx, format!("create_pool {region}/{cluster_id}"))?
            .settle_polls;
        let mut o = self.lock_objects();
        let cluster = o
            .clusters
            .iter()
            .find(|t| t.item.id == cluster_id && !t.deleting)
            .map(|t| t.item.clone())
            .ok_or_else(|| ApiError::not_found("cluster", cluster_id))?;
        let ts = now();
        let pool = Pool {
            id: new_id(),
            cluster_id: cluster_id.to_string(),
            name: req.name.clone(),
            node_type: req.node_type.clone(),
            size: req.size,
            min_size: req.min_size.unwrap_or(req.size),
            max_size: req.max_size.unwrap_or(req.size),
            autoscaling: req.autoscaling,
            autohealing: req.autohealing,
            status: if settle == 0 { "ready" } else { "scaling" }.to_string(),
            version: cluster.version,
            tags: req.tags.clone(),
            zone: req.zone.clone().unwrap_or_else(|| Zone::first_of(region)),
            region: region.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        o.pools.push(Tracked::new(pool.clone(), settle));
        Ok(pool)
    }

    async fn get_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<Pool> {
        let state = self.enter(ctx, format!("get_pool {region}/{id}"))?;
        let mut o = self.lock_objects();
        poll(&mut o.pools, id, &state)
            .filter(|p| p.region == *region)
            .ok_or_else(|| ApiError::not_found("pool", id))
    }

    async fn update_pool(
        &self,
        ctx: &Context,
        region: &Region,
        id: &str,
        req: &UpdatePoolRequest,
    ) -> Result<Pool> {
        let settle = self
            .enter(ctx, format!("update_pool {region}/{id}"))?
            .settle_polls;
        let mut o = self.lock_objects();
        let t = o
            .pools
            .iter_mut()
            .find(|t| t.item.id == id && !t.deleting)
            .ok_or_else(|| ApiError::not_found("pool", id))?;
        if let Some(size) = req.size {
            if size != t.item.size && settle > 0 {
                t.item.status = "scaling".to_string();
                t.settle_in = settle;
            }
            t.item.size = size;
        }
        if let Some(v) = req.min_size {
            t.item.min_size = v;
        }
        if let Some(v) = req.max_size {
            t.item.max_size = v;
        }
        if let Some(v) = req.autoscaling {
            t.item.autoscaling = v;
        }
        if let Some(v) = req.autohealing {
            t.item.autohealing = v;
        }
        if let Some(tags) = &req.tags {
            t.item.tags = tags.clone();
        }
        t.item.updated_at = Some(now());
        Ok(t.item.clone())
    }

    async fn delete_pool(&self, ctx: &Context, region: &Region, id: &str) -> Result<()> {
        let settle = self
            .enter(ctx, format!("delete_pool {region}/{id}"))?
            .settle_polls;
        let mut o = self.lock_objects();
        if !begin_delete(&mut o.pools, id, settle) {
            return Err(ApiError::not_found("pool", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::Classify;

    fn zone() -> Zone {
        "fr-par-1".parse().unwrap()
    }

    #[tokio::test]
    async fn test_lb_settles_after_polls() {
        let cloud = FakeCloud::new().with_settle_polls(2);
        let ctx = Context::background();
        let lb = cloud
            .create_lb(&ctx, &zone(), &CreateLbRequest::default())
            .await
            .unwrap();
        assert_eq!(lb.status, "to_create");
        let first = cloud.get_lb(&ctx, &zone(), &lb.id).await.unwrap();
        assert_eq!(first.status, "to_create");
        let second = cloud.get_lb(&ctx, &zone(), &lb.id).await.unwrap();
        assert_eq!(second.status, LB_STATUS_READY);
    }

    #[tokio::test]
    async fn test_delete_disappears_after_polls() {
        let cloud = FakeCloud::new();
        let ctx = Context::background();
        let lb = cloud
            .create_lb(&ctx, &zone(), &CreateLbRequest::default())
            .await
            .unwrap();
        cloud.delete_lb(&ctx, &zone(), &lb.id, false).await.unwrap();
        assert_eq!(
            cloud.get_lb(&ctx, &zone(), &lb.id).await.unwrap().status,
            "deleting"
        );
        let gone = cloud.get_lb(&ctx, &zone(), &lb.id).await.unwrap_err();
        assert!(gone.is_not_found());
    }

    #[tokio::test]
    async fn test_fail_next_and_call_log() {
        let cloud = FakeCloud::new();
        let ctx = Context::background();
        cloud.fail_next(403, "permissions_denied");
        let err = cloud.get_group(&ctx, "g").await.unwrap_err();
        assert!(err.is_forbidden());
        assert!(cloud.get_group(&ctx, "g").await.unwrap_err().is_not_found());
        assert_eq!(cloud.calls(), vec!["get_group g", "get_group g"]);
    }

    #[tokio::test]
    async fn test_member_order_not_preserved() {
        let cloud = FakeCloud::new();
        let ctx = Context::background();
        let g = cloud
            .create_group(&ctx, &CreateGroupRequest::default())
            .await
            .unwrap();
        for u in ["u1", "u2"] {
            cloud
                .add_group_member(&ctx, &g.id, &GroupMember::UserId(u.into()))
                .await
                .unwrap();
        }
        let read = cloud.get_group(&ctx, &g.id).await.unwrap();
        assert_eq!(read.user_ids, vec!["u2", "u1"]);
    }
}
