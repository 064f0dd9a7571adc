//! IAM API (`/iam/v1alpha1`): SSH keys, API keys, groups, policies

use crate::client::ScwClient;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scw_core::Context;
use serde::{Deserialize, Serialize};

const IAM: &str = "/iam/v1alpha1";

#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_ssh_key(&self, ctx: &Context, req: &CreateSshKeyRequest) -> Result<SshKey>;
    async fn get_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey>;
    async fn update_ssh_key(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdateSshKeyRequest,
    ) -> Result<SshKey>;
    async fn enable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey>;
    async fn disable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey>;
    async fn delete_ssh_key(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn list_ssh_keys(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<SshKey>>;

    async fn create_api_key(&self, ctx: &Context, req: &CreateApiKeyRequest) -> Result<ApiKey>;
    async fn get_api_key(&self, ctx: &Context, access_key: &str) -> Result<ApiKey>;
    async fn update_api_key(
        &self,
        ctx: &Context,
        access_key: &str,
        req: &UpdateApiKeyRequest,
    ) -> Result<ApiKey>;
    async fn delete_api_key(&self, ctx: &Context, access_key: &str) -> Result<()>;

    async fn create_group(&self, ctx: &Context, req: &CreateGroupRequest) -> Result<Group>;
    async fn get_group(&self, ctx: &Context, id: &str) -> Result<Group>;
    async fn update_group(&self, ctx: &Context, id: &str, req: &UpdateGroupRequest)
    -> Result<Group>;
    async fn delete_group(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn list_groups(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<Group>>;
    async fn add_group_member(&self, ctx: &Context, group_id: &str, member: &GroupMember)
    -> Result<Group>;
    async fn remove_group_member(
        &self,
        ctx: &Context,
        group_id: &str,
        member: &GroupMember,
    ) -> Result<Group>;

    async fn create_policy(&self, ctx: &Context, req: &CreatePolicyRequest) -> Result<Policy>;
    async fn get_policy(&self, ctx: &Context, id: &str) -> Result<Policy>;
    async fn update_policy(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdatePolicyRequest,
    ) -> Result<Policy>;
    async fn delete_policy(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn list_rules(&self, ctx: &Context, policy_id: &str) -> Result<Vec<Rule>>;
    async fn set_rules(&self, ctx: &Context, policy_id: &str, rules: &[RuleSpecs])
    -> Result<Vec<Rule>>;
}

#[async_trait]
impl IamApi for ScwClient {
    async fn create_ssh_key(&self, ctx: &Context, req: &CreateSshKeyRequest) -> Result<SshKey> {
        self.post(ctx, &format!("{IAM}/ssh-keys"), req).await
    }

    async fn get_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        self.get(ctx, &format!("{IAM}/ssh-keys/{id}"), &[]).await
    }

    async fn update_ssh_key(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdateSshKeyRequest,
    ) -> Result<SshKey> {
        self.patch(ctx, &format!("{IAM}/ssh-keys/{id}"), req).await
    }

    async fn enable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        self.post(ctx, &format!("{IAM}/ssh-keys/{id}/enable"), &Empty {})
            .await
    }

    async fn disable_ssh_key(&self, ctx: &Context, id: &str) -> Result<SshKey> {
        self.post(ctx, &format!("{IAM}/ssh-keys/{id}/disable"), &Empty {})
            .await
    }

    async fn delete_ssh_key(&self, ctx: &Context, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{IAM}/ssh-keys/{id}"), &[]).await
    }

    async fn list_ssh_keys(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<SshKey>> {
        self.list_all(
            ctx,
            &format!("{IAM}/ssh-keys"),
            &req.query(),
            |p: ListSshKeysResponse| (p.ssh_keys, p.total_count),
        )
        .await
    }

    async fn create_api_key(&self, ctx: &Context, req: &CreateApiKeyRequest) -> Result<ApiKey> {
        self.post(ctx, &format!("{IAM}/api-keys"), req).await
    }

    async fn get_api_key(&self, ctx: &Context, access_key: &str) -> Result<ApiKey> {
        self.get(ctx, &format!("{IAM}/api-keys/{access_key}"), &[])
            .await
    }

    async fn update_api_key(
        &self,
        ctx: &Context,
        access_key: &str,
        req: &UpdateApiKeyRequest,
    ) -> Result<ApiKey> {
        self.patch(ctx, &format!("{IAM}/api-keys/{access_key}"), req)
            .await
    }

    async fn delete_api_key(&self, ctx: &Context, access_key: &str) -> Result<()> {
        self.delete(ctx, &format!("{IAM}/api-keys/{access_key}"), &[])
            .await
    }

    async fn create_group(&self, ctx: &Context, req: &CreateGroupRequest) -> Result<Group> {
        self.post(ctx, &format!("{IAM}/groups"), req).await
    }

    async fn get_group(&self, ctx: &Context, id: &str) -> Result<Group> {
        self.get(ctx, &format!("{IAM}/groups/{id}"), &[]).await
    }

    async fn update_group(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdateGroupRequest,
    ) -> Result<Group> {
        self.patch(ctx, &format!("{IAM}/groups/{id}"), req).await
    }

    async fn delete_group(&self, ctx: &Context, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{IAM}/groups/{id}"), &[]).await
    }

    async fn list_groups(&self, ctx: &Context, req: &ListRequest) -> Result<Vec<Group>> {
        self.list_all(
            ctx,
            &format!("{IAM}/groups"),
            &req.query(),
            |p: ListGroupsResponse| (p.groups, p.total_count),
        )
        .await
    }

    async fn add_group_member(
        &self,
        ctx: &Context,
        group_id: &str,
        member: &GroupMember,
    ) -> Result<Group> {
        self.post(ctx, &format!("{IAM}/groups/{group_id}/add-member"), member)
            .await
    }

    async fn remove_group_member(
        &self,
        ctx: &Context,
        group_id: &str,
        member: &GroupMember,
    ) -> Result<Group> {
        self.post(ctx, &format!("{IAM}/groups/{group_id}/remove-member"), member)
            .await
    }

    async fn create_policy(&self, ctx: &Context, req: &CreatePolicyRequest) -> Result<Policy> {
        self.post(ctx, &format!("{IAM}/policies"), req).await
    }

    async fn get_policy(&self, ctx: &Context, id: &str) -> Result<Policy> {
        self.get(ctx, &format!("{IAM}/policies/{id}"), &[]).await
    }

    async fn update_policy(
        &self,
        ctx: &Context,
        id: &str,
        req: &UpdatePolicyRequest,
    ) -> Result<Policy> {
        self.patch(ctx, &format!("{IAM}/policies/{id}"), req).await
    }

    async fn delete_policy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.delete(ctx, &format!("{IAM}/policies/{id}"), &[]).await
    }

    async fn list_rules(&self, ctx: &Context, policy_id: &str) -> Result<Vec<Rule>> {
        self.list_all(
            ctx,
            &format!("{IAM}/rules"),
            &[("policy_id", policy_id.to_string())],
            |p: ListRulesResponse| (p.rules, p.total_count),
        )
        .await
    }

    async fn set_rules(
        &self,
        ctx: &Context,
        policy_id: &str,
        rules: &[RuleSpecs],
    ) -> Result<Vec<Rule>> {
        let body = SetRulesRequest { policy_id, rules };
        let resp: SetRulesResponse = self.put(ctx, &format!("{IAM}/rules"), &body).await?;
        Ok(resp.rules)
    }
}

// ============ API Types ============

/// Name and scope filters shared by the list endpoints
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub name: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
}

impl ListRequest {
    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(v) = &self.name {
            q.push(("name", v.clone()));
        }
        if let Some(v) = &self.organization_id {
            q.push(("organization_id", v.clone()));
        }
        if let Some(v) = &self.project_id {
            q.push(("project_id", v.clone()));
        }
        q
    }
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshKey {
    pub id: String,
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    pub organization_id: String,
    pub project_id: String,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSshKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSshKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListSshKeysResponse {
    #[serde(default)]
    ssh_keys: Vec<SshKey>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub access_key: String,
    /// Only present in the create reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    pub application_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_project_id: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub creation_ip: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "(sensitive value)"))
            .field("application_id", &self.application_id)
            .field("user_id", &self.user_id)
            .field("description", &self.description)
            .field("default_project_id", &self.default_project_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateApiKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateApiKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub application_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Body of add-member / remove-member; exactly one field is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMember {
    UserId(String),
    ApplicationId(String),
}

#[derive(Debug, Deserialize)]
struct ListGroupsResponse {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub application_id: Option<String>,
    #[serde(default)]
    pub no_principal: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSpecs {
    pub permission_set_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub permission_set_names: Vec<String>,
    pub project_ids: Option<Vec<String>>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub rules: Vec<RuleSpecs>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_principal: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_principal: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SetRulesRequest<'a> {
    policy_id: &'a str,
    rules: &'a [RuleSpecs],
}

#[derive(Debug, Deserialize)]
struct SetRulesResponse {
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
struct ListRulesResponse {
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    total_count: u64,
}
