mod common;

use common::Harness;
use scw_api::K8sApi;
use scw_api::fake::FakeCloud;
use scw_api::iam::ListRequest;
use scw_core::Region;
use serde_json::{Value as Json, json};

const CLUSTER: &str = "scaleway_k8s_cluster";
const POOL: &str = "scaleway_k8s_pool";

fn region() -> Region {
    "fr-par".parse().unwrap()
}

fn uuid_of(state: &Json) -> String {
    let id = state["id"].as_str().unwrap();
    id.rsplit('/').next().unwrap().to_string()
}

fn cluster_config() -> Json {
    json!({"name": "prod", "version": "1.30.2", "cni": "cilium"})
}

fn pool_config(cluster: &Json) -> Json {
    json!({"cluster_id": cluster["id"], "node_type": "DEV1-M", "size": 1})
}

#[tokio::test]
async fn test_cluster_create_waits_until_ready() {
    let h = Harness::with_cloud(FakeCloud::new().with_settle_polls(2));
    let state = h.create(CLUSTER, cluster_config()).await;
    assert!(state["id"].as_str().unwrap().starts_with("fr-par/"));
    assert_eq!(state["status"], json!("ready"));
    // two polls to settle, then the read after create
    assert!(h.calls_to("get_cluster").len() >= 3);
}

#[tokio::test]
async fn test_cluster_version_upgrades_in_place() {
    let h = Harness::with_cloud(FakeCloud::new().with_settle_polls(2));
    let state = h.create(CLUSTER, cluster_config()).await;
    h.cloud.clear_calls();

    let mut config = cluster_config();
    config["version"] = json!("1.31.1");
    let resp = h.update(CLUSTER, &state, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(
        h.calls_to("upgrade_cluster"),
        vec![format!("upgrade_cluster fr-par/{} 1.31.1", uuid_of(&state))]
    );
    assert!(h.calls_to("update_cluster").is_empty());
    let updated = resp.new_state.unwrap();
    assert_eq!(updated["version"], json!("1.31.1"));
    assert_eq!(updated["status"], json!("ready"));
}

#[tokio::test]
async fn test_cluster_in_error_fails_update() {
    let h = Harness::new();
    let state = h.create(CLUSTER, cluster_config()).await;
    h.cloud.force_status(&uuid_of(&state), "error");

    let mut config = cluster_config();
    config["description"] = json!("broken");
    let resp = h.update(CLUSTER, &state, &config).await;
    let err = resp.diagnostics.iter().find(|d| d.is_error()).unwrap();
    assert!(err.detail.contains("status error"), "{}", err.detail);
}

#[tokio::test]
async fn test_cluster_delete_waits_until_gone() {
    let h = Harness::with_cloud(FakeCloud::new().with_settle_polls(2));
    let state = h.create(CLUSTER, cluster_config()).await;
    h.cloud.clear_calls();

    let resp = h.delete(CLUSTER, &state).await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    assert_eq!(resp.new_state, Some(Json::Null));
    assert_eq!(
        h.calls_to("delete_cluster"),
        vec![format!(
            "delete_cluster fr-par/{} with_additional_resources=false",
            uuid_of(&state)
        )]
    );
    // deleting, deleting, then not found
    assert_eq!(h.calls_to("get_cluster").len(), 3);
    let left = h
        .cloud
        .list_clusters(&h.ctx, &region(), &ListRequest::default())
        .await
        .unwrap();
    assert!(left.is_empty());
}

#[tokio::test]
async fn test_pool_size_change_updates_in_place() {
    let h = Harness::with_cloud(FakeCloud::new().with_settle_polls(2));
    let cluster = h.create(CLUSTER, cluster_config()).await;
    let pool = h.create(POOL, pool_config(&cluster)).await;
    assert_eq!(pool["status"], json!("ready"));
    assert_eq!(pool["version"], json!("1.30.2"));
    h.cloud.clear_calls();

    let mut config = pool_config(&cluster);
    config["size"] = json!(3);
    let resp = h.update(POOL, &pool, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(h.calls_to("update_pool").len(), 1);
    assert!(h.calls_to("get_pool").len() >= 2);
    let updated = resp.new_state.unwrap();
    assert_eq!(updated["size"], json!(3));
    assert_eq!(updated["status"], json!("ready"));
    assert_eq!(updated["id"], pool["id"]);
}

#[tokio::test]
async fn test_pool_node_type_change_replaces() {
    let h = Harness::new();
    let cluster = h.create(CLUSTER, cluster_config()).await;
    let pool = h.create(POOL, pool_config(&cluster)).await;

    let mut config = pool_config(&cluster);
    config["node_type"] = json!("GP1-XS");
    let plan = h.plan(POOL, Some(&pool), &config).await;
    assert_eq!(plan.requires_replace, Some(vec!["node_type".to_string()]));

    // case-only spelling is the same offer
    config["node_type"] = json!("dev1-m");
    let plan = h.plan(POOL, Some(&pool), &config).await;
    assert_eq!(plan.requires_replace, Some(vec![]));
}

#[tokio::test]
async fn test_pool_in_warning_is_settled() {
    let h = Harness::new();
    let cluster = h.create(CLUSTER, cluster_config()).await;
    h.cloud.settle_pools_as("warning");
    let pool = h.create(POOL, pool_config(&cluster)).await;
    assert_eq!(pool["status"], json!("warning"));

    let mut config = pool_config(&cluster);
    config["size"] = json!(2);
    let resp = h.update(POOL, &pool, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(resp.new_state.unwrap()["status"], json!("warning"));
}
