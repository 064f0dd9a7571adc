mod common;

use common::{Harness, KEY_1, USER_A};
use scw_core::Severity;
use scw_provider::Request;
use serde_json::json;

#[tokio::test]
async fn test_group_by_name_ignores_loose_matches() {
    let h = Harness::new();
    let web = h
        .create("scaleway_iam_group", json!({"name": "web", "user_ids": [USER_A]}))
        .await;
    h.create("scaleway_iam_group", json!({"name": "web-admins"})).await;

    let resp = h.lookup("scaleway_iam_group", json!({"name": "web"})).await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    let found = resp.result.unwrap();
    assert_eq!(found["id"], web["id"]);
    assert_eq!(found["group_id"], web["id"]);
    assert_eq!(found["user_ids"], json!([USER_A]));
}

#[tokio::test]
async fn test_group_by_ambiguous_name_fails() {
    let h = Harness::new();
    h.create("scaleway_iam_group", json!({"name": "twin"})).await;
    h.create("scaleway_iam_group", json!({"name": "twin"})).await;

    let resp = h.lookup("scaleway_iam_group", json!({"name": "twin"})).await;
    assert!(resp.result.is_none());
    let err = resp.diagnostics.iter().next().unwrap();
    assert_eq!(err.severity, Severity::Error);
    assert!(err.detail.contains("2 groups"), "{}", err.detail);
}

#[tokio::test]
async fn test_missing_name_is_an_error() {
    let h = Harness::new();
    let resp = h
        .lookup("scaleway_iam_ssh_key", json!({"name": "nobody"}))
        .await;
    assert!(resp.diagnostics.has_errors());
}

#[tokio::test]
async fn test_ssh_key_by_id() {
    let h = Harness::new();
    let key = h
        .create("scaleway_iam_ssh_key", json!({"name": "ci", "public_key": KEY_1}))
        .await;
    let resp = h
        .lookup("scaleway_iam_ssh_key", json!({"ssh_key_id": key["id"]}))
        .await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    let found = resp.result.unwrap();
    assert_eq!(found["name"], json!("ci"));
    assert_eq!(found["public_key"], json!(KEY_1));
}

#[tokio::test]
async fn test_lb_by_zoned_id_and_by_name() {
    let h = Harness::new();
    let lb = h
        .create("scaleway_lb", json!({"name": "front", "type": "LB-S"}))
        .await;

    let by_id = h.lookup("scaleway_lb", json!({"lb_id": lb["id"]})).await;
    assert!(by_id.diagnostics.is_empty(), "{:?}", by_id.diagnostics);
    assert_eq!(by_id.result.unwrap()["name"], json!("front"));

    let by_name = h.lookup("scaleway_lb", json!({"name": "front"})).await;
    assert!(by_name.diagnostics.is_empty(), "{:?}", by_name.diagnostics);
    assert_eq!(by_name.result.unwrap()["id"], lb["id"]);
}

#[tokio::test]
async fn test_id_and_name_conflict() {
    let h = Harness::new();
    let resp = h
        .call(Request::Validate {
            type_name: "scaleway_iam_group".to_string(),
            kind: scw_provider::TypeKind::DataSource,
            config: json!({"group_id": USER_A, "name": "web"}),
        })
        .await;
    assert!(resp.diagnostics.has_errors());
}

#[tokio::test]
async fn test_ephemeral_api_key_is_fresh_each_open() {
    let h = Harness::new();
    let open = || {
        h.call(Request::OpenEphemeral {
            type_name: "scaleway_iam_api_key".to_string(),
            config: json!({"user_id": USER_A}),
        })
    };
    let first = open().await;
    let second = open().await;
    assert!(first.diagnostics.is_empty(), "{:?}", first.diagnostics);
    let (a, b) = (first.result.unwrap(), second.result.unwrap());
    assert!(a["secret_key"].is_string());
    assert_ne!(a["access_key"], b["access_key"]);
}
