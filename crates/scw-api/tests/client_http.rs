//! Client behaviour against a mock HTTP server

use pretty_assertions::assert_eq;
use scw_api::iam::{IamApi, ListRequest};
use scw_api::lb::LbApi;
use scw_api::{ApiError, ClientConfig, ScwClient};
use scw_core::{Classify, Context, ErrorKind, Zone};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "11111111-1111-4111-8111-111111111111";

fn client(server: &MockServer) -> ScwClient {
    ScwClient::new(ClientConfig {
        access_key: "SCWXXXXXXXXXXXXXXXXX".into(),
        secret_key: SECRET.into(),
        api_url: server.uri(),
        user_agent: "scw-provider-test".into(),
    })
    .unwrap()
}

fn ssh_key(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "public_key": "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIE3",
        "fingerprint": "256 SHA256:x",
        "organization_id": "o",
        "project_id": "p",
        "disabled": false,
    })
}

#[tokio::test]
async fn test_sends_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/ssh-keys/k1"))
        .and(header("X-Auth-Token", SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(ssh_key("k1", "main")))
        .expect(1)
        .mount(&server)
        .await;

    let key = client(&server)
        .get_ssh_key(&Context::background(), "k1")
        .await
        .unwrap();
    assert_eq!(key.name, "main");
}

#[tokio::test]
async fn test_error_body_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/groups/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "resource is not found",
            "type": "not_found",
            "resource": "group",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/groups/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "insufficient permissions",
            "type": "permissions_denied",
        })))
        .mount(&server)
        .await;

    let c = client(&server);
    let ctx = Context::background();
    let err = c.get_group(&ctx, "missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("resource is not found"));
    assert!(matches!(
        err,
        ApiError::Http { ref resource, .. } if resource.as_deref() == Some("group")
    ));

    let err = c.get_group(&ctx, "locked").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_list_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/ssh-keys"))
        .and(query_param("page", "1"))
        .and(query_param("name", "ops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ssh_keys": [ssh_key("k1", "ops-a")],
            "total_count": 2,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/ssh-keys"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ssh_keys": [ssh_key("k2", "ops-b")],
            "total_count": 2,
        })))
        .mount(&server)
        .await;

    let req = ListRequest {
        name: Some("ops".into()),
        ..ListRequest::default()
    };
    let keys = client(&server)
        .list_ssh_keys(&Context::background(), &req)
        .await
        .unwrap();
    let ids: Vec<_> = keys.iter().map(|k| k.id.as_str()).collect();
    assert_eq!(ids, vec!["k1", "k2"]);
}

#[tokio::test]
async fn test_delete_lb_query_and_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/lb/v1/zones/nl-ams-1/lbs/lb1"))
        .and(query_param("release_ip", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let zone: Zone = "nl-ams-1".parse().unwrap();
    client(&server)
        .delete_lb(&Context::background(), &zone, "lb1", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_context_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iam/v1alpha1/ssh-keys/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ssh_key("slow", "slow"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let ctx = Context::background().with_timeout(Duration::from_millis(50));
    let err = client(&server).get_ssh_key(&ctx, "slow").await.unwrap_err();
    assert!(matches!(err, ApiError::Context(_)));
}
