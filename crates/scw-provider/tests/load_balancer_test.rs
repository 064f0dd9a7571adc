mod common;

use common::{Harness, PN_1, PN_2};
use scw_api::LbApi;
use scw_api::fake::FakeCloud;
use scw_core::{Classify, Severity, Zone};
use scw_provider::Request;
use serde_json::{Value as Json, json};

const LB: &str = "scaleway_lb";
const BACKEND: &str = "scaleway_lb_backend";
const CERT: &str = "scaleway_lb_certificate";

fn zone() -> Zone {
    "fr-par-1".parse().unwrap()
}

fn lb_uuid(state: &Json) -> String {
    let id = state["id"].as_str().unwrap();
    id.rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn test_lb_created_with_static_private_network() {
    let h = Harness::with_cloud(FakeCloud::new().with_settle_polls(2));
    let state = h
        .create(
            LB,
            json!({
                "name": "web",
                "type": "LB-S",
                "private_network": [{"private_network_id": PN_1, "static_config": ["10.0.0.5"]}],
            }),
        )
        .await;
    assert!(state["id"].as_str().unwrap().starts_with("fr-par-1/"));
    assert_eq!(state["zone"], json!("fr-par-1"));
    assert_eq!(state["region"], json!("fr-par"));

    let pns = state["private_network"].as_array().unwrap();
    assert_eq!(pns.len(), 1);
    assert_eq!(pns[0]["private_network_id"], json!(PN_1));
    assert_eq!(pns[0]["static_config"], json!(["10.0.0.5"]));
    assert_eq!(pns[0]["status"], json!("ready"));
}

#[tokio::test]
async fn test_lb_static_address_change_reattaches() {
    let h = Harness::new();
    let state = h
        .create(
            LB,
            json!({
                "type": "LB-S",
                "private_network": [
                    {"private_network_id": PN_1, "static_config": ["10.0.0.5"]},
                    {"private_network_id": PN_2},
                ],
            }),
        )
        .await;
    h.cloud.clear_calls();

    let mut planned = state.clone();
    planned["private_network"] = json!([
        {"private_network_id": PN_1, "static_config": ["10.0.0.6"]},
        {"private_network_id": PN_2, "dhcp_config": true},
    ]);
    let resp = h.update_to(LB, &state, planned).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);

    let lb_id = lb_uuid(&state);
    assert_eq!(
        h.calls_to("detach_private_network"),
        vec![format!("detach_private_network fr-par-1/{lb_id} {PN_1}")]
    );
    assert_eq!(
        h.calls_to("attach_private_network"),
        vec![format!("attach_private_network fr-par-1/{lb_id} {PN_1} ips=10.0.0.6")]
    );
    assert!(h.calls_to("update_lb").is_empty());
}

#[tokio::test]
async fn test_failed_attachment_is_rolled_back() {
    let h = Harness::new();
    h.cloud.fail_attach(PN_2);
    let resp = h
        .create_raw(
            LB,
            json!({"type": "LB-S", "private_network": [{"private_network_id": PN_2}]}),
        )
        .await;
    assert!(resp.diagnostics.has_errors());

    // the load balancer exists and stays in state so it can be cleaned up
    let state = resp.new_state.unwrap();
    assert!(state["id"].is_string());
    let attached = h
        .cloud
        .list_lb_private_networks(&h.ctx, &zone(), &lb_uuid(&state))
        .await
        .unwrap();
    assert!(attached.is_empty());
}

#[tokio::test]
async fn test_lb_delete_detaches_first() {
    let h = Harness::new();
    let state = h
        .create(
            LB,
            json!({"type": "LB-S", "private_network": [{"private_network_id": PN_1}]}),
        )
        .await;
    h.cloud.clear_calls();

    let resp = h.delete(LB, &state).await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    let calls = h.cloud.calls();
    let detach = calls
        .iter()
        .position(|c| c.starts_with("detach_private_network"))
        .unwrap();
    let delete = calls.iter().position(|c| c.starts_with("delete_lb")).unwrap();
    assert!(detach < delete);
    assert!(calls[delete].ends_with("release_ip=false"));
}

#[tokio::test]
async fn test_every_failed_attachment_is_rolled_back() {
    let h = Harness::new();
    h.cloud.fail_attach(PN_1);
    h.cloud.fail_attach(PN_2);
    let resp = h
        .create_raw(
            LB,
            json!({
                "type": "LB-S",
                "private_network": [
                    {"private_network_id": PN_1},
                    {"private_network_id": PN_2},
                ],
            }),
        )
        .await;
    let err = resp
        .diagnostics
        .iter()
        .find(|d| d.is_error())
        .unwrap();
    assert!(err.detail.contains(PN_1), "{}", err.detail);
    assert!(err.detail.contains(PN_2), "{}", err.detail);
    assert_eq!(h.calls_to("detach_private_network").len(), 2);

    let state = resp.new_state.unwrap();
    let attached = h
        .cloud
        .list_lb_private_networks(&h.ctx, &zone(), &lb_uuid(&state))
        .await
        .unwrap();
    assert!(attached.is_empty());
}

#[tokio::test]
async fn test_lb_in_error_status_can_be_deleted() {
    let h = Harness::new();
    let state = h
        .create(
            LB,
            json!({"type": "LB-S", "private_network": [{"private_network_id": PN_1}]}),
        )
        .await;
    let lb_id = lb_uuid(&state);
    h.cloud.force_status(&lb_id, "error");
    h.cloud.clear_calls();

    let resp = h.delete(LB, &state).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(resp.new_state, Some(Json::Null));
    assert_eq!(
        h.calls_to("detach_private_network"),
        vec![format!("detach_private_network fr-par-1/{lb_id} {PN_1}")]
    );
    assert_eq!(
        h.calls_to("delete_lb"),
        vec![format!("delete_lb fr-par-1/{lb_id} release_ip=false")]
    );
    let err = h.cloud.get_lb(&h.ctx, &zone(), &lb_id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_import_regional_id_is_zoned() {
    let h = Harness::new();
    let state = h.create(LB, json!({"name": "imp", "type": "LB-S"})).await;
    let resp = h
        .call(Request::Import {
            type_name: LB.to_string(),
            id: format!("fr-par/{}", lb_uuid(&state)),
            timeouts: Default::default(),
        })
        .await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    let imported = resp.new_state.unwrap();
    assert_eq!(imported["id"], state["id"]);
    assert_eq!(imported["name"], json!("imp"));
}

#[tokio::test]
async fn test_upgrade_v0_state() {
    let h = Harness::new();
    let resp = h
        .call(Request::UpgradeState {
            type_name: LB.to_string(),
            version: 0,
            raw_state: json!({
                "id": format!("nl-ams/{PN_1}"),
                "region": "nl-ams",
                "type": "LB-S",
            }),
        })
        .await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    let upgraded = resp.upgraded_state.unwrap();
    assert_eq!(upgraded["id"], json!(format!("nl-ams-1/{PN_1}")));
    assert_eq!(upgraded["zone"], json!("nl-ams-1"));
}

#[tokio::test]
async fn test_certificate_error_is_a_warning() {
    let h = Harness::new();
    h.cloud.fail_certificate("bad.example.com");
    let lb = h.create(LB, json!({"type": "LB-S"})).await;

    let resp = h
        .create_raw(
            CERT,
            json!({
                "lb_id": lb["id"],
                "letsencrypt": [{"common_name": "bad.example.com"}],
            }),
        )
        .await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    let warning = resp
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Warning)
        .unwrap();
    assert!(warning.detail.contains("domain validation failed"));
    let state = resp.new_state.unwrap();
    assert_eq!(state["status"], json!("error"));

    let read = h.read(CERT, &state).await;
    assert!(!read.diagnostics.has_errors());
    assert!(!read.diagnostics.is_empty());
}

#[tokio::test]
async fn test_certificate_requires_a_source() {
    let h = Harness::new();
    let resp = h
        .call(Request::Validate {
            type_name: CERT.to_string(),
            kind: Default::default(),
            config: json!({"lb_id": format!("fr-par-1/{PN_1}")}),
        })
        .await;
    assert!(resp.diagnostics.has_errors());
}

async fn backend(h: &Harness, mut config: Json) -> (Json, Json) {
    let lb = h.create(LB, json!({"type": "LB-S"})).await;
    config["lb_id"] = lb["id"].clone();
    let state = h.create(BACKEND, config).await;
    (lb, state)
}

fn backend_config() -> Json {
    json!({"forward_protocol": "http", "forward_port": 80})
}

#[tokio::test]
async fn test_backend_duration_spelling_is_not_a_diff() {
    let h = Harness::new();
    let mut config = backend_config();
    config["timeout_server"] = json!("30s");
    let (lb, state) = backend(&h, config.clone()).await;
    assert_eq!(state["timeout_server"], json!("30s"));

    config["lb_id"] = lb["id"].clone();
    config["timeout_server"] = json!("30.0s");
    let plan = h.plan(BACKEND, Some(&state), &config).await;
    assert!(!plan.diagnostics.has_errors(), "{:?}", plan.diagnostics);
    assert_eq!(plan.changed_paths, Some(vec![]));
    assert_eq!(plan.requires_replace, Some(vec![]));
}

#[tokio::test]
async fn test_backend_legacy_proxy_flag_sent_once() {
    let h = Harness::new();
    let mut config = backend_config();
    config["send_proxy_v2"] = json!(true);
    let (lb, state) = backend(&h, config.clone()).await;
    assert_eq!(
        h.calls_to("create_backend"),
        vec![format!(
            "create_backend fr-par-1/{} proxy=proxy_protocol_v2",
            lb_uuid(&lb)
        )]
    );
    assert_eq!(state["proxy_protocol"], json!("v2"));
    assert_eq!(state["send_proxy_v2"], json!(true));

    // only the deprecated flag changes, so it decides the value sent
    config["lb_id"] = lb["id"].clone();
    config["send_proxy_v2"] = json!(false);
    let resp = h.update(BACKEND, &state, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(
        h.calls_to("update_backend"),
        vec![format!(
            "update_backend fr-par-1/{} proxy=proxy_protocol_none",
            lb_uuid(&state)
        )]
    );
    let updated = resp.new_state.unwrap();
    assert_eq!(updated["proxy_protocol"], json!("none"));
    assert_eq!(updated["send_proxy_v2"], json!(false));
}

#[tokio::test]
async fn test_backend_proxy_protocol_wins_on_update() {
    let h = Harness::new();
    let mut config = backend_config();
    config["proxy_protocol"] = json!("v1");
    let (lb, state) = backend(&h, config.clone()).await;
    assert!(h.calls_to("create_backend")[0].ends_with("proxy=proxy_protocol_v1"));

    config["lb_id"] = lb["id"].clone();
    config["proxy_protocol"] = json!("v2_ssl");
    config["send_proxy_v2"] = json!(true);
    let resp = h.update(BACKEND, &state, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    let updates = h.calls_to("update_backend");
    assert_eq!(updates.len(), 1);
    assert!(updates[0].ends_with("proxy=proxy_protocol_v2_ssl"), "{}", updates[0]);
    assert_eq!(resp.new_state.unwrap()["proxy_protocol"], json!("v2_ssl"));
}

#[tokio::test]
async fn test_backend_health_check_only_change() {
    let h = Harness::new();
    let (lb, state) = backend(&h, backend_config()).await;
    assert_eq!(state["health_check_max_retries"], json!(2));
    h.cloud.clear_calls();

    let mut config = backend_config();
    config["lb_id"] = lb["id"].clone();
    config["health_check_max_retries"] = json!(5);
    let resp = h.update(BACKEND, &state, &config).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);
    assert_eq!(h.calls_to("update_health_check").len(), 1);
    assert!(h.calls_to("update_backend").is_empty());
    assert_eq!(resp.new_state.unwrap()["health_check_max_retries"], json!(5));
}
