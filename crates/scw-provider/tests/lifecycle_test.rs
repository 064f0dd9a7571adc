mod common;

use common::{Harness, KEY_1, KEY_2, USER_A, USER_B, USER_C};
use scw_api::IamApi;
use scw_api::iam::ListRequest;
use scw_api::fake::FAKE_PROJECT_ID;
use scw_core::Context;
use scw_provider::Request;
use scw_provider::protocol::TimeoutsSpec;
use serde_json::{Value as Json, json};
use tokio_util::sync::CancellationToken;

const SSH_KEY: &str = "scaleway_iam_ssh_key";
const GROUP: &str = "scaleway_iam_group";

fn changed(resp: &scw_provider::Response) -> Vec<String> {
    resp.changed_paths.clone().unwrap_or_default()
}

#[tokio::test]
async fn test_ssh_key_create_read_plan_is_stable() {
    let h = Harness::new();
    let config = json!({"name": "deploy", "public_key": format!("{KEY_1} me@laptop")});

    let created = h.create(SSH_KEY, config.clone()).await;
    assert!(created["id"].is_string());
    assert_eq!(created["project_id"], json!(FAKE_PROJECT_ID));
    assert!(created["fingerprint"].as_str().unwrap().starts_with("256 SHA256:"));

    let read = h.read(SSH_KEY, &created).await;
    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    let state = read.new_state.unwrap();
    assert_eq!(state["id"], created["id"]);

    // the comment is dropped remotely but must not show as a change
    let plan = h.plan(SSH_KEY, Some(&state), &config).await;
    assert_eq!(changed(&plan), Vec::<String>::new());
    assert_eq!(plan.requires_replace, Some(vec![]));
}

#[tokio::test]
async fn test_ssh_key_new_public_key_replaces() {
    let h = Harness::new();
    let state = h.create(SSH_KEY, json!({"public_key": KEY_1})).await;
    let plan = h.plan(SSH_KEY, Some(&state), &json!({"public_key": KEY_2})).await;
    assert_eq!(plan.requires_replace, Some(vec!["public_key".to_string()]));
}

#[tokio::test]
async fn test_ssh_key_delete_leaves_nothing() {
    let h = Harness::new();
    let state = h.create(SSH_KEY, json!({"name": "tmp", "public_key": KEY_1})).await;

    let resp = h.delete(SSH_KEY, &state).await;
    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    assert_eq!(resp.new_state, Some(Json::Null));

    let left = h
        .cloud
        .list_ssh_keys(&h.ctx, &ListRequest::default())
        .await
        .unwrap();
    assert!(left.is_empty());

    // deleting again is not an error
    let again = h.delete(SSH_KEY, &state).await;
    assert!(!again.diagnostics.has_errors());
}

#[tokio::test]
async fn test_read_after_out_of_band_delete_drops_state() {
    let h = Harness::new();
    let state = h.create(SSH_KEY, json!({"public_key": KEY_1})).await;
    h.cloud.delete_out_of_band(state["id"].as_str().unwrap());

    let read = h.read(SSH_KEY, &state).await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(read.new_state, Some(Json::Null));
}

#[tokio::test]
async fn test_import_matches_read() {
    let h = Harness::new();
    let created = h
        .create(SSH_KEY, json!({"name": "imported", "public_key": KEY_1}))
        .await;
    let read = h.read(SSH_KEY, &created).await.new_state.unwrap();

    let imported = h
        .call(Request::Import {
            type_name: SSH_KEY.to_string(),
            id: created["id"].as_str().unwrap().to_string(),
            timeouts: TimeoutsSpec::default(),
        })
        .await;
    assert!(imported.diagnostics.is_empty(), "{:?}", imported.diagnostics);
    let imported = imported.new_state.unwrap();
    for attr in ["id", "name", "public_key", "project_id", "fingerprint", "disabled"] {
        assert_eq!(imported[attr], read[attr], "{attr}");
    }
}

#[tokio::test]
async fn test_import_missing_object_fails() {
    let h = Harness::new();
    let resp = h
        .call(Request::Import {
            type_name: SSH_KEY.to_string(),
            id: USER_A.to_string(),
            timeouts: TimeoutsSpec::default(),
        })
        .await;
    assert!(resp.diagnostics.has_errors());
    assert_eq!(resp.new_state, Some(Json::Null));
}

#[tokio::test]
async fn test_group_members_reconciled_by_difference() {
    let h = Harness::new();
    let state = h
        .create(GROUP, json!({"name": "devs", "user_ids": [USER_A, USER_B]}))
        .await;
    assert_eq!(h.calls_to("add_group_member").len(), 2);

    let read = h.read(GROUP, &state).await.new_state.unwrap();
    let same = h
        .plan(GROUP, Some(&read), &json!({"name": "devs", "user_ids": [USER_B, USER_A]}))
        .await;
    assert_eq!(changed(&same), Vec::<String>::new());

    h.cloud.clear_calls();
    let resp = h
        .update(GROUP, &read, &json!({"name": "devs", "user_ids": [USER_B, USER_C]}))
        .await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);

    let id = state["id"].as_str().unwrap();
    assert_eq!(
        h.calls_to("remove_group_member"),
        vec![format!("remove_group_member {id} user_id={USER_A}")]
    );
    assert_eq!(
        h.calls_to("add_group_member"),
        vec![format!("add_group_member {id} user_id={USER_C}")]
    );
    assert!(h.calls_to("update_group").is_empty());

    let mut users: Vec<String> = resp.new_state.unwrap()["user_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    users.sort();
    assert_eq!(users, vec![USER_B.to_string(), USER_C.to_string()]);
}

#[tokio::test]
async fn test_membership_resource_and_removal() {
    let h = Harness::new();
    let group = h.create(GROUP, json!({"name": "ops", "external_membership": true})).await;
    let group_id = group["id"].as_str().unwrap();

    let membership = h
        .create(
            "scaleway_iam_group_membership",
            json!({"group_id": group_id, "user_id": USER_A}),
        )
        .await;
    assert_eq!(membership["id"], json!(format!("{group_id}/user/{USER_A}")));

    let remote = h.cloud.get_group(&h.ctx, group_id).await.unwrap();
    assert_eq!(remote.user_ids, vec![USER_A.to_string()]);

    let gone = h.delete("scaleway_iam_group_membership", &membership).await;
    assert!(gone.diagnostics.is_empty(), "{:?}", gone.diagnostics);
    let remote = h.cloud.get_group(&h.ctx, group_id).await.unwrap();
    assert!(remote.user_ids.is_empty());
}

#[tokio::test]
async fn test_injected_failure_surfaces_as_diagnostic() {
    let h = Harness::new();
    h.cloud.fail_next(403, "permissions_denied");
    let resp = h.create_raw(SSH_KEY, json!({"public_key": KEY_1})).await;
    assert!(resp.diagnostics.has_errors());
    assert_eq!(resp.new_state, Some(Json::Null));
}

#[tokio::test]
async fn test_cancelled_context_stops_create() {
    let h = Harness::new();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = Context::with_token(token);
    let planned = h
        .plan(SSH_KEY, None, &json!({"public_key": KEY_1}))
        .await
        .planned_state
        .unwrap();
    let resp = h
        .provider
        .handle(
            Request::Create {
                type_name: SSH_KEY.to_string(),
                planned_state: planned,
                private: None,
                timeouts: TimeoutsSpec::default(),
            },
            &ctx,
        )
        .await;
    assert!(resp.diagnostics.has_errors());
    assert!(h.calls_to("create_ssh_key").is_empty());
}

#[tokio::test]
async fn test_api_key_expiry_offset_is_not_a_change() {
    let h = Harness::new();
    let config = json!({
        "application_id": USER_A,
        "expires_at": "2025-07-06T11:00:00+02:00",
    });
    let created = h.create("scaleway_iam_api_key", config.clone()).await;
    assert_eq!(created["expires_at"], json!("2025-07-06T09:00:00Z"));
    let secret = created["secret_key"].as_str().unwrap().to_string();
    assert!(!secret.is_empty());

    // the secret only comes back from create and must survive a refresh
    let read = h.read("scaleway_iam_api_key", &created).await.new_state.unwrap();
    assert_eq!(read["secret_key"], json!(secret));

    for expires_at in ["2025-07-06T11:00:00+02:00", "2025-07-06T09:00:00Z"] {
        let mut cfg = config.clone();
        cfg["expires_at"] = json!(expires_at);
        let plan = h.plan("scaleway_iam_api_key", Some(&read), &cfg).await;
        assert_eq!(changed(&plan), Vec::<String>::new(), "{expires_at}");
        assert_eq!(plan.requires_replace, Some(vec![]));
    }
}

#[tokio::test]
async fn test_group_detaches_only_dropped_users_and_apps() {
    const APP_1: &str = "dddddddd-dddd-4ddd-8ddd-dddddddddddd";
    const APP_2: &str = "eeeeeeee-eeee-4eee-8eee-eeeeeeeeeeee";
    let h = Harness::new();
    let state = h
        .create(
            GROUP,
            json!({
                "name": "mixed",
                "user_ids": [USER_A, USER_B],
                "application_ids": [APP_1, APP_2],
            }),
        )
        .await;
    h.cloud.clear_calls();

    let desired = json!({"name": "mixed", "user_ids": [USER_B], "application_ids": [APP_1]});
    let resp = h.update(GROUP, &state, &desired).await;
    assert!(!resp.diagnostics.has_errors(), "{:?}", resp.diagnostics);

    let mut removed = h.calls_to("remove_group_member");
    removed.sort();
    let id = state["id"].as_str().unwrap();
    assert_eq!(
        removed,
        vec![
            format!("remove_group_member {id} application_id={APP_2}"),
            format!("remove_group_member {id} user_id={USER_A}"),
        ]
    );
    assert!(h.calls_to("add_group_member").is_empty());

    let after = resp.new_state.unwrap();
    let replan = h.plan(GROUP, Some(&after), &desired).await;
    assert_eq!(changed(&replan), Vec::<String>::new());
}
