use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, state::AppState};
use sar_core::Topic;

fn setup_app() -> (axum::Router, Arc<AppState>) {
    let mut config = Config::default();
    config.simulation.seed = Some(7);
    let state = Arc::new(AppState::new(config));
    let app = api::routes()
        .with_state(state.clone())
        .layer(middleware::from_fn(api::request_id::ensure_request_id));
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .expect("array")
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn victims_filter_and_sort() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(get("/v1/victims?sort=confidence"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        ids(&read_json(res).await),
        vec!["V-001", "V-003", "V-004", "V-002", "V-005"]
    );

    let res = app
        .clone()
        .oneshot(get("/v1/victims?status=critical"))
        .await
        .unwrap();
    assert_eq!(ids(&read_json(res).await), vec!["V-001", "V-004"]);

    let res = app
        .clone()
        .oneshot(get("/v1/victims?search=sector%20b3"))
        .await
        .unwrap();
    assert_eq!(ids(&read_json(res).await), vec!["V-002"]);
}

#[tokio::test]
async fn rejects_unknown_sort_and_status() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(get("/v1/victims?sort=alphabetical"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = read_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("alphabetical"));

    let res = app
        .oneshot(get("/v1/victims?status=missing"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assign_team_then_repeat_is_unchanged() {
    let (app, state) = setup_app();
    let mut rx = state.subscribe();

    let res = app
        .clone()
        .oneshot(post("/v1/victims/V-001/assign", json!({ "team_id": "RT-Charlie" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["outcome"], "applied");

    let victim = read_json(app.clone().oneshot(get("/v1/victims/V-001")).await.unwrap()).await;
    assert_eq!(victim["rescue_status"], "in_progress");
    assert_eq!(victim["assigned_team"], "RT-Charlie");

    let teams = read_json(app.clone().oneshot(get("/v1/teams")).await.unwrap()).await;
    let charlie = teams
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == "RT-Charlie")
        .unwrap();
    assert_eq!(charlie["status"], "en_route");
    assert_eq!(charlie["eta_secs"], 12);
    let log = charlie["communications"].as_array().unwrap();
    assert_eq!(log.last().unwrap()["message"], "Dispatched to V-001");
    assert_eq!(log.last().unwrap()["time"], charlie["last_update"]);

    let first = rx.try_recv().expect("victims snapshot");
    assert_eq!(first.collection, Topic::Victims);
    assert_eq!(first.seq, 1);

    let res = app
        .oneshot(post("/v1/victims/V-001/assign", json!({ "team_id": "RT-Charlie" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["outcome"], "unchanged");
}

#[tokio::test]
async fn invalid_assignments_are_rejected() {
    let (app, state) = setup_app();
    let alerts_before = state.mission().alerts().all().count();

    // V-003 is already confirmed safe.
    let res = app
        .clone()
        .oneshot(post("/v1/victims/V-003/assign", json!({ "team_id": "RT-Alpha" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // RT-Beta is busy with V-004.
    let res = app
        .clone()
        .oneshot(post("/v1/victims/V-002/assign", json!({ "team_id": "RT-Beta" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(post("/v1/victims/V-999/assign", json!({ "team_id": "RT-Alpha" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .oneshot(post("/v1/victims/V-002/assign", json!({ "team_id": "RT-Zulu" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(state.mission().alerts().all().count(), alerts_before);
}

#[tokio::test]
async fn deploy_and_recall_drones() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(post("/v1/drones/D-007/deploy", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let drone = read_json(app.clone().oneshot(get("/v1/drones/D-007")).await.unwrap()).await;
    assert_eq!(drone["status"], "connected");
    assert_eq!(drone["altitude_m"], 100.0);

    // Flat battery.
    let res = app
        .clone()
        .oneshot(post("/v1/drones/D-004/deploy", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(post("/v1/drones/D-007/recall", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(post("/v1/drones/D-007/recall", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.oneshot(get("/v1/drones/D-404")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn alert_view_filters_and_dismiss_is_idempotent() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(post("/v1/alerts/view", json!({ "severity": "critical" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page = read_json(res).await;
    assert_eq!(page["visible"], 2);
    assert_eq!(page["page_count"], 1);

    let res = app
        .clone()
        .oneshot(post("/v1/alerts/view", json!({ "severity": "urgent" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let alerts = read_json(app.clone().oneshot(get("/v1/alerts")).await.unwrap()).await;
    let newest = alerts[0]["id"].as_u64().unwrap();

    let uri = format!("/v1/alerts/{newest}/dismiss");
    let res = app.clone().oneshot(post(&uri, json!({}))).await.unwrap();
    assert_eq!(read_json(res).await["outcome"], "applied");
    let res = app.clone().oneshot(post(&uri, json!({}))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["outcome"], "unchanged");

    let alerts = read_json(app.oneshot(get("/v1/alerts")).await.unwrap()).await;
    assert_eq!(alerts.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn zoom_is_clamped_and_pick_uses_world_radius() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(post("/v1/map/zoom", json!({ "level": 1000.0 })))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["zoom"], 400.0);

    app.clone()
        .oneshot(post("/v1/map/reset", json!({})))
        .await
        .unwrap();

    // Default viewport maps world to screen one to one.
    let res = app
        .clone()
        .oneshot(get("/v1/map/pick?x=25&y=30"))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["target"], json!({ "kind": "victim", "id": "V-001" }));

    let res = app
        .clone()
        .oneshot(post("/v1/map/layers/victims", json!({ "active": false })))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["active"], false);

    let res = app
        .clone()
        .oneshot(get("/v1/map/pick?x=25&y=30"))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["target"], json!({ "kind": "rescue_team", "id": "RT-Charlie" }));

    let res = app
        .oneshot(post("/v1/map/layers/weather", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn map_search_narrows_victim_markers() {
    let (app, _state) = setup_app();
    let body = read_json(app.oneshot(get("/v1/map?search=v-00")).await.unwrap()).await;
    let victims = body["markers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["target"]["kind"] == "victim")
        .count();
    assert_eq!(victims, 5);
    assert_eq!(body["layers"][0]["layer"], "victims");
    assert_eq!(body["layers"][0]["total"], 5);
}

#[tokio::test]
async fn pause_and_resume_report_changes() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(post("/v1/simulation/pause", json!({})))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["state"], "paused");
    assert!(body["next_tick_in_ms"].is_null());

    let res = app
        .clone()
        .oneshot(post("/v1/simulation/pause", json!({})))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["changed"], false);

    let res = app
        .oneshot(post("/v1/simulation/resume", json!({})))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["state"], "running");
    assert!(body["next_tick_in_ms"].as_u64().is_some());
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (app, _state) = setup_app();

    let req = Request::builder()
        .uri("/v1/metrics")
        .header("x-request-id", "ops-42")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.headers()["x-request-id"], "ops-42");

    let res = app.oneshot(get("/v1/timeline?limit=2")).await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(read_json(res).await.as_array().map(Vec::len), Some(2));
}
