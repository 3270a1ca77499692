//! HTTP-level tests for the bandit routes, driven through the axum router
//! without binding a socket.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bandit_api::{router, AppState};
use bandit_core::config::AppConfig;
use bandit_rl_engine::CampaignBandits;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<CampaignBandits>) {
    let campaigns = Arc::new(CampaignBandits::new());
    let state = AppState::new(AppConfig::default(), campaigns.clone());
    (router(state), campaigns)
}

async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, text) = send_raw(app, method, uri, body.map(|b| b.to_string())).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_update_then_dump() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/update_bandit",
        Some(json!({"x": {"number_successes": 50, "number_trials": 400}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["message"], "1 records appended");

    let (status, body) = send(&app, Method::GET, "/dump_beta_matrix_parameters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["beta_matrix_parameters"],
        json!([{"item_id": "x", "successes": 50, "failures": 350, "trials": 400}])
    );
}

#[tokio::test]
async fn test_batch_stops_at_first_invalid_entry() {
    let (app, campaigns) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/update_bandit",
        Some(json!([
            {"g1": {"number_successes": 10, "number_trials": 10}},
            {"g2": {"number_successes": -1, "number_trials": 5}},
            {"g3": {"number_successes": 1, "number_trials": 1}}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_observation");
    assert_eq!(body["processed"], 1);

    let engine = campaigns.get("default").unwrap();
    assert!(engine.contains("g1"));
    assert!(!engine.contains("g2"));
    assert!(!engine.contains("g3"));
}

#[tokio::test]
async fn test_failures_field_is_accepted() {
    let (app, campaigns) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/campaigns/spring/observations",
        Some(json!([{"banner": {"number_successes": 30, "number_failures": 3}}])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);

    let dump = campaigns.get("spring").unwrap().dump_parameters();
    assert_eq!(dump[0].trials, 33);
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let (app, campaigns) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/update_bandit",
        Some(json!({"x": {"number_successes": "lots", "number_trials": 4}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_payload");
    assert!(campaigns.get("default").is_none());
}

#[tokio::test]
async fn test_rejected_update_does_not_create_campaign() {
    let (app, campaigns) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/campaigns/ghost/observations",
        Some(json!([{"g": {"number_successes": -1, "number_trials": 1}}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_observation");
    assert_eq!(body["processed"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/campaigns/empty/observations",
        Some(json!([])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/campaigns/partial/observations",
        Some(json!([{"g": {"number_successes": 1}}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["processed"], 0);

    assert!(campaigns.is_empty());
    let (_, body) = send(&app, Method::GET, "/v1/campaigns", None).await;
    assert_eq!(body["campaigns"], json!([]));
    let (_, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(body["campaigns"], 0);
}

#[tokio::test]
async fn test_repeated_item_id_in_one_entry_is_rejected() {
    let (app, campaigns) = test_app();

    let (status, text) = send_raw(
        &app,
        Method::POST,
        "/update_bandit",
        Some(
            r#"{"a": {"number_successes": 5, "number_trials": 5},
                "a": {"number_successes": 1, "number_trials": 9}}"#
                .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "invalid_payload");
    assert!(campaigns.get("default").is_none());
}

#[tokio::test]
async fn test_pull_lever_is_self_consistent() {
    let (app, _) = test_app();
    send(
        &app,
        Method::POST,
        "/update_bandit",
        Some(json!([
            {"a": {"number_successes": 3, "number_trials": 10}},
            {"b": {"number_successes": 5, "number_trials": 10}},
            {"c": {"number_successes": 0, "number_trials": 0}}
        ])),
    )
    .await;

    for _ in 0..50 {
        let (status, body) = send(&app, Method::GET, "/pull_lever", None).await;
        assert_eq!(status, StatusCode::OK);

        let probs = body["probabilities"].as_object().unwrap();
        let keys: Vec<&str> = probs.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);

        let best = probs
            .iter()
            .max_by(|x, y| x.1.as_f64().unwrap().total_cmp(&y.1.as_f64().unwrap()))
            .map(|(k, _)| k.clone())
            .unwrap();
        assert_eq!(body["selected_item_id"], best);
        assert_eq!(body["item"], best);
    }
}

#[tokio::test]
async fn test_pull_lever_without_items() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/pull_lever", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_items_registered");
}

#[tokio::test]
async fn test_selection_restricted_to_candidates() {
    let (app, campaigns) = test_app();
    // Registration order (zeta, alpha) differs from alphabetical order.
    send(
        &app,
        Method::POST,
        "/v1/campaigns/c1/observations",
        Some(json!([
            {"zeta": {"number_successes": 1, "number_trials": 2}},
            {"alpha": {"number_successes": 1, "number_trials": 2}},
            {"skipped": {"number_successes": 1, "number_trials": 2}}
        ])),
    )
    .await;

    let (status, text) = send_raw(
        &app,
        Method::POST,
        "/v1/campaigns/c1/selection",
        Some(r#"{"items": ["fresh", "alpha", "zeta"]}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let probs = &text[text.find(r#""probabilities""#).unwrap()..];
    let zeta = probs.find(r#""zeta":"#).unwrap();
    let alpha = probs.find(r#""alpha":"#).unwrap();
    let fresh = probs.find(r#""fresh":"#).unwrap();
    assert!(zeta < alpha && alpha < fresh, "unexpected order: {probs}");
    assert!(!probs.contains(r#""skipped""#));

    let engine = campaigns.get("c1").unwrap();
    assert!(!engine.contains("fresh"));
    assert_eq!(engine.len(), 3);
}

#[tokio::test]
async fn test_campaigns_are_isolated_and_reset() {
    let (app, _) = test_app();
    for campaign in ["north", "south"] {
        send(
            &app,
            Method::POST,
            &format!("/v1/campaigns/{campaign}/observations"),
            Some(json!({"ad": {"number_successes": 1, "number_trials": 1}})),
        )
        .await;
    }

    let (_, body) = send(&app, Method::GET, "/v1/campaigns", None).await;
    assert_eq!(body["campaigns"], json!(["north", "south"]));

    let (status, body) = send(&app, Method::POST, "/v1/campaigns/north/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, Method::GET, "/v1/campaigns/north/parameters", None).await;
    assert_eq!(body["beta_matrix_parameters"], json!([]));
    let (_, body) = send(&app, Method::GET, "/v1/campaigns/south/parameters", None).await;
    assert_eq!(body["beta_matrix_parameters"][0]["item_id"], "ad");
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["node_id"], "node-01");
}
