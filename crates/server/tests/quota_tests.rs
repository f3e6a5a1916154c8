//! Integration tests for the fixed-window quota gate.

mod common;

use axum::http::StatusCode;
use common::fixtures::{create_test_agent, json_request, seed_skill};
use common::server::TestServer;
use serde_json::json;

#[tokio::test]
async fn test_quota_rejects_after_limit_within_window() {
    let server = TestServer::with_config(|config| {
        config.quota.enabled = true;
        config.quota.window_secs = 3600; // one test-spanning window
        config.quota.max_requests = 3;
    })
    .await;
    let (_agent, key) = create_test_agent(&server, "chatty").await;
    seed_skill(&server, "target", None).await;

    // Three writes are admitted
    for _ in 0..3 {
        let (status, _) = json_request(
            &server.router,
            "POST",
            "/v1/skills/target/vote",
            Some(json!({"direction": "up"})),
            Some(&key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // The fourth is rejected with the distinguishable quota envelope
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/skills/target/vote",
        Some(json!({"direction": "up"})),
        Some(&key),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("quota"));
    assert!(body["hint"].as_str().unwrap().contains("back off"));

    // Another identity still has its own budget
    let (_agent2, other_key) = create_test_agent(&server, "quiet").await;
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/v1/skills/target/vote",
        Some(json!({"direction": "up"})),
        Some(&other_key),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_quota_retry_after_header_present() {
    let server = TestServer::with_config(|config| {
        config.quota.enabled = true;
        config.quota.window_secs = 3600;
        config.quota.max_requests = 1;
    })
    .await;
    let (_agent, key) = create_test_agent(&server, "bursty").await;
    seed_skill(&server, "target", None).await;

    json_request(
        &server.router,
        "PUT",
        "/v1/skills/target/review",
        Some(json!({"rating": 4})),
        Some(&key),
    )
    .await;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let request = Request::builder()
        .method("PUT")
        .uri("/v1/skills/target/review")
        .header("Authorization", format!("Bearer {key}"))
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"rating": 4}"#))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .expect("Retry-After header missing");
    assert!(retry_after >= 1 && retry_after <= 3600);
}

#[tokio::test]
async fn test_quota_disabled_admits_everything() {
    let server = TestServer::new().await;
    let (_agent, key) = create_test_agent(&server, "flood").await;
    seed_skill(&server, "target", None).await;

    for _ in 0..20 {
        let (status, _) = json_request(
            &server.router,
            "POST",
            "/v1/skills/target/vote",
            Some(json!({"direction": "up"})),
            Some(&key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_registration_is_quota_gated_per_name() {
    let server = TestServer::with_config(|config| {
        config.quota.enabled = true;
        config.quota.window_secs = 3600;
        config.quota.max_requests = 2;
    })
    .await;

    // Two attempts on the same name consume its registration budget
    // (the first succeeds, the second conflicts)...
    for _ in 0..2 {
        json_request(
            &server.router,
            "POST",
            "/v1/agents/register",
            Some(json!({"name": "greedy-bot"})),
            None,
        )
        .await;
    }

    // ...and the third is quota-rejected before touching the database.
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/v1/agents/register",
        Some(json!({"name": "greedy-bot"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // A different name is unaffected
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/v1/agents/register",
        Some(json!({"name": "polite-bot"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
