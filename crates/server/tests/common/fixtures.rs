//! Test fixtures for generating directory data.

use super::server::TestServer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pavilion_metadata::models::{AgentRow, SkillRow, TokenRow};
use pavilion_server::auth::hash_token;
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper to make JSON requests against the router.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Insert a visible skill directly into the store.
#[allow(dead_code)]
pub async fn seed_skill(server: &TestServer, slug: &str, category: Option<&str>) -> SkillRow {
    let now = OffsetDateTime::now_utc();
    let skill = SkillRow {
        skill_id: Uuid::new_v4(),
        external_id: Some(format!("ext-{slug}")),
        slug: slug.to_string(),
        name: slug.to_string(),
        description: Some(format!("The {slug} skill")),
        author: Some("acme".to_string()),
        category: category.map(|c| c.to_string()),
        tags: r#"["testing"]"#.to_string(),
        downloads: 10,
        stars: 2,
        installs: 4,
        upvotes_human: 0,
        upvotes_bot: 0,
        upvotes_verified: 0,
        downvotes_human: 0,
        downvotes_bot: 0,
        downvotes_verified: 0,
        reviews_human_count: 0,
        reviews_human_mean: None,
        reviews_bot_count: 0,
        reviews_bot_mean: None,
        reviews_verified_count: 0,
        reviews_verified_mean: None,
        hidden: false,
        hidden_reason: None,
        external_updated_at: None,
        created_at: now,
        updated_at: now,
        last_synced_at: now,
    };
    server
        .metadata()
        .insert_skill(&skill)
        .await
        .expect("Failed to seed skill");
    skill
}

/// Create an agent with an API key carrying the standard agent scopes.
/// Returns (agent_id, raw API key).
#[allow(dead_code)]
pub async fn create_test_agent(server: &TestServer, name: &str) -> (Uuid, String) {
    let now = OffsetDateTime::now_utc();
    let agent = AgentRow {
        agent_id: Uuid::new_v4(),
        agent_name: name.to_string(),
        contact: None,
        kind: "bot".to_string(),
        claimed_by_user_id: None,
        created_at: now,
        updated_at: now,
    };
    server
        .metadata()
        .create_agent(&agent)
        .await
        .expect("Failed to create agent");

    let raw_key = format!("test-key-{}", Uuid::new_v4());
    let token = TokenRow {
        token_id: Uuid::new_v4(),
        agent_id: Some(agent.agent_id),
        token_hash: hash_token(&raw_key),
        scopes: r#"["skills:read","reviews:write"]"#.to_string(),
        expires_at: None,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: Some("Test agent key".to_string()),
    };
    server
        .metadata()
        .create_token(&token)
        .await
        .expect("Failed to create token");

    (agent.agent_id, raw_key)
}
