//! Agent registration and identity handlers.

use crate::auth::{AuthenticatedAgent, hash_token};
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::success;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use pavilion_metadata::MetadataError;
use pavilion_metadata::models::{AgentRow, TokenRow};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Scopes granted to self-registered agents.
const AGENT_SCOPES: &[&str] = &["skills:read", "reviews:write"];

/// Request body for agent registration.
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

fn validate_agent_name(name: &str) -> ApiResult<String> {
    let name = name.trim().to_lowercase();
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if name.len() < 3 || name.len() > 64 || !valid_chars {
        return Err(ApiError::BadRequest(
            "agent name must be 3-64 characters of [a-z0-9-_]".to_string(),
        ));
    }
    Ok(name)
}

/// Generate a fresh API key secret. Only its hash is stored.
fn generate_api_key() -> String {
    format!(
        "pav_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// `POST /v1/agents/register` - register an agent and receive an API key.
///
/// Unauthenticated, but quota-gated per submitted name so a misbehaving
/// client cannot mint keys in bulk. The key is shown exactly once.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> ApiResult<Json<Value>> {
    let name = validate_agent_name(&request.name)?;
    state.quota.check(&format!("register:{name}")).await?;

    let now = OffsetDateTime::now_utc();
    let agent = AgentRow {
        agent_id: Uuid::new_v4(),
        agent_name: name.clone(),
        contact: request.contact.clone(),
        kind: "bot".to_string(),
        claimed_by_user_id: None,
        created_at: now,
        updated_at: now,
    };

    match state.metadata.create_agent(&agent).await {
        Ok(()) => {}
        Err(MetadataError::AlreadyExists(_)) => {
            return Err(ApiError::Conflict(format!(
                "agent name '{name}' is already registered"
            )));
        }
        Err(e) => return Err(e.into()),
    }

    let api_key = generate_api_key();
    let token = TokenRow {
        token_id: Uuid::new_v4(),
        agent_id: Some(agent.agent_id),
        token_hash: hash_token(&api_key),
        scopes: serde_json::to_string(AGENT_SCOPES)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        expires_at: None,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: Some(format!("agent '{name}' registration key")),
    };
    state.metadata.create_token(&token).await?;

    tracing::info!(agent = %name, agent_id = %agent.agent_id, "Agent registered");

    Ok(success(json!({
        "agent_id": agent.agent_id.to_string(),
        "name": name,
        "kind": "bot",
        // Shown once; only the hash is stored.
        "api_key": api_key,
        "scopes": AGENT_SCOPES,
    })))
}

/// `GET /v1/auth/whoami` - describe the authenticated key.
pub async fn whoami(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    let scopes: Vec<&str> = agent.token.scopes.iter().map(|s| s.as_str()).collect();

    let agent_info = match agent.token.agent_id {
        Some(agent_id) => state.metadata.get_agent(agent_id).await?.map(|a| {
            json!({
                "agent_id": a.agent_id.to_string(),
                "name": a.agent_name,
                "kind": a.kind,
            })
        }),
        None => None,
    };

    Ok(success(json!({
        "key_id": agent.token.id.to_string(),
        "scopes": scopes,
        "agent": agent_info,
    })))
}
