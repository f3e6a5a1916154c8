//! Admin handlers: key management, sync control, moderation, stats.

use crate::auth::{AuthenticatedAgent, hash_token};
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::success;
use crate::jobs;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use pavilion_core::TokenScope;
use pavilion_metadata::models::TokenRow;
use pavilion_metadata::repos::sync_state::{CATALOG_SYNC_KEY, REVIEW_BACKFILL_KEY};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

fn rfc3339(ts: Option<OffsetDateTime>) -> Option<String> {
    ts.and_then(|t| t.format(&Rfc3339).ok())
}

// =============================================================================
// API key management
// =============================================================================

/// Request body for creating an API key.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub scopes: Vec<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `POST /v1/admin/tokens` - create an API key. The secret is returned
/// exactly once.
pub async fn create_token(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Json(request): Json<CreateKeyRequest>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    if request.scopes.is_empty() {
        return Err(ApiError::BadRequest("scopes cannot be empty".to_string()));
    }
    for scope in &request.scopes {
        TokenScope::parse(scope)
            .map_err(|_| ApiError::BadRequest(format!("invalid scope: {scope}")))?;
    }

    let agent_id = match &request.agent_id {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .map_err(|_| ApiError::BadRequest(format!("invalid agent_id: {raw}")))?;
            if state.metadata.get_agent(id).await?.is_none() {
                return Err(ApiError::NotFound(format!("agent {id} not found")));
            }
            Some(id)
        }
        None => None,
    };

    let now = OffsetDateTime::now_utc();
    let expires_at = request
        .expires_in_secs
        .map(|secs| now + time::Duration::seconds(secs.min(i64::MAX as u64) as i64));

    let secret = format!(
        "pav_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );
    let token = TokenRow {
        token_id: Uuid::new_v4(),
        agent_id,
        token_hash: hash_token(&secret),
        scopes: serde_json::to_string(&request.scopes)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        expires_at,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: request.description.clone(),
    };
    state.metadata.create_token(&token).await?;

    Ok(success(json!({
        "token_id": token.token_id.to_string(),
        "token_secret": secret,
        "expires_at": rfc3339(expires_at),
    })))
}

/// `GET /v1/admin/tokens` - list API keys (hashes omitted).
pub async fn list_tokens(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let tokens = state.metadata.list_tokens().await?;
    let items: Vec<Value> = tokens
        .iter()
        .map(|t| {
            json!({
                "token_id": t.token_id.to_string(),
                "agent_id": t.agent_id.map(|id| id.to_string()),
                "scopes": serde_json::from_str::<Vec<String>>(&t.scopes).unwrap_or_default(),
                "expires_at": rfc3339(t.expires_at),
                "revoked_at": rfc3339(t.revoked_at),
                "created_at": rfc3339(Some(t.created_at)),
                "last_used_at": rfc3339(t.last_used_at),
                "description": t.description,
            })
        })
        .collect();

    Ok(success(json!({"tokens": items})))
}

/// `DELETE /v1/admin/tokens/{token_id}` - revoke an API key.
pub async fn revoke_token(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(token_id): Path<String>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let token_id = Uuid::parse_str(&token_id)
        .map_err(|_| ApiError::BadRequest(format!("invalid token_id: {token_id}")))?;
    state
        .metadata
        .revoke_token(token_id, OffsetDateTime::now_utc())
        .await?;

    Ok(success(json!({"revoked": true})))
}

// =============================================================================
// Sync and backfill control
// =============================================================================

/// `POST /v1/admin/sync` - start a catalog sync run now.
///
/// The run executes in the background; poll `GET /v1/admin/sync` for its
/// state. A run already in flight keeps the checkpoint and the new run
/// skips itself.
pub async fn trigger_sync(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    jobs::spawn_sync_run(&state).await;
    Ok(success(json!({"triggered": true})))
}

/// `GET /v1/admin/sync` - sync checkpoint state plus the denormalized
/// directory summary.
pub async fn get_sync_status(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let sync = state.metadata.get_sync_state(CATALOG_SYNC_KEY).await?;
    let backfill = state
        .metadata
        .get_backfill_state(REVIEW_BACKFILL_KEY)
        .await?;

    let sync_json = sync.map(|s| {
        json!({
            "status": s.status,
            "cursor": s.cursor,
            "last_full_sync_at": rfc3339(s.last_full_sync_at),
            "last_incremental_sync_at": rfc3339(s.last_incremental_sync_at),
            "last_error": s.last_error,
            "summary": s.summary(),
        })
    });
    let backfill_json = backfill.map(|b| {
        json!({
            "cursor": b.cursor,
            "last_completed_at": rfc3339(b.last_completed_at),
        })
    });

    Ok(success(json!({
        "sync": sync_json,
        "backfill": backfill_json,
    })))
}

/// `POST /v1/admin/backfill` - start a stat backfill invocation now.
pub async fn trigger_backfill(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    jobs::spawn_backfill_run(&state).await;
    Ok(success(json!({"triggered": true})))
}

// =============================================================================
// Agent verification
// =============================================================================

/// Request body for claiming an agent registration.
#[derive(Debug, Deserialize)]
pub struct ClaimAgentRequest {
    /// External identifier of the claiming user (as mirrored from the
    /// identity provider).
    pub user_external_id: String,
}

/// `POST /v1/admin/agents/{agent_id}/claim` - mark an agent registration
/// as claimed by a human-controlled account, upgrading it to
/// `verified_bot`.
pub async fn claim_agent(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(agent_id): Path<String>,
    Json(request): Json<ClaimAgentRequest>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let agent_id = Uuid::parse_str(&agent_id)
        .map_err(|_| ApiError::BadRequest(format!("invalid agent_id: {agent_id}")))?;
    if state.metadata.get_agent(agent_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("agent {agent_id} not found")));
    }

    let user = state
        .metadata
        .get_user_by_external_id(&request.user_external_id)
        .await?
        .filter(|u| u.deleted_at.is_none())
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "user '{}' not found",
                request.user_external_id
            ))
        })?;

    state
        .metadata
        .claim_agent(agent_id, user.user_id, OffsetDateTime::now_utc())
        .await?;
    tracing::info!(agent_id = %agent_id, user = %request.user_external_id, "Agent claimed");

    Ok(success(json!({"kind": "verified_bot"})))
}

// =============================================================================
// Moderation
// =============================================================================

/// Request body for hiding a skill.
#[derive(Debug, Default, Deserialize)]
pub struct HideSkillRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /v1/admin/skills/{slug}/hide` - hide a skill from listings.
pub async fn hide_skill(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
    request: Option<Json<HideSkillRequest>>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let skill = state
        .metadata
        .get_skill_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("skill '{slug}' not found")))?;

    let reason = request.and_then(|Json(r)| r.reason);
    state
        .metadata
        .set_hidden(
            skill.skill_id,
            true,
            reason.as_deref(),
            OffsetDateTime::now_utc(),
        )
        .await?;
    tracing::info!(slug = %slug, reason = ?reason, "Skill hidden by moderation");

    Ok(success(json!({"hidden": true})))
}

/// `POST /v1/admin/skills/{slug}/unhide` - restore a hidden skill.
pub async fn unhide_skill(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let skill = state
        .metadata
        .get_skill_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("skill '{slug}' not found")))?;

    state
        .metadata
        .set_hidden(skill.skill_id, false, None, OffsetDateTime::now_utc())
        .await?;

    Ok(success(json!({"hidden": false})))
}

// =============================================================================
// Stats
// =============================================================================

/// `GET /v1/admin/metrics` - JSON snapshot of directory counters.
pub async fn get_admin_metrics(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::Admin)?;

    let visible_skills = state.metadata.count_visible_skills().await?;
    let reviews = state.metadata.count_reviews().await?;
    let votes = state.metadata.count_votes().await?;

    Ok(success(json!({
        "visible_skills": visible_skills,
        "reviews": reviews,
        "votes": votes,
    })))
}
