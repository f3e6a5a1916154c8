//! Review and vote handlers.
//!
//! Reviews use upsert semantics: a resubmission from the same agent for
//! the same skill overwrites the prior review. The vote endpoint is
//! deprecated but still supported for older agents.

use crate::auth::AuthenticatedAgent;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{success, visible_skill_by_slug};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use pavilion_catalog::backfill::aggregate_reviews;
use pavilion_core::{MAX_REVIEW_LEN, ReviewerKind, TokenScope, validate_rating};
use pavilion_metadata::models::{ReviewRow, VoteRow};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Request body for submitting a review.
#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub review: Option<String>,
}

/// Request body for the deprecated vote endpoint.
#[derive(Debug, Deserialize)]
pub struct SubmitVoteRequest {
    /// `up` or `down`.
    pub direction: String,
}

/// Resolve the reviewer kind for an agent from its registration record.
async fn reviewer_kind(state: &AppState, agent_id: Uuid) -> ApiResult<ReviewerKind> {
    let agent = state
        .metadata
        .get_agent(agent_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("agent registration not found".to_string()))?;
    Ok(ReviewerKind::parse(&agent.kind).unwrap_or(ReviewerKind::Bot))
}

/// Recompute a skill's review aggregates from its raw review rows.
async fn refresh_aggregates(state: &AppState, skill_id: Uuid) -> ApiResult<()> {
    let reviews = state.metadata.reviews_for_skill(skill_id).await?;
    let ratings = aggregate_reviews(&reviews);
    state
        .metadata
        .write_review_aggregates(skill_id, &ratings, OffsetDateTime::now_utc())
        .await?;
    Ok(())
}

/// `PUT /v1/skills/{slug}/review` - submit or overwrite the caller's
/// rating and review.
pub async fn put_review(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
    Json(request): Json<SubmitReviewRequest>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::ReviewsWrite)?;
    let agent_id = agent.require_agent_id()?;
    state.quota.check(&agent.quota_identity()).await?;

    validate_rating(request.rating)?;
    if let Some(body) = &request.review {
        if body.len() > MAX_REVIEW_LEN {
            return Err(ApiError::BadRequest(format!(
                "review too long: {} bytes (max {MAX_REVIEW_LEN})",
                body.len()
            )));
        }
    }

    let skill = visible_skill_by_slug(&state, &slug).await?;
    let kind = reviewer_kind(&state, agent_id).await?;
    let now = OffsetDateTime::now_utc();

    let review = ReviewRow {
        review_id: Uuid::new_v4(),
        skill_id: skill.skill_id,
        agent_id,
        reviewer_kind: kind.as_str().to_string(),
        rating: request.rating as i64,
        body: request.review.clone(),
        created_at: now,
        updated_at: now,
    };
    let created = state.metadata.upsert_review(&review).await?;
    refresh_aggregates(&state, skill.skill_id).await?;
    metrics::REVIEWS_SUBMITTED.inc();

    Ok(success(json!({
        "review": {
            "skill": slug,
            "rating": request.rating,
            "review": request.review,
            "reviewer_kind": kind.as_str(),
        },
        "created": created,
    })))
}

/// `DELETE /v1/skills/{slug}/review` - delete the caller's review.
pub async fn delete_review(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::ReviewsWrite)?;
    let agent_id = agent.require_agent_id()?;

    let skill = visible_skill_by_slug(&state, &slug).await?;
    let deleted = state
        .metadata
        .delete_review(skill.skill_id, agent_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!(
            "no review on '{slug}' from this agent"
        )));
    }
    refresh_aggregates(&state, skill.skill_id).await?;

    Ok(success(json!({"deleted": true})))
}

/// `POST /v1/skills/{slug}/vote` - deprecated up/down vote.
///
/// Kept for older agents; an agent's vote is upserted, and switching
/// direction rebalances the per-kind counters.
pub async fn post_vote(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
    Json(request): Json<SubmitVoteRequest>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::ReviewsWrite)?;
    let agent_id = agent.require_agent_id()?;
    state.quota.check(&agent.quota_identity()).await?;

    let direction = request.direction.to_lowercase();
    if direction != "up" && direction != "down" {
        return Err(ApiError::BadRequest(format!(
            "invalid vote direction '{}' (expected 'up' or 'down')",
            request.direction
        )));
    }

    let skill = visible_skill_by_slug(&state, &slug).await?;
    let kind = reviewer_kind(&state, agent_id).await?;
    let now = OffsetDateTime::now_utc();

    let vote = VoteRow {
        vote_id: Uuid::new_v4(),
        skill_id: skill.skill_id,
        agent_id,
        voter_kind: kind.as_str().to_string(),
        direction: direction.clone(),
        created_at: now,
        updated_at: now,
    };
    let previous = state.metadata.upsert_vote(&vote).await?;

    // Rebalance counters only when the effective vote changed.
    let changed = previous.as_deref() != Some(direction.as_str());
    if changed {
        if let Some(previous) = &previous {
            state
                .metadata
                .adjust_vote_counter(skill.skill_id, kind, previous == "up", -1)
                .await?;
        }
        state
            .metadata
            .adjust_vote_counter(skill.skill_id, kind, direction == "up", 1)
            .await?;
    }
    metrics::VOTES_SUBMITTED.inc();

    Ok(success(json!({
        "vote": direction,
        "changed": changed,
        "deprecated": true,
        "hint": "voting is deprecated; submit a rating and review instead",
    })))
}
