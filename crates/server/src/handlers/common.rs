//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use pavilion_metadata::models::SkillRow;
use serde_json::{Value, json};

/// Wrap a success payload in the uniform envelope.
///
/// The payload's fields are merged alongside `"success": true`.
pub fn success(payload: Value) -> Json<Value> {
    let mut body = json!({"success": true});
    if let (Some(body_map), Value::Object(fields)) = (body.as_object_mut(), payload) {
        for (key, value) in fields {
            body_map.insert(key, value);
        }
    }
    Json(body)
}

/// Public JSON representation of a skill.
///
/// The rating means serialize as JSON null when a partition has no
/// reviews, so clients can distinguish "no rating" from "rated zero".
pub fn skill_json(skill: &SkillRow) -> Value {
    let ratings = skill.ratings();
    json!({
        "slug": skill.slug,
        "name": skill.name,
        "description": skill.description,
        "author": skill.author,
        "category": skill.category,
        "tags": skill.tag_set().as_slice(),
        "stats": {
            "downloads": skill.downloads,
            "stars": skill.stars,
            "installs": skill.installs,
            "upvotes": skill.upvotes(),
            "downvotes": skill.downvotes(),
        },
        "ratings": {
            "human": ratings.human,
            "bot": ratings.bot,
            "verified_bot": ratings.verified_bot,
            "combined": ratings.combined(),
        },
    })
}

/// Clamp a client-requested page size to the configured bounds.
pub fn clamp_page_size(state: &AppState, requested: Option<u32>) -> u32 {
    let default = state.config.server.list_page_size;
    let max = state.config.server.max_list_page_size;
    requested.unwrap_or(default).clamp(1, max)
}

/// Look up a visible skill by slug; hidden skills read as absent.
pub async fn visible_skill_by_slug(state: &AppState, slug: &str) -> ApiResult<SkillRow> {
    let skill = state
        .metadata
        .get_skill_by_slug(slug)
        .await?
        .filter(|s| !s.hidden)
        .ok_or_else(|| ApiError::NotFound(format!("skill '{slug}' not found")))?;
    Ok(skill)
}

/// Health check (intentionally unauthenticated for load balancers).
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.metadata.health_check().await?;
    Ok(success(json!({"status": "ok"})))
}
