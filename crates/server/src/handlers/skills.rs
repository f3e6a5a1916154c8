//! Skill listing and detail handlers.

use crate::auth::AuthenticatedAgent;
use crate::error::ApiResult;
use crate::handlers::common::{clamp_page_size, skill_json, success, visible_skill_by_slug};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use pavilion_core::TokenScope;
use pavilion_metadata::models::SkillFilter;
use serde::Deserialize;
use serde_json::{Value, json};

/// Query parameters for skill listings.
#[derive(Debug, Deserialize)]
pub struct ListSkillsParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    /// Substring search over name and description.
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `GET /v1/skills` - list and search skills.
pub async fn list_skills(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Query(params): Query<ListSkillsParams>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::SkillsRead)?;

    let limit = clamp_page_size(&state, params.limit);
    let filter = SkillFilter {
        category: params.category,
        tag: params.tag,
        search: params.q,
        include_hidden: false,
        limit,
        offset: params.offset.unwrap_or(0),
    };

    let skills = state.metadata.list_skills(&filter).await?;
    let items: Vec<Value> = skills.iter().map(skill_json).collect();

    Ok(success(json!({
        "skills": items,
        "count": items.len(),
        "limit": limit,
        "offset": filter.offset,
    })))
}

/// `GET /v1/skills/{slug}` - skill detail.
pub async fn get_skill(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    agent.require_scope(TokenScope::SkillsRead)?;

    let skill = visible_skill_by_slug(&state, &slug).await?;
    Ok(success(json!({"skill": skill_json(&skill)})))
}
