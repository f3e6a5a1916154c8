//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers)
        .route("/v1/health", get(handlers::health_check))
        // Agent onboarding and identity
        .route("/v1/agents/register", post(handlers::register_agent))
        .route("/v1/auth/whoami", get(handlers::whoami))
        // Skill directory
        .route("/v1/skills", get(handlers::list_skills))
        .route("/v1/skills/{slug}", get(handlers::get_skill))
        // Ratings and reviews (upsert semantics)
        .route(
            "/v1/skills/{slug}/review",
            put(handlers::put_review).delete(handlers::delete_review),
        )
        // Deprecated vote surface
        .route("/v1/skills/{slug}/vote", post(handlers::post_vote))
        // Identity provider webhook
        .route("/v1/webhooks/identity", post(handlers::identity_webhook))
        // Admin endpoints (all require the admin scope)
        .route(
            "/v1/admin/tokens",
            post(handlers::create_token).get(handlers::list_tokens),
        )
        .route(
            "/v1/admin/tokens/{token_id}",
            delete(handlers::revoke_token),
        )
        .route(
            "/v1/admin/sync",
            get(handlers::get_sync_status).post(handlers::trigger_sync),
        )
        .route("/v1/admin/backfill", post(handlers::trigger_backfill))
        .route(
            "/v1/admin/agents/{agent_id}/claim",
            post(handlers::claim_agent),
        )
        .route("/v1/admin/skills/{slug}/hide", post(handlers::hide_skill))
        .route(
            "/v1/admin/skills/{slug}/unhide",
            post(handlers::unhide_skill),
        )
        .route("/v1/admin/metrics", get(handlers::get_admin_metrics));

    let mut router = Router::new().merge(api_routes);

    // Conditionally add the Prometheus endpoint based on config.
    // SECURITY: when enabled, this endpoint MUST be network-restricted to
    // authorized scraper IPs. See crate::metrics for details.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> Auth -> Handler. The quota gate is
    // consulted per handler so only mutating agent traffic is counted.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
