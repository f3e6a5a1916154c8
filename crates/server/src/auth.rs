//! Authentication middleware for agent API keys.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use pavilion_core::{ApiKeyId, ApiToken, TokenScope};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, truncated and
    /// filtered to printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedAgent {
    /// The validated API key.
    pub token: ApiToken,
}

impl AuthenticatedAgent {
    /// Check if the key has a specific scope.
    pub fn has_scope(&self, scope: TokenScope) -> bool {
        self.token.has_scope(scope)
    }

    /// Require a specific scope, returning an error if not present.
    pub fn require_scope(&self, scope: TokenScope) -> ApiResult<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "missing required scope: {scope}"
            )))
        }
    }

    /// The agent behind this key, or an error for agent-only endpoints
    /// hit with an admin key.
    pub fn require_agent_id(&self) -> ApiResult<Uuid> {
        self.token.agent_id.ok_or_else(|| {
            ApiError::Forbidden("this endpoint requires an agent-scoped key".to_string())
        })
    }

    /// Quota identity for this key.
    pub fn quota_identity(&self) -> String {
        format!("token:{}", self.token.id)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedAgent
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAgent>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash an API key for storage lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Authentication middleware that validates API keys and sets up trace
/// context. Requests without a key pass through unauthenticated; scope
/// checks happen per handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    if let Some(token_str) = extract_bearer_token(&req) {
        let token_hash = hash_token(token_str);

        if let Some(token_row) = state.metadata.get_token_by_hash(&token_hash).await? {
            let scopes: Vec<String> = serde_json::from_str(&token_row.scopes)
                .map_err(|e| ApiError::Internal(format!("invalid token scopes: {e}")))?;

            let scopes: HashSet<TokenScope> = scopes
                .iter()
                .filter_map(|s| match TokenScope::parse(s) {
                    Ok(scope) => Some(scope),
                    Err(_) => {
                        tracing::warn!(
                            token_id = %token_row.token_id,
                            invalid_scope = %s,
                            "API key contains invalid scope, ignoring"
                        );
                        None
                    }
                })
                .collect();

            let token = ApiToken {
                id: ApiKeyId::parse(&token_row.token_id.to_string())?,
                agent_id: token_row.agent_id,
                scopes,
                expires_at: token_row.expires_at,
                revoked_at: token_row.revoked_at,
                created_at: token_row.created_at,
                description: token_row.description,
            };

            if !token.is_valid() {
                return Err(ApiError::Unauthorized(
                    "API key expired or revoked".to_string(),
                ));
            }

            // Update last used time (fire and forget)
            let metadata = state.metadata.clone();
            let token_id = token_row.token_id;
            tokio::spawn(async move {
                let _ = metadata
                    .touch_token(token_id, OffsetDateTime::now_utc())
                    .await;
            });

            req.extensions_mut().insert(AuthenticatedAgent { token });
        }
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

// Note: hex is a simple utility, we'll inline it
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_lowercase_hex() {
        let hash = hash_token("secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_lowercase());
    }

    #[test]
    fn test_trace_id_sanitizes_client_input() {
        let trace = TraceId::from_client("abc\ndef\u{7}");
        assert_eq!(trace.as_str(), "abcdef");

        let long = "x".repeat(500);
        let trace = TraceId::from_client(&long);
        assert_eq!(trace.as_str().len(), MAX_TRACE_ID_LEN);

        // Entirely unprintable input falls back to a generated ID
        let trace = TraceId::from_client("\n\u{7}");
        assert!(!trace.as_str().is_empty());
    }
}
