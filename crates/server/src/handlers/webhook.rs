//! Identity provider webhook handler.
//!
//! The provider signs each delivery with HMAC-SHA256 over
//! `"{id}.{timestamp}.{body}"` using a shared base64 secret, and sends the
//! result as one or more `v1,<base64>` entries in the signature header.
//! Verification happens before any state change; deliveries with missing
//! or invalid signatures, or stale timestamps, are rejected outright.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::success;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use pavilion_core::config::WebhookConfig;
use pavilion_metadata::models::UserRow;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// User lifecycle event payload.
#[derive(Debug, Deserialize)]
struct IdentityEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: IdentityEventData,
}

#[derive(Debug, Deserialize)]
struct IdentityEventData {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Verify a webhook delivery signature.
///
/// `signature_header` carries space-separated `v1,<base64>` entries; the
/// delivery is accepted if any entry matches the HMAC of
/// `"{id}.{timestamp}.{body}"` under the configured secret.
pub fn verify_signature(
    config: &WebhookConfig,
    msg_id: &str,
    timestamp: &str,
    signature_header: &str,
    body: &[u8],
    now: OffsetDateTime,
) -> ApiResult<()> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ApiError::Unauthorized("invalid webhook timestamp".to_string()))?;
    let skew = (now.unix_timestamp() - ts).unsigned_abs();
    if skew > config.tolerance_secs {
        return Err(ApiError::Unauthorized(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let secret_b64 = config
        .secret
        .strip_prefix("whsec_")
        .unwrap_or(&config.secret);
    let secret = BASE64
        .decode(secret_b64)
        .map_err(|_| ApiError::Internal("webhook secret is not valid base64".to_string()))?;

    let mut signed_content = Vec::with_capacity(msg_id.len() + timestamp.len() + body.len() + 2);
    signed_content.extend_from_slice(msg_id.as_bytes());
    signed_content.push(b'.');
    signed_content.extend_from_slice(timestamp.as_bytes());
    signed_content.push(b'.');
    signed_content.extend_from_slice(body);

    for entry in signature_header.split(' ') {
        let candidate = match entry.strip_prefix("v1,") {
            Some(candidate) => candidate,
            None => continue,
        };
        let candidate_bytes = match BASE64.decode(candidate) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };

        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ApiError::Internal(format!("hmac init failed: {e}")))?;
        mac.update(&signed_content);
        // verify_slice is constant-time
        if mac.verify_slice(&candidate_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(ApiError::Unauthorized(
        "webhook signature verification failed".to_string(),
    ))
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

/// `POST /v1/webhooks/identity` - signed user lifecycle events.
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let config = state
        .config
        .webhook
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("webhook endpoint is not configured".to_string()))?;

    let msg_id = required_header(&headers, "webhook-id")?;
    let timestamp = required_header(&headers, "webhook-timestamp")?;
    let signature = required_header(&headers, "webhook-signature")?;
    verify_signature(
        config,
        msg_id,
        timestamp,
        signature,
        &body,
        OffsetDateTime::now_utc(),
    )?;

    let event: IdentityEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;

    let now = OffsetDateTime::now_utc();
    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let user = UserRow {
                user_id: Uuid::new_v4(),
                external_id: event.data.id.clone(),
                handle: event.data.username.clone(),
                email: event.data.email.clone(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            state.metadata.upsert_user(&user).await?;
            tracing::info!(external_id = %event.data.id, event = %event.event_type, "User upserted from webhook");
        }
        "user.deleted" => {
            let marked = state
                .metadata
                .soft_delete_user(&event.data.id, now)
                .await?;
            tracing::info!(
                external_id = %event.data.id,
                marked,
                "User soft-deleted from webhook"
            );
        }
        other => {
            tracing::debug!(event = %other, "Ignoring unhandled webhook event type");
        }
    }

    Ok(success(json!({"handled": event.event_type})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(config: &WebhookConfig, msg_id: &str, timestamp: &str, body: &[u8]) -> String {
        let secret_b64 = config
            .secret
            .strip_prefix("whsec_")
            .unwrap_or(&config.secret);
        let secret = BASE64.decode(secret_b64).unwrap();
        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
        mac.update(body);
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let config = WebhookConfig::for_testing();
        let now = OffsetDateTime::now_utc();
        let ts = now.unix_timestamp().to_string();
        let body = br#"{"type":"user.created","data":{"id":"u1"}}"#;
        let signature = sign(&config, "msg_1", &ts, body);

        assert!(verify_signature(&config, "msg_1", &ts, &signature, body, now).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let config = WebhookConfig::for_testing();
        let now = OffsetDateTime::now_utc();
        let ts = now.unix_timestamp().to_string();
        let signature = sign(&config, "msg_1", &ts, b"original");

        assert!(verify_signature(&config, "msg_1", &ts, &signature, b"tampered", now).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let config = WebhookConfig::for_testing();
        let now = OffsetDateTime::now_utc();
        let stale = (now.unix_timestamp() - 10_000).to_string();
        let body = b"{}";
        let signature = sign(&config, "msg_1", &stale, body);

        assert!(verify_signature(&config, "msg_1", &stale, &signature, body, now).is_err());
    }

    #[test]
    fn test_multiple_signature_entries() {
        let config = WebhookConfig::for_testing();
        let now = OffsetDateTime::now_utc();
        let ts = now.unix_timestamp().to_string();
        let body = b"{}";
        let good = sign(&config, "msg_1", &ts, body);
        let header = format!("v1,Zm9v {good}");

        assert!(verify_signature(&config, "msg_1", &ts, &header, body, now).is_ok());
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let config = WebhookConfig::for_testing();
        let now = OffsetDateTime::now_utc();
        let ts = now.unix_timestamp().to_string();

        assert!(verify_signature(&config, "msg_1", &ts, "nonsense", b"{}", now).is_err());
        assert!(verify_signature(&config, "msg_1", "not-a-number", "v1,AAAA", b"{}", now).is_err());
    }
}
