//! Tests for the CLI API client.

use pavilion_cli::api_client::{ApiClient, CreateTokenRequest};

#[test]
fn test_client_rejects_invalid_url() {
    assert!(ApiClient::new("not a url", "key").is_err());
    assert!(ApiClient::new("http://localhost:8080", "key").is_ok());
}

#[test]
fn test_create_token_request_omits_absent_fields() {
    let request = CreateTokenRequest {
        scopes: vec!["admin".to_string()],
        agent_id: None,
        expires_in_secs: None,
        description: None,
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["scopes"][0], "admin");
    assert!(json.get("agent_id").is_none());
    assert!(json.get("expires_in_secs").is_none());
}

#[test]
fn test_create_token_request_serializes_expiry() {
    let request = CreateTokenRequest {
        scopes: vec!["skills:read".to_string()],
        agent_id: Some("2c3a4e9e-0000-0000-0000-000000000000".to_string()),
        expires_in_secs: Some(3600),
        description: Some("ci key".to_string()),
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["expires_in_secs"], 3600);
    assert_eq!(json["description"], "ci key");
}
