use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn list_skills(&self, query: &SkillQuery) -> Result<ListSkillsResponse> {
        let mut url = self.url("/v1/skills")?;
        if let Some(category) = &query.category {
            url.query_pairs_mut().append_pair("category", category);
        }
        if let Some(tag) = &query.tag {
            url.query_pairs_mut().append_pair("tag", tag);
        }
        if let Some(q) = &query.search {
            url.query_pairs_mut().append_pair("q", q);
        }
        if let Some(limit) = query.limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        self.send_json(self.http.get(url)).await
    }

    pub async fn get_skill(&self, slug: &str) -> Result<SkillDetailResponse> {
        let url = self.url(&format!("/v1/skills/{slug}"))?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_token(&self, req: CreateTokenRequest) -> Result<CreateTokenResponse> {
        let url = self.url("/v1/admin/tokens")?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn list_tokens(&self) -> Result<ListTokensResponse> {
        let url = self.url("/v1/admin/tokens")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn revoke_token(&self, id: &str) -> Result<serde_json::Value> {
        let url = self.url(&format!("/v1/admin/tokens/{id}"))?;
        self.send_json(self.http.delete(url)).await
    }

    pub async fn trigger_sync(&self) -> Result<serde_json::Value> {
        let url = self.url("/v1/admin/sync")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn sync_status(&self) -> Result<serde_json::Value> {
        let url = self.url("/v1/admin/sync")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn trigger_backfill(&self) -> Result<serde_json::Value> {
        let url = self.url("/v1/admin/backfill")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn hide_skill(&self, slug: &str, reason: Option<&str>) -> Result<serde_json::Value> {
        let url = self.url(&format!("/v1/admin/skills/{slug}/hide"))?;
        let body = serde_json::json!({"reason": reason});
        self.send_json(self.http.post(url).json(&body)).await
    }

    pub async fn unhide_skill(&self, slug: &str) -> Result<serde_json::Value> {
        let url = self.url(&format!("/v1/admin/skills/{slug}/unhide"))?;
        self.send_json(self.http.post(url)).await
    }
}

// =============================================================================
// Request/response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Default)]
pub struct SkillQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListSkillsResponse {
    pub skills: Vec<serde_json::Value>,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct SkillDetailResponse {
    pub skill: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenRequest {
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenResponse {
    pub token_id: String,
    pub token_secret: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub token_id: String,
    pub agent_id: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<String>,
    pub revoked_at: Option<String>,
    pub created_at: Option<String>,
    pub last_used_at: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTokensResponse {
    pub tokens: Vec<TokenInfo>,
}
