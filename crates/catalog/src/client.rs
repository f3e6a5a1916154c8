//! HTTP client for the external skills catalog.
//!
//! Fetches externally-paginated skill records with bounded retries and a
//! fixed delay between attempts. Records are returned as raw JSON values;
//! decoding happens per record in the reconciler so one malformed record
//! can never fail a whole page.

use crate::error::{CatalogError, CatalogResult};
use pavilion_core::config::CatalogConfig;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// One page of raw catalog records.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub records: Vec<Value>,
    /// Opaque resume token for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Wire envelope of the catalog list endpoint.
#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    skills: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Client for the external catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    page_size: u32,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CatalogClient {
    /// Build a client from configuration.
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        // A trailing slash keeps Url::join from replacing the last path
        // segment of a base like "https://host/api".
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| CatalogError::Url(format!("{}: {e}", config.base_url)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url,
            page_size: config.page_size,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// Fetch one page of records, resuming from `cursor` if given.
    ///
    /// Retries transport failures and non-success statuses up to the
    /// configured attempt count with a fixed delay, then reports
    /// `RetriesExhausted` carrying the last error.
    pub async fn fetch_page(&self, cursor: Option<&str>) -> CatalogResult<CatalogPage> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.fetch_page_once(cursor).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        tracing::warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %last_error,
                            "Catalog page fetch failed, retrying"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(CatalogError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn fetch_page_once(&self, cursor: Option<&str>) -> CatalogResult<CatalogPage> {
        let mut url = self
            .base_url
            .join("skills")
            .map_err(|e| CatalogError::Url(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string());
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let envelope: PageEnvelope =
            serde_json::from_str(&body).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(CatalogPage {
            records: envelope.skills,
            next_cursor: envelope.next_cursor,
        })
    }
}

/// Cap error bodies to keep persisted error messages and logs small.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = CatalogConfig::default();
        config.base_url = "not a url".to_string();
        assert!(CatalogClient::new(&config).is_err());
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: PageEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.skills.is_empty());
        assert!(envelope.next_cursor.is_none());
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.len() <= 260);
        assert!(truncated.ends_with("..."));
    }
}
