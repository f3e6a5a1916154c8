//! AI-assisted categorization for skills the catalog left uncategorized.
//!
//! Sends a constrained completion request per skill and only accepts a
//! response that exactly matches the category vocabulary. A skill whose
//! completion fails or falls outside the vocabulary is logged and skipped;
//! it stays uncategorized and is retried on a later run.

use crate::error::{CatalogError, CatalogResult};
use pavilion_core::config::CategorizeConfig;
use pavilion_metadata::MetadataStore;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// The fixed category vocabulary. Completions outside this list are
/// rejected rather than stored.
pub const CATEGORY_VOCABULARY: &[&str] = &[
    "automation",
    "communication",
    "creative",
    "data",
    "development",
    "productivity",
    "research",
    "utilities",
];

const SYSTEM_PROMPT: &str = "\
You are a classifier for a directory of AI agent skills. Given a skill's \
name and description, respond with EXACTLY one lowercase word from this \
list and nothing else: automation, communication, creative, data, \
development, productivity, research, utilities.";

/// Minimal completion-API client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl LlmClient {
    pub fn new(config: &CategorizeConfig) -> CatalogResult<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| CatalogError::Url(format!("{}: {e}", config.base_url)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Ask the model for a category. Returns `None` when the completion
    /// falls outside the vocabulary.
    pub async fn suggest_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> CatalogResult<Option<String>> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| CatalogError::Url(e.to_string()))?;

        let user_prompt = match description {
            Some(description) => format!("Name: {name}\nDescription: {description}"),
            None => format!("Name: {name}"),
        };

        let body = json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": 8,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
        });

        let mut request = self.http.post(url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: text.chars().take(256).collect(),
            });
        }

        let completion: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| CatalogError::Decode(e.to_string()))?;
        let answer = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_lowercase())
            .unwrap_or_default();

        Ok(validate_category(&answer))
    }
}

/// Accept only exact vocabulary matches.
fn validate_category(answer: &str) -> Option<String> {
    CATEGORY_VOCABULARY
        .iter()
        .find(|c| **c == answer)
        .map(|c| c.to_string())
}

/// Drives categorization over a bounded batch of uncategorized skills.
pub struct CategorizeRunner {
    metadata: Arc<dyn MetadataStore>,
    client: LlmClient,
    config: CategorizeConfig,
}

impl CategorizeRunner {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        client: LlmClient,
        config: CategorizeConfig,
    ) -> Self {
        Self {
            metadata,
            client,
            config,
        }
    }

    /// Categorize up to `batch_size` skills. Returns the number updated.
    pub async fn run(&self) -> CatalogResult<u64> {
        let skills = self
            .metadata
            .uncategorized_skills(self.config.batch_size)
            .await?;
        let mut categorized = 0;

        for skill in skills {
            match self
                .client
                .suggest_category(&skill.name, skill.description.as_deref())
                .await
            {
                Ok(Some(category)) => {
                    self.metadata
                        .set_category(skill.skill_id, &category, OffsetDateTime::now_utc())
                        .await?;
                    categorized += 1;
                    tracing::debug!(slug = %skill.slug, category = %category, "Skill categorized");
                }
                Ok(None) => {
                    tracing::warn!(
                        slug = %skill.slug,
                        "Model answered outside the category vocabulary, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(slug = %skill.slug, error = %e, "Categorization failed, skipping");
                }
            }
        }

        if categorized > 0 {
            tracing::info!(categorized, "Categorization run finished");
        }
        Ok(categorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_category_exact_match_only() {
        assert_eq!(validate_category("data"), Some("data".to_string()));
        assert_eq!(validate_category("Data!"), None);
        assert_eq!(validate_category(""), None);
        assert_eq!(validate_category("finance"), None);
    }

    #[test]
    fn test_vocabulary_is_lowercase() {
        for category in CATEGORY_VOCABULARY {
            assert_eq!(*category, category.to_lowercase());
        }
    }
}
