//! Upsert reconciler: merges raw catalog records into the local mirror.
//!
//! Records are matched first by external identifier, falling back to slug
//! for legacy rows created before the catalog exposed identifiers. Only
//! catalog-owned fields are written; moderation flags and local
//! vote/review state survive every re-sync. A malformed record is logged
//! and skipped so it cannot abort the rest of the batch.

use crate::error::CatalogResult;
use pavilion_core::TagSet;
use pavilion_metadata::models::{CatalogUpdate, SkillRow};
use pavilion_metadata::{MetadataError, MetadataStore};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// A catalog record decoded at the ingestion boundary.
///
/// Tolerant of schema drift across catalog API versions: the external
/// identifier is optional (and also accepted under the legacy `id` key),
/// tags arrive as an array or a map, and unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct RawSkillRecord {
    #[serde(default, alias = "id")]
    pub external_id: Option<String>,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub downloads: i64,
    #[serde(default)]
    pub stars: i64,
    #[serde(default)]
    pub installs: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Counters accumulated across one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncStats {
    pub pages: u32,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl SyncStats {
    pub fn merge(&mut self, other: SyncStats) {
        self.pages += other.pages;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

/// Merges fetched catalog records into the skills table.
pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
}

impl Reconciler {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Apply one page of raw records. Returns per-page counters.
    pub async fn apply_page(
        &self,
        records: &[Value],
        now: OffsetDateTime,
    ) -> CatalogResult<SyncStats> {
        let mut stats = SyncStats {
            pages: 1,
            ..Default::default()
        };

        for raw in records {
            let record: RawSkillRecord = match serde_json::from_value(raw.clone()) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed catalog record");
                    stats.skipped += 1;
                    continue;
                }
            };

            if record.slug.trim().is_empty() {
                tracing::warn!("Skipping catalog record with empty slug");
                stats.skipped += 1;
                continue;
            }

            match self.apply_record(record, now).await {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.updated += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping catalog record that failed to apply");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Apply one record. Returns true when a new row was inserted.
    async fn apply_record(
        &self,
        record: RawSkillRecord,
        now: OffsetDateTime,
    ) -> CatalogResult<bool> {
        let existing = self.find_existing(&record).await?;

        let update = CatalogUpdate {
            external_id: record.external_id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            author: record.author.clone(),
            category: record.category.clone(),
            tags: record.tags.to_json(),
            downloads: record.downloads,
            stars: record.stars,
            installs: record.installs,
            external_updated_at: record.updated_at,
        };

        if let Some(existing) = existing {
            self.metadata
                .update_catalog_fields(existing.skill_id, &update, now)
                .await?;
            return Ok(false);
        }

        let row = new_skill_row(&record, now);
        match self.metadata.insert_skill(&row).await {
            Ok(()) => Ok(true),
            // A concurrent writer inserted the slug between lookup and
            // insert; fall back to updating the row it created.
            Err(MetadataError::AlreadyExists(_)) => {
                let existing = self
                    .metadata
                    .get_skill_by_slug(&record.slug)
                    .await?
                    .ok_or_else(|| {
                        MetadataError::Internal(format!(
                            "skill '{}' vanished after conflicting insert",
                            record.slug
                        ))
                    })?;
                self.metadata
                    .update_catalog_fields(existing.skill_id, &update, now)
                    .await?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Locate an existing row by external identifier, falling back to
    /// slug. Legacy rows without an identifier adopt the incoming one on
    /// their next catalog update.
    async fn find_existing(&self, record: &RawSkillRecord) -> CatalogResult<Option<SkillRow>> {
        if let Some(external_id) = &record.external_id {
            if let Some(row) = self.metadata.get_skill_by_external_id(external_id).await? {
                return Ok(Some(row));
            }
        }
        Ok(self.metadata.get_skill_by_slug(&record.slug).await?)
    }
}

/// Build a fresh row for a first-seen skill: catalog fields populated,
/// locally-owned fields zeroed.
fn new_skill_row(record: &RawSkillRecord, now: OffsetDateTime) -> SkillRow {
    SkillRow {
        skill_id: Uuid::new_v4(),
        external_id: record.external_id.clone(),
        slug: record.slug.trim().to_string(),
        name: record.name.clone(),
        description: record.description.clone(),
        author: record.author.clone(),
        category: record.category.clone(),
        tags: record.tags.to_json(),
        downloads: record.downloads,
        stars: record.stars,
        installs: record.installs,
        upvotes_human: 0,
        upvotes_bot: 0,
        upvotes_verified: 0,
        downvotes_human: 0,
        downvotes_bot: 0,
        downvotes_verified: 0,
        reviews_human_count: 0,
        reviews_human_mean: None,
        reviews_bot_count: 0,
        reviews_bot_mean: None,
        reviews_verified_count: 0,
        reviews_verified_mean: None,
        hidden: false,
        hidden_reason: None,
        external_updated_at: record.updated_at,
        created_at: now,
        updated_at: now,
        last_synced_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_decodes_array_tags() {
        let record: RawSkillRecord = serde_json::from_value(json!({
            "external_id": "ext-1",
            "slug": "web-search",
            "name": "Web Search",
            "tags": ["Web", "search"]
        }))
        .unwrap();
        assert_eq!(record.tags.as_slice(), &["search", "web"]);
    }

    #[test]
    fn test_record_decodes_map_tags_and_id_alias() {
        let record: RawSkillRecord = serde_json::from_value(json!({
            "id": "ext-2",
            "slug": "summarize",
            "name": "Summarize",
            "tags": {"nlp": true, "old": false},
            "downloads": 12
        }))
        .unwrap();
        assert_eq!(record.external_id.as_deref(), Some("ext-2"));
        assert_eq!(record.tags.as_slice(), &["nlp"]);
        assert_eq!(record.downloads, 12);
    }

    #[test]
    fn test_record_without_slug_fails_to_decode() {
        let result: Result<RawSkillRecord, _> =
            serde_json::from_value(json!({"name": "No Slug"}));
        assert!(result.is_err());
    }
}
