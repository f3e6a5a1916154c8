//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    AgentRepo, BackfillRepo, BootstrapRepo, RateLimitRepo, ReviewRepo, SkillRepo, SyncStateRepo,
    TokenRepo, UserRepo, VoteRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    SkillRepo
    + SyncStateRepo
    + BackfillRepo
    + RateLimitRepo
    + ReviewRepo
    + VoteRepo
    + TokenRepo
    + AgentRepo
    + UserRepo
    + BootstrapRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under test/axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use pavilion_core::{ReviewerKind, SkillRatings};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl SkillRepo for SqliteStore {
        async fn insert_skill(&self, skill: &SkillRow) -> MetadataResult<()> {
            if self.get_skill_by_slug(&skill.slug).await?.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "skill slug '{}' already exists",
                    skill.slug
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO skills (
                    skill_id, external_id, slug, name, description, author, category, tags,
                    downloads, stars, installs,
                    upvotes_human, upvotes_bot, upvotes_verified,
                    downvotes_human, downvotes_bot, downvotes_verified,
                    reviews_human_count, reviews_human_mean,
                    reviews_bot_count, reviews_bot_mean,
                    reviews_verified_count, reviews_verified_mean,
                    hidden, hidden_reason, external_updated_at,
                    created_at, updated_at, last_synced_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(skill.skill_id)
            .bind(&skill.external_id)
            .bind(&skill.slug)
            .bind(&skill.name)
            .bind(&skill.description)
            .bind(&skill.author)
            .bind(&skill.category)
            .bind(&skill.tags)
            .bind(skill.downloads)
            .bind(skill.stars)
            .bind(skill.installs)
            .bind(skill.upvotes_human)
            .bind(skill.upvotes_bot)
            .bind(skill.upvotes_verified)
            .bind(skill.downvotes_human)
            .bind(skill.downvotes_bot)
            .bind(skill.downvotes_verified)
            .bind(skill.reviews_human_count)
            .bind(skill.reviews_human_mean)
            .bind(skill.reviews_bot_count)
            .bind(skill.reviews_bot_mean)
            .bind(skill.reviews_verified_count)
            .bind(skill.reviews_verified_mean)
            .bind(skill.hidden)
            .bind(&skill.hidden_reason)
            .bind(skill.external_updated_at)
            .bind(skill.created_at)
            .bind(skill.updated_at)
            .bind(skill.last_synced_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_skill(&self, skill_id: Uuid) -> MetadataResult<Option<SkillRow>> {
            let row = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills WHERE skill_id = ?")
                .bind(skill_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_skill_by_slug(&self, slug: &str) -> MetadataResult<Option<SkillRow>> {
            let row = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_skill_by_external_id(
            &self,
            external_id: &str,
        ) -> MetadataResult<Option<SkillRow>> {
            let row = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn update_catalog_fields(
            &self,
            skill_id: Uuid,
            update: &CatalogUpdate,
            synced_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            // COALESCE keeps a previously adopted external_id (and an
            // AI-assigned category) when the incoming record omits them.
            let result = sqlx::query(
                r#"
                UPDATE skills SET
                    external_id = COALESCE(?, external_id),
                    name = ?,
                    description = ?,
                    author = ?,
                    category = COALESCE(?, category),
                    tags = ?,
                    downloads = ?,
                    stars = ?,
                    installs = ?,
                    external_updated_at = ?,
                    last_synced_at = ?,
                    updated_at = ?
                WHERE skill_id = ?
                "#,
            )
            .bind(&update.external_id)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.author)
            .bind(&update.category)
            .bind(&update.tags)
            .bind(update.downloads)
            .bind(update.stars)
            .bind(update.installs)
            .bind(update.external_updated_at)
            .bind(synced_at)
            .bind(synced_at)
            .bind(skill_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "skill {skill_id} not found"
                )));
            }
            Ok(())
        }

        async fn set_category(
            &self,
            skill_id: Uuid,
            category: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result =
                sqlx::query("UPDATE skills SET category = ?, updated_at = ? WHERE skill_id = ?")
                    .bind(category)
                    .bind(updated_at)
                    .bind(skill_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "skill {skill_id} not found"
                )));
            }
            Ok(())
        }

        async fn set_hidden(
            &self,
            skill_id: Uuid,
            hidden: bool,
            reason: Option<&str>,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE skills SET hidden = ?, hidden_reason = ?, updated_at = ? WHERE skill_id = ?",
            )
            .bind(hidden)
            .bind(reason)
            .bind(updated_at)
            .bind(skill_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "skill {skill_id} not found"
                )));
            }
            Ok(())
        }

        async fn list_skills(&self, filter: &SkillFilter) -> MetadataResult<Vec<SkillRow>> {
            let mut clauses: Vec<&str> = Vec::new();
            if !filter.include_hidden {
                clauses.push("hidden = 0");
            }
            if filter.category.is_some() {
                clauses.push("category = ?");
            }
            if filter.tag.is_some() {
                clauses.push("tags LIKE ?");
            }
            if filter.search.is_some() {
                clauses.push("(name LIKE ? OR COALESCE(description, '') LIKE ?)");
            }

            let mut query = "SELECT * FROM skills".to_string();
            if !clauses.is_empty() {
                query.push_str(" WHERE ");
                query.push_str(&clauses.join(" AND "));
            }
            query.push_str(" ORDER BY updated_at DESC, slug LIMIT ? OFFSET ?");

            let mut q = sqlx::query_as::<_, SkillRow>(&query);
            if let Some(category) = &filter.category {
                q = q.bind(category.clone());
            }
            if let Some(tag) = &filter.tag {
                // Tags are stored as a canonical lowercase JSON array, so a
                // quoted LIKE pattern matches exact tag membership.
                q = q.bind(format!("%\"{}\"%", tag.trim().to_lowercase()));
            }
            if let Some(search) = &filter.search {
                let pattern = format!("%{search}%");
                q = q.bind(pattern.clone()).bind(pattern);
            }
            let rows = q
                .bind(filter.limit as i64)
                .bind(filter.offset as i64)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn list_skills_page(
            &self,
            after: Option<Uuid>,
            limit: u32,
        ) -> MetadataResult<Vec<SkillRow>> {
            let rows = match after {
                Some(after) => {
                    sqlx::query_as::<_, SkillRow>(
                        "SELECT * FROM skills WHERE skill_id > ? ORDER BY skill_id LIMIT ?",
                    )
                    .bind(after)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, SkillRow>("SELECT * FROM skills ORDER BY skill_id LIMIT ?")
                        .bind(limit as i64)
                        .fetch_all(&self.pool)
                        .await?
                }
            };
            Ok(rows)
        }

        async fn count_visible_skills(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skills WHERE hidden = 0")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn adjust_vote_counter(
            &self,
            skill_id: Uuid,
            kind: ReviewerKind,
            upvote: bool,
            delta: i64,
        ) -> MetadataResult<()> {
            let column = match (upvote, kind) {
                (true, ReviewerKind::Human) => "upvotes_human",
                (true, ReviewerKind::Bot) => "upvotes_bot",
                (true, ReviewerKind::VerifiedBot) => "upvotes_verified",
                (false, ReviewerKind::Human) => "downvotes_human",
                (false, ReviewerKind::Bot) => "downvotes_bot",
                (false, ReviewerKind::VerifiedBot) => "downvotes_verified",
            };
            // Column name comes from the static table above, never from input.
            let query = format!(
                "UPDATE skills SET {column} = MAX(0, {column} + ?) WHERE skill_id = ?"
            );
            let result = sqlx::query(&query)
                .bind(delta)
                .bind(skill_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "skill {skill_id} not found"
                )));
            }
            Ok(())
        }

        async fn write_review_aggregates(
            &self,
            skill_id: Uuid,
            ratings: &SkillRatings,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE skills SET
                    reviews_human_count = ?, reviews_human_mean = ?,
                    reviews_bot_count = ?, reviews_bot_mean = ?,
                    reviews_verified_count = ?, reviews_verified_mean = ?,
                    updated_at = ?
                WHERE skill_id = ?
                "#,
            )
            .bind(ratings.human.count as i64)
            .bind(ratings.human.mean)
            .bind(ratings.bot.count as i64)
            .bind(ratings.bot.mean)
            .bind(ratings.verified_bot.count as i64)
            .bind(ratings.verified_bot.mean)
            .bind(updated_at)
            .bind(skill_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "skill {skill_id} not found"
                )));
            }
            Ok(())
        }

        async fn uncategorized_skills(&self, limit: u32) -> MetadataResult<Vec<SkillRow>> {
            let rows = sqlx::query_as::<_, SkillRow>(
                "SELECT * FROM skills WHERE category IS NULL AND hidden = 0 ORDER BY created_at LIMIT ?",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl SyncStateRepo for SqliteStore {
        async fn get_sync_state(&self, state_key: &str) -> MetadataResult<Option<SyncStateRow>> {
            let row =
                sqlx::query_as::<_, SyncStateRow>("SELECT * FROM sync_state WHERE state_key = ?")
                    .bind(state_key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn ensure_sync_state(
            &self,
            state_key: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<SyncStateRow> {
            sqlx::query(
                "INSERT OR IGNORE INTO sync_state (state_key, status, version, updated_at) VALUES (?, 'idle', 0, ?)",
            )
            .bind(state_key)
            .bind(now)
            .execute(&self.pool)
            .await?;

            self.get_sync_state(state_key).await?.ok_or_else(|| {
                MetadataError::Internal(format!("sync state '{state_key}' missing after ensure"))
            })
        }

        async fn claim_sync_run(
            &self,
            state_key: &str,
            expected_version: i64,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE sync_state SET status = 'running', version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ? AND status IN ('idle', 'error')",
            )
            .bind(now)
            .bind(state_key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn advance_sync_cursor(
            &self,
            state_key: &str,
            expected_version: i64,
            cursor: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE sync_state SET cursor = ?, version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ? AND status = 'running'",
            )
            .bind(cursor)
            .bind(now)
            .bind(state_key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn complete_sync_run(
            &self,
            state_key: &str,
            expected_version: i64,
            cursor: Option<&str>,
            full: bool,
            summary_json: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let query = if full {
                "UPDATE sync_state SET status = 'idle', cursor = ?, last_error = NULL, \
                 summary_json = ?, last_full_sync_at = ?, version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ? AND status = 'running'"
            } else {
                "UPDATE sync_state SET status = 'idle', cursor = ?, last_error = NULL, \
                 summary_json = ?, last_incremental_sync_at = ?, version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ? AND status = 'running'"
            };
            let result = sqlx::query(query)
                .bind(cursor)
                .bind(summary_json)
                .bind(now)
                .bind(now)
                .bind(state_key)
                .bind(expected_version)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn fail_sync_run(
            &self,
            state_key: &str,
            expected_version: i64,
            error: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE sync_state SET status = 'error', last_error = ?, version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ?",
            )
            .bind(error)
            .bind(now)
            .bind(state_key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn force_fail_running_sync(
            &self,
            state_key: &str,
            error: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE sync_state SET status = 'error', last_error = ?, version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND status = 'running'",
            )
            .bind(error)
            .bind(now)
            .bind(state_key)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl BackfillRepo for SqliteStore {
        async fn get_backfill_state(
            &self,
            state_key: &str,
        ) -> MetadataResult<Option<BackfillStateRow>> {
            let row = sqlx::query_as::<_, BackfillStateRow>(
                "SELECT * FROM backfill_state WHERE state_key = ?",
            )
            .bind(state_key)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn ensure_backfill_state(
            &self,
            state_key: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<BackfillStateRow> {
            sqlx::query(
                "INSERT OR IGNORE INTO backfill_state (state_key, version, updated_at) VALUES (?, 0, ?)",
            )
            .bind(state_key)
            .bind(now)
            .execute(&self.pool)
            .await?;

            self.get_backfill_state(state_key).await?.ok_or_else(|| {
                MetadataError::Internal(format!(
                    "backfill state '{state_key}' missing after ensure"
                ))
            })
        }

        async fn advance_backfill_cursor(
            &self,
            state_key: &str,
            expected_version: i64,
            cursor: Option<&str>,
            completed_at: Option<OffsetDateTime>,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE backfill_state SET cursor = ?, \
                 last_completed_at = COALESCE(?, last_completed_at), \
                 version = version + 1, updated_at = ? \
                 WHERE state_key = ? AND version = ?",
            )
            .bind(cursor)
            .bind(completed_at)
            .bind(now)
            .bind(state_key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl RateLimitRepo for SqliteStore {
        async fn try_increment_window(
            &self,
            identity_key: &str,
            window_start: OffsetDateTime,
            limit: i64,
        ) -> MetadataResult<bool> {
            // Create-then-guarded-increment inside one transaction: the
            // UPDATE only fires while count < limit, so a full window is
            // left unchanged and the counter can never exceed the limit.
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT OR IGNORE INTO rate_windows (identity_key, window_start, count, max_requests) \
                 VALUES (?, ?, 0, ?)",
            )
            .bind(identity_key)
            .bind(window_start)
            .bind(limit)
            .execute(&mut *tx)
            .await?;

            let result = sqlx::query(
                "UPDATE rate_windows SET count = count + 1 \
                 WHERE identity_key = ? AND window_start = ? AND count < ?",
            )
            .bind(identity_key)
            .bind(window_start)
            .bind(limit)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(result.rows_affected() > 0)
        }

        async fn get_window(
            &self,
            identity_key: &str,
            window_start: OffsetDateTime,
        ) -> MetadataResult<Option<RateWindowRow>> {
            let row = sqlx::query_as::<_, RateWindowRow>(
                "SELECT * FROM rate_windows WHERE identity_key = ? AND window_start = ?",
            )
            .bind(identity_key)
            .bind(window_start)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn delete_windows_before(&self, cutoff: OffsetDateTime) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM rate_windows WHERE window_start < ?")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl ReviewRepo for SqliteStore {
        async fn upsert_review(&self, review: &ReviewRow) -> MetadataResult<bool> {
            // Existence check before insert: a resubmission with the same
            // (skill, agent) overwrites the prior review in place.
            let mut tx = self.pool.begin().await?;

            let existing: Option<(Uuid,)> = sqlx::query_as(
                "SELECT review_id FROM reviews WHERE skill_id = ? AND agent_id = ?",
            )
            .bind(review.skill_id)
            .bind(review.agent_id)
            .fetch_optional(&mut *tx)
            .await?;

            let inserted = match existing {
                Some((review_id,)) => {
                    sqlx::query(
                        "UPDATE reviews SET reviewer_kind = ?, rating = ?, body = ?, updated_at = ? \
                         WHERE review_id = ?",
                    )
                    .bind(&review.reviewer_kind)
                    .bind(review.rating)
                    .bind(&review.body)
                    .bind(review.updated_at)
                    .bind(review_id)
                    .execute(&mut *tx)
                    .await?;
                    false
                }
                None => {
                    sqlx::query(
                        "INSERT INTO reviews (review_id, skill_id, agent_id, reviewer_kind, rating, body, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(review.review_id)
                    .bind(review.skill_id)
                    .bind(review.agent_id)
                    .bind(&review.reviewer_kind)
                    .bind(review.rating)
                    .bind(&review.body)
                    .bind(review.created_at)
                    .bind(review.updated_at)
                    .execute(&mut *tx)
                    .await?;
                    true
                }
            };

            tx.commit().await?;
            Ok(inserted)
        }

        async fn get_review(
            &self,
            skill_id: Uuid,
            agent_id: Uuid,
        ) -> MetadataResult<Option<ReviewRow>> {
            let row = sqlx::query_as::<_, ReviewRow>(
                "SELECT * FROM reviews WHERE skill_id = ? AND agent_id = ?",
            )
            .bind(skill_id)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn delete_review(&self, skill_id: Uuid, agent_id: Uuid) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM reviews WHERE skill_id = ? AND agent_id = ?")
                .bind(skill_id)
                .bind(agent_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn reviews_for_skill(&self, skill_id: Uuid) -> MetadataResult<Vec<ReviewRow>> {
            let rows = sqlx::query_as::<_, ReviewRow>(
                "SELECT * FROM reviews WHERE skill_id = ? ORDER BY created_at",
            )
            .bind(skill_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_reviews(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl VoteRepo for SqliteStore {
        async fn upsert_vote(&self, vote: &VoteRow) -> MetadataResult<Option<String>> {
            let mut tx = self.pool.begin().await?;

            let existing: Option<(Uuid, String)> = sqlx::query_as(
                "SELECT vote_id, direction FROM votes WHERE skill_id = ? AND agent_id = ?",
            )
            .bind(vote.skill_id)
            .bind(vote.agent_id)
            .fetch_optional(&mut *tx)
            .await?;

            let previous = match existing {
                Some((vote_id, direction)) => {
                    sqlx::query(
                        "UPDATE votes SET voter_kind = ?, direction = ?, updated_at = ? WHERE vote_id = ?",
                    )
                    .bind(&vote.voter_kind)
                    .bind(&vote.direction)
                    .bind(vote.updated_at)
                    .bind(vote_id)
                    .execute(&mut *tx)
                    .await?;
                    Some(direction)
                }
                None => {
                    sqlx::query(
                        "INSERT INTO votes (vote_id, skill_id, agent_id, voter_kind, direction, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(vote.vote_id)
                    .bind(vote.skill_id)
                    .bind(vote.agent_id)
                    .bind(&vote.voter_kind)
                    .bind(&vote.direction)
                    .bind(vote.created_at)
                    .bind(vote.updated_at)
                    .execute(&mut *tx)
                    .await?;
                    None
                }
            };

            tx.commit().await?;
            Ok(previous)
        }

        async fn get_vote(
            &self,
            skill_id: Uuid,
            agent_id: Uuid,
        ) -> MetadataResult<Option<VoteRow>> {
            let row = sqlx::query_as::<_, VoteRow>(
                "SELECT * FROM votes WHERE skill_id = ? AND agent_id = ?",
            )
            .bind(skill_id)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn count_votes(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl TokenRepo for SqliteStore {
        async fn create_token(&self, token: &TokenRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO tokens (token_id, agent_id, token_hash, scopes, expires_at, revoked_at, created_at, last_used_at, description) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(token.token_id)
            .bind(token.agent_id)
            .bind(&token.token_hash)
            .bind(&token.scopes)
            .bind(token.expires_at)
            .bind(token.revoked_at)
            .bind(token.created_at)
            .bind(token.last_used_at)
            .bind(&token.description)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_token(&self, token_id: Uuid) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_id = ?")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn touch_token(
            &self,
            token_id: Uuid,
            used_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE tokens SET last_used_at = ? WHERE token_id = ?")
                .bind(used_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn revoke_token(
            &self,
            token_id: Uuid,
            revoked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE tokens SET revoked_at = ? WHERE token_id = ?")
                .bind(revoked_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "token {token_id} not found"
                )));
            }
            Ok(())
        }

        async fn list_tokens(&self) -> MetadataResult<Vec<TokenRow>> {
            let rows =
                sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl AgentRepo for SqliteStore {
        async fn create_agent(&self, agent: &AgentRow) -> MetadataResult<()> {
            if self.get_agent_by_name(&agent.agent_name).await?.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "agent name '{}' already exists",
                    agent.agent_name
                )));
            }

            sqlx::query(
                "INSERT INTO agents (agent_id, agent_name, contact, kind, claimed_by_user_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(agent.agent_id)
            .bind(&agent.agent_name)
            .bind(&agent.contact)
            .bind(&agent.kind)
            .bind(agent.claimed_by_user_id)
            .bind(agent.created_at)
            .bind(agent.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_agent(&self, agent_id: Uuid) -> MetadataResult<Option<AgentRow>> {
            let row = sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE agent_id = ?")
                .bind(agent_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_agent_by_name(&self, agent_name: &str) -> MetadataResult<Option<AgentRow>> {
            let row = sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE agent_name = ?")
                .bind(agent_name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn claim_agent(
            &self,
            agent_id: Uuid,
            user_id: Uuid,
            claimed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE agents SET kind = 'verified_bot', claimed_by_user_id = ?, updated_at = ? \
                 WHERE agent_id = ?",
            )
            .bind(user_id)
            .bind(claimed_at)
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "agent {agent_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn upsert_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, external_id, handle, email, created_at, updated_at, deleted_at)
                VALUES (?, ?, ?, ?, ?, ?, NULL)
                ON CONFLICT(external_id) DO UPDATE SET
                    handle = excluded.handle,
                    email = excluded.email,
                    updated_at = excluded.updated_at,
                    deleted_at = NULL
                "#,
            )
            .bind(user.user_id)
            .bind(&user.external_id)
            .bind(&user.handle)
            .bind(&user.email)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_user_by_external_id(
            &self,
            external_id: &str,
        ) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn soft_delete_user(
            &self,
            external_id: &str,
            deleted_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE users SET deleted_at = ?, updated_at = ? WHERE external_id = ? AND deleted_at IS NULL",
            )
            .bind(deleted_at)
            .bind(deleted_at)
            .bind(external_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl BootstrapRepo for SqliteStore {
        async fn set_bootstrap_token_id(&self, token_id: Uuid) -> MetadataResult<()> {
            sqlx::query(
                "INSERT OR REPLACE INTO bootstrap (meta_key, token_id) VALUES ('admin_token', ?)",
            )
            .bind(token_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_bootstrap_token_id(&self) -> MetadataResult<Option<Uuid>> {
            let row: Option<(Uuid,)> =
                sqlx::query_as("SELECT token_id FROM bootstrap WHERE meta_key = 'admin_token'")
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.map(|(id,)| id))
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Cached catalog entries
CREATE TABLE IF NOT EXISTS skills (
    skill_id BLOB PRIMARY KEY,
    external_id TEXT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    author TEXT,
    category TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    downloads INTEGER NOT NULL DEFAULT 0,
    stars INTEGER NOT NULL DEFAULT 0,
    installs INTEGER NOT NULL DEFAULT 0,
    upvotes_human INTEGER NOT NULL DEFAULT 0,
    upvotes_bot INTEGER NOT NULL DEFAULT 0,
    upvotes_verified INTEGER NOT NULL DEFAULT 0,
    downvotes_human INTEGER NOT NULL DEFAULT 0,
    downvotes_bot INTEGER NOT NULL DEFAULT 0,
    downvotes_verified INTEGER NOT NULL DEFAULT 0,
    reviews_human_count INTEGER NOT NULL DEFAULT 0,
    reviews_human_mean REAL,
    reviews_bot_count INTEGER NOT NULL DEFAULT 0,
    reviews_bot_mean REAL,
    reviews_verified_count INTEGER NOT NULL DEFAULT 0,
    reviews_verified_mean REAL,
    hidden INTEGER NOT NULL DEFAULT 0,
    hidden_reason TEXT,
    external_updated_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_skills_external_id ON skills(external_id) WHERE external_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_skills_category ON skills(category, hidden);
CREATE INDEX IF NOT EXISTS idx_skills_visible ON skills(hidden, updated_at);

-- Sync checkpoint (singleton per key, CAS on version)
CREATE TABLE IF NOT EXISTS sync_state (
    state_key TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'idle',
    cursor TEXT,
    last_full_sync_at TEXT,
    last_incremental_sync_at TEXT,
    last_error TEXT,
    summary_json TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Backfill checkpoint (singleton per key, CAS on version)
CREATE TABLE IF NOT EXISTS backfill_state (
    state_key TEXT PRIMARY KEY,
    cursor TEXT,
    last_completed_at TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Fixed-window quota counters
CREATE TABLE IF NOT EXISTS rate_windows (
    identity_key TEXT NOT NULL,
    window_start TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    max_requests INTEGER NOT NULL,
    PRIMARY KEY (identity_key, window_start)
);
CREATE INDEX IF NOT EXISTS idx_rate_windows_start ON rate_windows(window_start);

-- Reviews: one active review per (skill, agent)
CREATE TABLE IF NOT EXISTS reviews (
    review_id BLOB PRIMARY KEY,
    skill_id BLOB NOT NULL REFERENCES skills(skill_id),
    agent_id BLOB NOT NULL,
    reviewer_kind TEXT NOT NULL,
    rating INTEGER NOT NULL,
    body TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_skill_agent ON reviews(skill_id, agent_id);

-- Votes: one active vote per (skill, agent)
CREATE TABLE IF NOT EXISTS votes (
    vote_id BLOB PRIMARY KEY,
    skill_id BLOB NOT NULL REFERENCES skills(skill_id),
    agent_id BLOB NOT NULL,
    voter_kind TEXT NOT NULL,
    direction TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_skill_agent ON votes(skill_id, agent_id);

-- Registered agents
CREATE TABLE IF NOT EXISTS agents (
    agent_id BLOB PRIMARY KEY,
    agent_name TEXT NOT NULL UNIQUE,
    contact TEXT,
    kind TEXT NOT NULL DEFAULT 'bot',
    claimed_by_user_id BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- API keys
CREATE TABLE IF NOT EXISTS tokens (
    token_id BLOB PRIMARY KEY,
    agent_id BLOB,
    token_hash TEXT NOT NULL UNIQUE,
    scopes TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT,
    created_at TEXT NOT NULL,
    last_used_at TEXT,
    description TEXT
);

-- Users mirrored from the identity provider
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    handle TEXT,
    email TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Bootstrap bookkeeping
CREATE TABLE IF NOT EXISTS bootstrap (
    meta_key TEXT PRIMARY KEY,
    token_id BLOB NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::repos::sync_state::{CATALOG_SYNC_KEY, REVIEW_BACKFILL_KEY};
    use pavilion_core::{RatingSummary, ReviewerKind, SkillRatings};
    use time::OffsetDateTime;
    use uuid::Uuid;

    async fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        (temp, store)
    }

    fn skill(slug: &str, external_id: Option<&str>) -> SkillRow {
        let now = OffsetDateTime::now_utc();
        SkillRow {
            skill_id: Uuid::new_v4(),
            external_id: external_id.map(|s| s.to_string()),
            slug: slug.to_string(),
            name: slug.to_string(),
            description: None,
            author: None,
            category: None,
            tags: "[]".to_string(),
            downloads: 0,
            stars: 0,
            installs: 0,
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
            external_updated_at: None,
            created_at: now,
            updated_at: now,
            last_synced_at: now,
        }
    }

    #[tokio::test]
    async fn skill_lookup_by_slug_and_external_id() {
        let (_temp, store) = test_store().await;
        let row = skill("web-search", Some("ext-1"));
        store.insert_skill(&row).await.unwrap();

        let by_slug = store.get_skill_by_slug("web-search").await.unwrap();
        assert_eq!(by_slug.unwrap().skill_id, row.skill_id);

        let by_ext = store.get_skill_by_external_id("ext-1").await.unwrap();
        assert_eq!(by_ext.unwrap().skill_id, row.skill_id);

        assert!(store.insert_skill(&skill("web-search", None)).await.is_err());
    }

    #[tokio::test]
    async fn catalog_update_preserves_local_fields() {
        let (_temp, store) = test_store().await;
        let mut row = skill("summarize", None);
        row.upvotes_bot = 7;
        row.reviews_human_count = 2;
        row.reviews_human_mean = Some(4.5);
        row.hidden = true;
        row.hidden_reason = Some("spam".to_string());
        store.insert_skill(&row).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let update = CatalogUpdate {
            external_id: Some("ext-9".to_string()),
            name: "Summarize v2".to_string(),
            description: Some("new".to_string()),
            author: Some("acme".to_string()),
            category: None,
            tags: r#"["nlp"]"#.to_string(),
            downloads: 100,
            stars: 5,
            installs: 42,
            external_updated_at: Some(now),
        };
        store
            .update_catalog_fields(row.skill_id, &update, now)
            .await
            .unwrap();

        let updated = store.get_skill(row.skill_id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Summarize v2");
        assert_eq!(updated.external_id.as_deref(), Some("ext-9"));
        assert_eq!(updated.downloads, 100);
        // Locally-owned fields untouched
        assert_eq!(updated.upvotes_bot, 7);
        assert_eq!(updated.reviews_human_count, 2);
        assert_eq!(updated.reviews_human_mean, Some(4.5));
        assert!(updated.hidden);
        assert_eq!(updated.hidden_reason.as_deref(), Some("spam"));
    }

    #[tokio::test]
    async fn quota_counter_never_exceeds_limit() {
        let (_temp, store) = test_store().await;
        let window = OffsetDateTime::from_unix_timestamp(1_700_000_040).unwrap();

        for _ in 0..3 {
            assert!(store
                .try_increment_window("token:abc", window, 3)
                .await
                .unwrap());
        }
        // Fourth request in the same window is rejected and the counter
        // stays at the limit.
        assert!(!store
            .try_increment_window("token:abc", window, 3)
            .await
            .unwrap());
        let row = store.get_window("token:abc", window).await.unwrap().unwrap();
        assert_eq!(row.count, 3);

        // A later window admits again.
        let next = window + time::Duration::seconds(60);
        assert!(store
            .try_increment_window("token:abc", next, 3)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn quota_windows_prune_before_cutoff() {
        let (_temp, store) = test_store().await;
        let old = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
        let recent = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        store.try_increment_window("a", old, 10).await.unwrap();
        store.try_increment_window("a", recent, 10).await.unwrap();

        let cutoff = OffsetDateTime::from_unix_timestamp(1_650_000_000).unwrap();
        let pruned = store.delete_windows_before(cutoff).await.unwrap();
        assert_eq!(pruned, 1);
        assert!(store.get_window("a", old).await.unwrap().is_none());
        assert!(store.get_window("a", recent).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sync_claim_is_cas_guarded() {
        let (_temp, store) = test_store().await;
        let now = OffsetDateTime::now_utc();
        let state = store.ensure_sync_state(CATALOG_SYNC_KEY, now).await.unwrap();
        assert_eq!(state.status, "idle");
        assert_eq!(state.version, 0);

        assert!(store.claim_sync_run(CATALOG_SYNC_KEY, 0, now).await.unwrap());
        // Second claim with the stale version loses.
        assert!(!store.claim_sync_run(CATALOG_SYNC_KEY, 0, now).await.unwrap());
        // And a claim with the current version still loses while running.
        assert!(!store.claim_sync_run(CATALOG_SYNC_KEY, 1, now).await.unwrap());

        assert!(store
            .advance_sync_cursor(CATALOG_SYNC_KEY, 1, "page-2", now)
            .await
            .unwrap());
        assert!(store
            .complete_sync_run(CATALOG_SYNC_KEY, 2, None, true, "{}", now)
            .await
            .unwrap());

        let state = store.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
        assert_eq!(state.status, "idle");
        assert_eq!(state.cursor, None);
        assert!(state.last_full_sync_at.is_some());
        assert!(state.last_incremental_sync_at.is_none());
    }

    #[tokio::test]
    async fn sync_failure_keeps_cursor() {
        let (_temp, store) = test_store().await;
        let now = OffsetDateTime::now_utc();
        store.ensure_sync_state(CATALOG_SYNC_KEY, now).await.unwrap();
        store.claim_sync_run(CATALOG_SYNC_KEY, 0, now).await.unwrap();
        store
            .advance_sync_cursor(CATALOG_SYNC_KEY, 1, "page-3", now)
            .await
            .unwrap();
        store
            .fail_sync_run(CATALOG_SYNC_KEY, 2, "upstream 500", now)
            .await
            .unwrap();

        let state = store.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
        assert_eq!(state.status, "error");
        assert_eq!(state.cursor.as_deref(), Some("page-3"));
        assert_eq!(state.last_error.as_deref(), Some("upstream 500"));

        // An errored checkpoint can be claimed again for the next run.
        assert!(store
            .claim_sync_run(CATALOG_SYNC_KEY, state.version, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn force_fail_only_hits_running_state() {
        let (_temp, store) = test_store().await;
        let now = OffsetDateTime::now_utc();
        store.ensure_sync_state(CATALOG_SYNC_KEY, now).await.unwrap();
        assert!(!store
            .force_fail_running_sync(CATALOG_SYNC_KEY, "interrupted", now)
            .await
            .unwrap());

        store.claim_sync_run(CATALOG_SYNC_KEY, 0, now).await.unwrap();
        assert!(store
            .force_fail_running_sync(CATALOG_SYNC_KEY, "interrupted", now)
            .await
            .unwrap());
        let state = store.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
        assert_eq!(state.status, "error");
    }

    #[tokio::test]
    async fn backfill_cursor_roundtrip() {
        let (_temp, store) = test_store().await;
        let now = OffsetDateTime::now_utc();
        let state = store
            .ensure_backfill_state(REVIEW_BACKFILL_KEY, now)
            .await
            .unwrap();
        assert_eq!(state.cursor, None);

        assert!(store
            .advance_backfill_cursor(REVIEW_BACKFILL_KEY, 0, Some("abc"), None, now)
            .await
            .unwrap());
        // Stale version loses.
        assert!(!store
            .advance_backfill_cursor(REVIEW_BACKFILL_KEY, 0, Some("def"), None, now)
            .await
            .unwrap());

        assert!(store
            .advance_backfill_cursor(REVIEW_BACKFILL_KEY, 1, None, Some(now), now)
            .await
            .unwrap());
        let state = store
            .get_backfill_state(REVIEW_BACKFILL_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.cursor, None);
        assert!(state.last_completed_at.is_some());
    }

    #[tokio::test]
    async fn review_upsert_overwrites_in_place() {
        let (_temp, store) = test_store().await;
        let s = skill("translate", None);
        store.insert_skill(&s).await.unwrap();
        let agent_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let mut review = ReviewRow {
            review_id: Uuid::new_v4(),
            skill_id: s.skill_id,
            agent_id,
            reviewer_kind: "bot".to_string(),
            rating: 3,
            body: Some("ok".to_string()),
            created_at: now,
            updated_at: now,
        };
        assert!(store.upsert_review(&review).await.unwrap());

        review.review_id = Uuid::new_v4();
        review.rating = 5;
        review.body = Some("great".to_string());
        assert!(!store.upsert_review(&review).await.unwrap());

        let stored = store.get_review(s.skill_id, agent_id).await.unwrap().unwrap();
        assert_eq!(stored.rating, 5);
        assert_eq!(store.count_reviews().await.unwrap(), 1);

        assert!(store.delete_review(s.skill_id, agent_id).await.unwrap());
        assert!(!store.delete_review(s.skill_id, agent_id).await.unwrap());
    }

    #[tokio::test]
    async fn vote_upsert_reports_previous_direction() {
        let (_temp, store) = test_store().await;
        let s = skill("scrape", None);
        store.insert_skill(&s).await.unwrap();
        let agent_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let mut vote = VoteRow {
            vote_id: Uuid::new_v4(),
            skill_id: s.skill_id,
            agent_id,
            voter_kind: "bot".to_string(),
            direction: "up".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(store.upsert_vote(&vote).await.unwrap(), None);

        vote.direction = "down".to_string();
        assert_eq!(
            store.upsert_vote(&vote).await.unwrap(),
            Some("up".to_string())
        );
        assert_eq!(store.count_votes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn review_aggregates_write_back() {
        let (_temp, store) = test_store().await;
        let s = skill("ocr", None);
        store.insert_skill(&s).await.unwrap();

        let ratings = SkillRatings {
            human: RatingSummary {
                count: 2,
                mean: Some(4.5),
            },
            bot: RatingSummary {
                count: 0,
                mean: None,
            },
            verified_bot: RatingSummary {
                count: 1,
                mean: Some(3.0),
            },
        };
        store
            .write_review_aggregates(s.skill_id, &ratings, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let stored = store.get_skill(s.skill_id).await.unwrap().unwrap();
        assert_eq!(stored.reviews_human_count, 2);
        assert_eq!(stored.reviews_human_mean, Some(4.5));
        assert_eq!(stored.reviews_bot_count, 0);
        assert_eq!(stored.reviews_bot_mean, None);
    }

    #[tokio::test]
    async fn list_skills_filters() {
        let (_temp, store) = test_store().await;
        let mut a = skill("alpha", None);
        a.category = Some("data".to_string());
        a.tags = r#"["scraping","web"]"#.to_string();
        let mut b = skill("beta", None);
        b.category = Some("creative".to_string());
        let mut c = skill("gamma", None);
        c.hidden = true;
        store.insert_skill(&a).await.unwrap();
        store.insert_skill(&b).await.unwrap();
        store.insert_skill(&c).await.unwrap();

        let all = store
            .list_skills(&SkillFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2); // hidden excluded

        let data = store
            .list_skills(&SkillFilter {
                category: Some("data".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].slug, "alpha");

        let tagged = store
            .list_skills(&SkillFilter {
                tag: Some("web".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);

        let hidden_too = store
            .list_skills(&SkillFilter {
                include_hidden: true,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hidden_too.len(), 3);
    }

    #[tokio::test]
    async fn user_upsert_and_soft_delete() {
        let (_temp, store) = test_store().await;
        let now = OffsetDateTime::now_utc();
        let user = UserRow {
            user_id: Uuid::new_v4(),
            external_id: "user_ext_1".to_string(),
            handle: Some("ada".to_string()),
            email: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.upsert_user(&user).await.unwrap();
        assert!(store.soft_delete_user("user_ext_1", now).await.unwrap());
        assert!(!store.soft_delete_user("user_ext_1", now).await.unwrap());

        // A later upsert resurrects the account.
        store.upsert_user(&user).await.unwrap();
        let stored = store
            .get_user_by_external_id("user_ext_1")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.deleted_at.is_none());
    }
}
