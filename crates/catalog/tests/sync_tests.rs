//! Integration tests for the sync driver, reconciler, and backfill,
//! driven against a stub catalog server on an ephemeral port.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use pavilion_catalog::{BackfillRunner, CatalogClient, SyncOutcome, SyncRunner};
use pavilion_core::config::{BackfillConfig, CatalogConfig};
use pavilion_metadata::models::ReviewRow;
use pavilion_metadata::repos::sync_state::{CATALOG_SYNC_KEY, REVIEW_BACKFILL_KEY};
use pavilion_metadata::{MetadataStore, SqliteStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

/// In-memory catalog stub: a fixed sequence of pages, optionally failing
/// the next N requests with a 500.
struct StubCatalog {
    pages: Vec<Vec<Value>>,
    fail_next: AtomicU32,
    hits: AtomicU32,
}

impl StubCatalog {
    fn new(pages: Vec<Vec<Value>>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail_next: AtomicU32::new(0),
            hits: AtomicU32::new(0),
        })
    }

    fn fail_next_requests(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

async fn stub_handler(
    State(stub): State<Arc<StubCatalog>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    stub.hits.fetch_add(1, Ordering::SeqCst);

    let remaining = stub.fail_next.load(Ordering::SeqCst);
    if remaining > 0 {
        stub.fail_next.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }

    let index: usize = params
        .get("cursor")
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let page = stub.pages.get(index).cloned().unwrap_or_default();
    let next_cursor = if index + 1 < stub.pages.len() {
        Some((index + 1).to_string())
    } else {
        None
    };

    axum::Json(json!({"skills": page, "next_cursor": next_cursor})).into_response()
}

/// Serve the stub on an ephemeral port and return its base URL.
async fn serve_stub(stub: Arc<StubCatalog>) -> String {
    let router = Router::new()
        .route("/skills", get(stub_handler))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}/")
}

async fn test_metadata() -> (tempfile::TempDir, Arc<dyn MetadataStore>) {
    let temp = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(temp.path().join("metadata.db"))
        .await
        .unwrap();
    (temp, Arc::new(store))
}

fn sync_config(base_url: String, max_pages: u32) -> CatalogConfig {
    let mut config = CatalogConfig::default();
    config.base_url = base_url;
    config.max_pages = max_pages;
    config.max_attempts = 2;
    config.retry_delay_ms = 10;
    config.timeout_secs = 5;
    config.schedule_enabled = false;
    config
}

fn runner(metadata: Arc<dyn MetadataStore>, config: CatalogConfig) -> SyncRunner {
    let client = CatalogClient::new(&config).unwrap();
    SyncRunner::new(metadata, client, config)
}

fn record(slug: &str, external_id: Option<&str>) -> Value {
    let mut value = json!({
        "slug": slug,
        "name": format!("Skill {slug}"),
        "description": format!("Does {slug} things"),
        "tags": ["testing"],
        "downloads": 5,
    });
    if let Some(external_id) = external_id {
        value["external_id"] = json!(external_id);
    }
    value
}

async fn count_skills(metadata: &Arc<dyn MetadataStore>) -> usize {
    metadata.list_skills_page(None, 10_000).await.unwrap().len()
}

#[tokio::test]
async fn test_full_sync_then_idempotent_resync() {
    let (_temp, metadata) = test_metadata().await;
    let stub = StubCatalog::new(vec![
        vec![
            record("alpha", Some("ext-a")),
            record("beta", Some("ext-b")),
        ],
        vec![record("gamma", Some("ext-c"))],
    ]);
    let base_url = serve_stub(stub.clone()).await;
    let runner = runner(metadata.clone(), sync_config(base_url, 10));

    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => {
            assert_eq!(stats.pages, 2);
            assert_eq!(stats.inserted, 3);
            assert_eq!(stats.updated, 0);
        }
        SyncOutcome::Skipped => panic!("first run should not skip"),
    }
    assert_eq!(count_skills(&metadata).await, 3);

    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.status, "idle");
    assert_eq!(state.cursor, None);
    assert!(state.last_full_sync_at.is_some());
    let summary = state.summary().unwrap();
    assert_eq!(summary.total_visible, 3);
    assert_eq!(summary.tags.get("testing"), Some(&3));

    // Mark local state the sync must not clobber
    let alpha = metadata.get_skill_by_slug("alpha").await.unwrap().unwrap();
    metadata
        .adjust_vote_counter(
            alpha.skill_id,
            pavilion_core::ReviewerKind::Bot,
            true,
            5,
        )
        .await
        .unwrap();
    metadata
        .set_hidden(
            alpha.skill_id,
            true,
            Some("spam"),
            OffsetDateTime::now_utc(),
        )
        .await
        .unwrap();

    // A second run over the same payload updates in place
    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => {
            assert_eq!(stats.inserted, 0);
            assert_eq!(stats.updated, 3);
        }
        SyncOutcome::Skipped => panic!("second run should not skip"),
    }
    assert_eq!(count_skills(&metadata).await, 3);

    let alpha = metadata.get_skill_by_slug("alpha").await.unwrap().unwrap();
    assert_eq!(alpha.upvotes_bot, 5);
    assert!(alpha.hidden);
    assert_eq!(alpha.hidden_reason.as_deref(), Some("spam"));

    // The refreshed summary excludes the hidden skill
    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.summary().unwrap().total_visible, 2);
}

#[tokio::test]
async fn test_slug_only_records_never_duplicate() {
    let (_temp, metadata) = test_metadata().await;

    // A page of 50 skills with no external identifier on any record
    let page: Vec<Value> = (0..50)
        .map(|i| record(&format!("skill-{i:02}"), None))
        .collect();
    let stub = StubCatalog::new(vec![page]);
    let base_url = serve_stub(stub).await;
    let runner = runner(metadata.clone(), sync_config(base_url, 10));

    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => assert_eq!(stats.inserted, 50),
        SyncOutcome::Skipped => panic!("run skipped"),
    }
    assert_eq!(count_skills(&metadata).await, 50);

    // The same payload again updates the same 50 rows, zero new rows
    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => {
            assert_eq!(stats.inserted, 0);
            assert_eq!(stats.updated, 50);
        }
        SyncOutcome::Skipped => panic!("run skipped"),
    }
    assert_eq!(count_skills(&metadata).await, 50);
}

#[tokio::test]
async fn test_retry_exhaustion_persists_error_and_next_run_recovers() {
    let (_temp, metadata) = test_metadata().await;
    let stub = StubCatalog::new(vec![vec![record("alpha", Some("ext-a"))]]);
    let base_url = serve_stub(stub.clone()).await;
    let runner = runner(metadata.clone(), sync_config(base_url, 10));

    // Both attempts fail: the run aborts and persists the error status
    stub.fail_next_requests(2);
    assert!(runner.run().await.is_err());

    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.status, "error");
    assert!(state.last_error.as_deref().unwrap().contains("retries exhausted"));
    assert_eq!(count_skills(&metadata).await, 0);

    // The next scheduled run claims the errored checkpoint and succeeds
    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => assert_eq!(stats.inserted, 1),
        SyncOutcome::Skipped => panic!("recovery run skipped"),
    }
    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.status, "idle");
    assert_eq!(state.last_error, None);
}

#[tokio::test]
async fn test_page_budget_leaves_resumable_cursor() {
    let (_temp, metadata) = test_metadata().await;
    let stub = StubCatalog::new(vec![
        vec![record("one", Some("ext-1"))],
        vec![record("two", Some("ext-2"))],
    ]);
    let base_url = serve_stub(stub).await;

    // Budget of one page per invocation
    let runner = runner(metadata.clone(), sync_config(base_url, 1));

    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => assert_eq!(stats.inserted, 1),
        SyncOutcome::Skipped => panic!("run skipped"),
    }
    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.status, "idle");
    assert_eq!(state.cursor.as_deref(), Some("1"));
    assert!(state.last_full_sync_at.is_some());

    // The next invocation resumes from the cursor instead of restarting
    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => {
            assert_eq!(stats.inserted, 1);
            assert_eq!(stats.pages, 1);
        }
        SyncOutcome::Skipped => panic!("run skipped"),
    }
    let state = metadata.get_sync_state(CATALOG_SYNC_KEY).await.unwrap().unwrap();
    assert_eq!(state.cursor, None);
    assert!(state.last_incremental_sync_at.is_some());
    assert_eq!(count_skills(&metadata).await, 2);
}

#[tokio::test]
async fn test_malformed_record_does_not_abort_batch() {
    let (_temp, metadata) = test_metadata().await;
    let stub = StubCatalog::new(vec![vec![
        record("good-one", Some("ext-1")),
        json!({"name": "No Slug At All"}),
        json!({"slug": "", "name": "Empty Slug"}),
        record("good-two", Some("ext-2")),
    ]]);
    let base_url = serve_stub(stub).await;
    let runner = runner(metadata.clone(), sync_config(base_url, 10));

    match runner.run().await.unwrap() {
        SyncOutcome::Completed(stats) => {
            assert_eq!(stats.inserted, 2);
            assert_eq!(stats.skipped, 2);
        }
        SyncOutcome::Skipped => panic!("run skipped"),
    }
    assert_eq!(count_skills(&metadata).await, 2);
}

// =============================================================================
// Stat backfill
// =============================================================================

async fn seed_skill(metadata: &Arc<dyn MetadataStore>, slug: &str) -> Uuid {
    let now = OffsetDateTime::now_utc();
    let skill = pavilion_metadata::models::SkillRow {
        skill_id: Uuid::new_v4(),
        external_id: None,
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
    };
    metadata.insert_skill(&skill).await.unwrap();
    skill.skill_id
}

async fn seed_review(
    metadata: &Arc<dyn MetadataStore>,
    skill_id: Uuid,
    kind: &str,
    rating: i64,
) {
    let now = OffsetDateTime::now_utc();
    let review = ReviewRow {
        review_id: Uuid::new_v4(),
        skill_id,
        agent_id: Uuid::new_v4(),
        reviewer_kind: kind.to_string(),
        rating,
        body: None,
        created_at: now,
        updated_at: now,
    };
    metadata.upsert_review(&review).await.unwrap();
}

#[tokio::test]
async fn test_backfill_resumes_across_invocations_until_done() {
    let (_temp, metadata) = test_metadata().await;

    let mut skill_ids = Vec::new();
    for i in 0..5 {
        skill_ids.push(seed_skill(&metadata, &format!("skill-{i}")).await);
    }
    // Reviews on the first skill only (by skill_id order they may differ,
    // but every skill gets recomputed regardless)
    seed_review(&metadata, skill_ids[0], "human", 4).await;
    seed_review(&metadata, skill_ids[0], "human", 5).await;
    seed_review(&metadata, skill_ids[0], "bot", 2).await;

    let config = BackfillConfig {
        batch_size: 2,
        max_batches: 1,
        schedule_enabled: false,
        interval_secs: 300,
    };
    let runner = BackfillRunner::new(metadata.clone(), config);

    // 5 skills at 2 per invocation: two partial invocations, then the
    // third processes the final short page and completes the pass.
    let mut total = 0;
    let mut passes = 0;
    for _ in 0..4 {
        let outcome = runner.run().await.unwrap();
        assert!(!outcome.lost_checkpoint);
        total += outcome.skills_processed;
        if outcome.completed_pass {
            passes += 1;
            break;
        }
        // Mid-pass the cursor is persisted and non-empty
        let state = metadata
            .get_backfill_state(REVIEW_BACKFILL_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(state.cursor.is_some());
    }
    assert_eq!(passes, 1);
    assert_eq!(total, 5);

    // Completed pass clears the cursor and stamps the time
    let state = metadata
        .get_backfill_state(REVIEW_BACKFILL_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.cursor, None);
    assert!(state.last_completed_at.is_some());

    // Aggregates landed: the reviewed skill has partitioned means
    let reviewed = metadata.get_skill(skill_ids[0]).await.unwrap().unwrap();
    assert_eq!(reviewed.reviews_human_count, 2);
    assert_eq!(reviewed.reviews_human_mean, Some(4.5));
    assert_eq!(reviewed.reviews_bot_count, 1);
    assert_eq!(reviewed.reviews_bot_mean, Some(2.0));
    assert_eq!(reviewed.reviews_verified_count, 0);
    assert_eq!(reviewed.reviews_verified_mean, None);

    // An unreviewed skill reports no rating, not zero
    let unreviewed = metadata.get_skill(skill_ids[1]).await.unwrap().unwrap();
    assert_eq!(unreviewed.reviews_human_count, 0);
    assert_eq!(unreviewed.reviews_human_mean, None);

    // The next invocation starts a fresh pass from the beginning
    let outcome = runner.run().await.unwrap();
    assert_eq!(outcome.skills_processed, 2);
    assert!(!outcome.completed_pass);
}
