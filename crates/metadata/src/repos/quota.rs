//! Fixed-window quota repository.

use crate::error::MetadataResult;
use crate::models::RateWindowRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for fixed-window request counters.
#[async_trait]
pub trait RateLimitRepo: Send + Sync {
    /// Atomically test-and-increment the counter for
    /// `(identity_key, window_start)`.
    ///
    /// Creates the window row at zero if absent, then increments only
    /// while the count is below `limit`. Returns true when the request is
    /// admitted; false leaves the counter unchanged, so it can never
    /// exceed the limit.
    async fn try_increment_window(
        &self,
        identity_key: &str,
        window_start: OffsetDateTime,
        limit: i64,
    ) -> MetadataResult<bool>;

    /// Read a window counter.
    async fn get_window(
        &self,
        identity_key: &str,
        window_start: OffsetDateTime,
    ) -> MetadataResult<Option<RateWindowRow>>;

    /// Delete windows that started before the cutoff. Returns the number
    /// of rows pruned.
    async fn delete_windows_before(&self, cutoff: OffsetDateTime) -> MetadataResult<u64>;
}
