use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use common::time::now_epoch;

use crate::repository::{CacheRepository, CacheRow};

/// Durable key/value cache shared by the processor and the work-type chains.
///
/// One schema, two uses:
/// - staleness keys: `queue_key -> expires_at`, value empty, written by the
///   processor after each successful run of an interval-bearing type;
/// - artifact keys: JSON payloads passed between chained work types
///   (`dividend:*`, `optimizer_weights`, ...), expiring like any other row.
pub struct WorkCache {
    repo: Arc<dyn CacheRepository>,
}

impl WorkCache {
    pub fn new(repo: Arc<dyn CacheRepository>) -> Self {
        Self { repo }
    }

    /// Raw expiry for `key`, fresh or not.
    ///
    /// Dependency resolution treats *presence* as satisfaction, so this does
    /// not filter on the clock.
    pub async fn expires_at(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.repo.fetch(key).await?.map(|r| r.expires_at))
    }

    /// Whether `key` exists and has not yet expired at `now`.
    pub async fn is_fresh(&self, key: &str, now: i64) -> Result<bool> {
        Ok(matches!(self.repo.fetch(key).await?, Some(r) if r.expires_at > now))
    }

    /// Writes a staleness marker with no payload.
    #[instrument(skip(self), target = "cache")]
    pub async fn set(&self, key: &str, expires_at: i64) -> Result<()> {
        self.repo
            .upsert(CacheRow {
                key: key.to_string(),
                value: String::new(),
                expires_at,
            })
            .await
    }

    /// Stores an artifact as JSON.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expires_at: i64,
    ) -> Result<()> {
        let value = serde_json::to_string(value).context("serializing cache artifact")?;

        self.repo
            .upsert(CacheRow {
                key: key.to_string(),
                value,
                expires_at,
            })
            .await
    }

    /// Reads an artifact back; `None` signals a miss, which covers both an
    /// absent key and one whose expiry has passed.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = match self.repo.fetch(key).await? {
            Some(r) => r,
            None => return Ok(None),
        };

        if now_epoch() >= row.expires_at {
            debug!(key, "cache artifact expired");
            return Ok(None);
        }

        let value = serde_json::from_str(&row.value)
            .with_context(|| format!("deserializing cache artifact {key}"))?;
        Ok(Some(value))
    }

    #[instrument(skip(self), target = "cache")]
    pub async fn delete(&self, key: &str) -> Result<u64> {
        self.repo.delete(key).await
    }

    #[instrument(skip(self), target = "cache")]
    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        self.repo.delete_prefix(prefix).await
    }

    /// Extends an existing entry by `delta`, anchored to its *current*
    /// expiry, never to the clock. Absent keys are left absent.
    ///
    /// Fetch-then-upsert is not transactional; the only writers racing here
    /// are recomputations that would overwrite the row anyway.
    #[instrument(skip(self), target = "cache")]
    pub async fn extend_expiration(&self, key: &str, delta: Duration) -> Result<()> {
        let row = match self.repo.fetch(key).await? {
            Some(r) => r,
            None => return Ok(()),
        };

        let extended = CacheRow {
            expires_at: row.expires_at.saturating_add(delta.as_secs() as i64),
            ..row
        };
        self.repo.upsert(extended).await
    }
}
