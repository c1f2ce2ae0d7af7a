use anyhow::Result;
use async_trait::async_trait;

/// One durable cache row.
///
/// `expires_at` is whole seconds since the Unix epoch. Staleness rows carry
/// an empty `value`; artifact rows carry a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub key: String,
    pub value: String,
    pub expires_at: i64,
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<CacheRow>>;

    /// Inserts or replaces the row for `row.key`.
    async fn upsert(&self, row: CacheRow) -> Result<()>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64>;

    /// Removes every row whose key starts with `prefix`; returns the count.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}
