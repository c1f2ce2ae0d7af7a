use anyhow::Result;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::repository::{CacheRepository, CacheRow};

/// SQLx-backed implementation of CacheRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxCacheRepository {
    pool: AnyPool,
}

impl SqlxCacheRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl CacheRepository for SqlxCacheRepository {
    async fn fetch(&self, key: &str) -> Result<Option<CacheRow>> {
        let row = sqlx::query(
            r#"
SELECT key, value, expires_at
FROM work_cache
WHERE key = ?;
"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CacheRow {
            key: r.get::<String, _>("key"),
            value: r.get::<String, _>("value"),
            expires_at: r.get::<i64, _>("expires_at"),
        }))
    }

    async fn upsert(&self, row: CacheRow) -> Result<()> {
        sqlx::query(
            r#"
INSERT INTO work_cache (key, value, expires_at)
VALUES (?, ?, ?)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at;
"#,
        )
        .bind(&row.key)
        .bind(&row.value)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let res = sqlx::query(r#"DELETE FROM work_cache WHERE key = ?;"#)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        // `escape_like` keeps user-visible prefixes literal; `%` and `_` are
        // LIKE metacharacters.
        let pattern = format!("{}%", escape_like(prefix));

        let res = sqlx::query(r#"DELETE FROM work_cache WHERE key LIKE ? ESCAPE '\';"#)
            .bind(pattern)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
