use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // The only durable state: staleness markers and inter-step artifacts,
    // both keyed by queue key.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS work_cache (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  expires_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_work_cache_expires ON work_cache(expires_at);"#)
        .execute(pool)
        .await?;

    Ok(())
}
