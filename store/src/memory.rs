use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::repository::{CacheRepository, CacheRow};

/// In-memory CacheRepository.
///
/// Used by tests and by ephemeral runs that do not need the cache to survive
/// a restart. A BTreeMap keeps prefix scans cheap.
#[derive(Default)]
pub struct MemoryCacheRepository {
    rows: Mutex<BTreeMap<String, CacheRow>>,
}

impl MemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl CacheRepository for MemoryCacheRepository {
    async fn fetch(&self, key: &str) -> Result<Option<CacheRow>> {
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn upsert(&self, row: CacheRow) -> Result<()> {
        self.rows.lock().insert(row.key.clone(), row);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        Ok(self.rows.lock().remove(key).map_or(0, |_| 1))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut rows = self.rows.lock();
        let doomed: Vec<String> = rows
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        for k in &doomed {
            rows.remove(k);
        }

        Ok(doomed.len() as u64)
    }
}
