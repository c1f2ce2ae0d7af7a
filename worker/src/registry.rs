//! Registry of work-type definitions.
//!
//! Registration order matters: the processor scans types in the order they
//! were registered, which is what gives the catalog its admission order.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::types::WorkType;

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    types: HashMap<String, WorkType>,
}

/// Insertion-ordered map from work-type id to definition.
///
/// Reads are frequent (every populate pass); writes happen only while the
/// catalog is being assembled at startup.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `wt`, replacing any existing definition with the same id.
    /// Replacement keeps the original registration position.
    pub fn register(&self, wt: WorkType) {
        let mut inner = self.inner.write();

        let id = wt.id.clone();
        if inner.types.insert(id.clone(), wt).is_none() {
            inner.order.push(id.clone());
        }

        debug!(work_type = %id, count = inner.order.len(), "work type registered");
    }

    pub fn get(&self, id: &str) -> Option<WorkType> {
        self.inner.read().types.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.read().types.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All definitions in registration order.
    pub fn all(&self) -> Vec<WorkType> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.types.get(id).cloned())
            .collect()
    }

    /// The types `id` depends on. Missing references are filtered out, not
    /// errors; the resolver warns about them at execution time.
    pub fn dependencies_of(&self, id: &str) -> Vec<WorkType> {
        let inner = self.inner.read();
        let Some(wt) = inner.types.get(id) else {
            return Vec::new();
        };
        wt.depends_on
            .iter()
            .filter_map(|dep| inner.types.get(dep).cloned())
            .collect()
    }

    /// The types that declare a dependency on `id`, in registration order.
    pub fn dependents_of(&self, id: &str) -> Vec<WorkType> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|tid| inner.types.get(tid))
            .filter(|wt| wt.depends_on.iter().any(|dep| dep == id))
            .cloned()
            .collect()
    }
}
