use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
///
/// Read by the health check and by tests; never consulted for behavior.
#[derive(Clone, Default)]
pub struct Counters {
    pub started: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
    pub retried: Arc<AtomicU64>,
    pub dropped: Arc<AtomicU64>,

    // skip reasons during queue population
    pub skip_queued: Arc<AtomicU64>,
    pub skip_timing: Arc<AtomicU64>,
    pub skip_fresh: Arc<AtomicU64>,

    pub cycles_detected: Arc<AtomicU64>,
}
