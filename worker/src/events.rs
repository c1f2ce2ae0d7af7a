//! Event bus shared by the processor and the rest of the daemon.
//!
//! One enum covers both directions: inbound topics that wake the processor
//! (and evict cache families) and outbound lifecycle events that observers
//! use to build job status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Fire-and-forget event sink.
///
/// Implementations must be thread-safe; emitting never blocks and never
/// fails visibly. Handlers must not call back into the processor
/// synchronously except via `trigger()`.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: BusEvent);
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
pub enum BusEvent {
    // Inbound triggers
    StateChanged,
    RecommendationsReady,
    MarketsStatusChanged,
    DividendDetected { isin: String },

    // Outbound lifecycle
    JobStarted(JobStarted),
    JobProgress(JobProgress),
    JobCompleted(JobCompleted),
    JobFailed(JobFailed),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStarted {
    pub work_id: String,
    pub run_id: Uuid,
    pub type_id: String,
    pub subject: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub work_id: String,
    pub run_id: Uuid,
    pub type_id: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobCompleted {
    pub work_id: String,
    pub run_id: Uuid,
    pub type_id: String,
    pub subject: String,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobFailed {
    pub work_id: String,
    pub run_id: Uuid,
    pub type_id: String,
    pub subject: String,
    pub error: String,
    pub duration_ms: u64,
    pub retries: u32,
    pub at: DateTime<Utc>,
}

/// Broadcast-backed bus. Slow receivers lose events rather than exerting
/// backpressure on the processor.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: BusEvent) {
        // No receivers is normal during startup and tests.
        let _ = self.tx.send(event);
    }
}
