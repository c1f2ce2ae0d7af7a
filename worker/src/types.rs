//! Shared types used by the work-processor subsystem.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::progress::ProgressReporter;

/// When a work type is allowed to run, relative to market hours.
///
/// The per-security policies split on the subject: a non-empty subject asks
/// about that security's venue, an empty subject asks about markets at large.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTiming {
    AnyTime,
    DuringMarketOpen,
    AfterMarketClose,
    AllMarketsClosed,
}

impl fmt::Display for MarketTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketTiming::AnyTime => "any_time",
            MarketTiming::DuringMarketOpen => "during_market_open",
            MarketTiming::AfterMarketClose => "after_market_close",
            MarketTiming::AllMarketsClosed => "all_markets_closed",
        };
        f.write_str(s)
    }
}

/// The behavior behind a work type.
///
/// Implementations live outside the core; the processor only ever sees this
/// seam and the narrow progress reporter it hands in.
#[async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    /// Subjects this type currently wants to run against.
    ///
    /// An empty vec suppresses the type for this scan. Global types return
    /// one empty-string subject (the default); per-entity types return one
    /// entry per pending entity and are expected to cap their own output.
    async fn find_subjects(&self) -> Vec<String> {
        vec![String::new()]
    }

    /// Runs one unit of work. Runs under a deadline; long operations must
    /// remain cancel-safe at their await points.
    async fn execute(&self, subject: &str, progress: &ProgressReporter) -> anyhow::Result<()>;
}

/// Static definition of a kind of background work.
#[derive(Clone)]
pub struct WorkType {
    /// Stable identifier, colon-segmented by convention (`sync:portfolio`).
    pub id: String,
    /// Work-type ids that must have completed for the same subject first.
    pub depends_on: Vec<String>,
    pub timing: MarketTiming,
    /// Minimum gap between successful runs. Zero means on-demand: the type
    /// is due whenever `find_subjects` yields it.
    pub interval: Duration,
    pub handler: Arc<dyn WorkHandler>,
}

impl WorkType {
    pub fn new(
        id: impl Into<String>,
        timing: MarketTiming,
        handler: Arc<dyn WorkHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            timing,
            interval: Duration::ZERO,
            handler,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkType")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("timing", &self.timing)
            .field("interval", &self.interval)
            .finish()
    }
}

/// The unique identity of `(type_id, subject)` used by the queue dedup set
/// and the cache: the bare type id for global work, `type:subject` otherwise.
pub fn queue_key(type_id: &str, subject: &str) -> String {
    if subject.is_empty() {
        type_id.to_string()
    } else {
        format!("{type_id}:{subject}")
    }
}

/// A concrete execution request for one subject of one work type.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub type_id: String,
    pub subject: String,
    pub retries: u32,
    pub created_at_ms: u64,
}

impl WorkItem {
    pub fn new(type_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            subject: subject.into(),
            retries: 0,
            created_at_ms: common::time::now_ms(),
        }
    }

    pub fn id(&self) -> String {
        queue_key(&self.type_id, &self.subject)
    }
}

/// Tuning knobs for the processor.
///
/// Per-type intervals are part of the catalog, not of this config.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Deadline for a single `execute` call.
    pub work_timeout: Duration,
    /// Upper bound on retries per item; the first attempt is not a retry.
    pub max_retries: u32,
    /// Failsafe wake cadence so interval work runs without external events.
    pub periodic_trigger_interval: Duration,
    /// Minimum gap between JobProgress emits per reporter.
    pub progress_throttle: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            work_timeout: Duration::from_secs(7 * 60),
            max_retries: 10,
            periodic_trigger_interval: Duration::from_secs(60),
            progress_throttle: Duration::from_millis(250),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_key_global_is_bare_type_id() {
        assert_eq!(queue_key("sync:portfolio", ""), "sync:portfolio");
    }

    #[test]
    fn queue_key_subject_is_appended() {
        assert_eq!(
            queue_key("security:sync", "NL0010273215"),
            "security:sync:NL0010273215"
        );
    }

    #[test]
    fn item_id_matches_queue_key() {
        let item = WorkItem::new("security:technical", "AAPL");
        assert_eq!(item.id(), "security:technical:AAPL");
        assert_eq!(item.retries, 0);
    }
}
