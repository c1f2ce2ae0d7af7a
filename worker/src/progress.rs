//! Per-execution progress reporting.
//!
//! Each running work item gets a reporter bound to its identity. Updates are
//! throttled so chatty handlers cannot flood the bus; the terminal
//! `current == total` update always goes through so observers see 100%.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::events::{BusEvent, EventEmitter, JobProgress};

pub struct ProgressReporter {
    work_id: String,
    run_id: Uuid,
    type_id: String,
    subject: String,
    emitter: Option<Arc<dyn EventEmitter>>,
    throttle: Duration,
    last_emit: Mutex<Option<Instant>>,
}

impl ProgressReporter {
    pub fn new(
        work_id: impl Into<String>,
        run_id: Uuid,
        type_id: impl Into<String>,
        subject: impl Into<String>,
        emitter: Option<Arc<dyn EventEmitter>>,
        throttle: Duration,
    ) -> Self {
        Self {
            work_id: work_id.into(),
            run_id,
            type_id: type_id.into(),
            subject: subject.into(),
            emitter,
            throttle,
            last_emit: Mutex::new(None),
        }
    }

    /// A reporter that drops everything. Handlers can always call through
    /// it; nothing is emitted.
    pub fn disabled() -> Self {
        Self::new("", Uuid::nil(), "", "", None, Duration::ZERO)
    }

    pub fn message(&self, message: impl Into<String>) {
        self.report(None, None, None, message.into(), None);
    }

    pub fn phase(&self, phase: impl Into<String>, message: impl Into<String>) {
        self.report(Some(phase.into()), None, None, message.into(), None);
    }

    pub fn update(&self, current: u64, total: u64, message: impl Into<String>) {
        self.report(None, Some(current), Some(total), message.into(), None);
    }

    pub fn update_with_details(
        &self,
        current: u64,
        total: u64,
        message: impl Into<String>,
        details: serde_json::Value,
    ) {
        self.report(None, Some(current), Some(total), message.into(), Some(details));
    }

    fn report(
        &self,
        phase: Option<String>,
        current: Option<u64>,
        total: Option<u64>,
        message: String,
        details: Option<serde_json::Value>,
    ) {
        let Some(emitter) = &self.emitter else {
            return;
        };

        let is_final = matches!((current, total), (Some(c), Some(t)) if c == t);

        {
            let mut last = self.last_emit.lock();
            let now = Instant::now();

            if !is_final {
                if let Some(prev) = *last {
                    if now.duration_since(prev) < self.throttle {
                        return;
                    }
                }
            }

            *last = Some(now);
        }

        emitter.emit(BusEvent::JobProgress(JobProgress {
            work_id: self.work_id.clone(),
            run_id: self.run_id,
            type_id: self.type_id.clone(),
            subject: self.subject.clone(),
            phase,
            current,
            total,
            message,
            details,
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingEmitter {
        progress: AtomicUsize,
    }

    impl EventEmitter for CountingEmitter {
        fn emit(&self, event: BusEvent) {
            if matches!(event, BusEvent::JobProgress(_)) {
                self.progress.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn reporter(emitter: Arc<CountingEmitter>, throttle: Duration) -> ProgressReporter {
        ProgressReporter::new(
            "sync:prices",
            Uuid::new_v4(),
            "sync:prices",
            "",
            Some(emitter),
            throttle,
        )
    }

    #[test]
    fn burst_is_throttled_to_one_emit() {
        let emitter = Arc::new(CountingEmitter::default());
        let p = reporter(emitter.clone(), Duration::from_secs(60));

        for i in 0..50 {
            p.update(i, 100, "loading");
        }

        assert_eq!(emitter.progress.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn final_update_bypasses_throttle() {
        let emitter = Arc::new(CountingEmitter::default());
        let p = reporter(emitter.clone(), Duration::from_secs(60));

        p.update(1, 100, "loading");
        p.update(2, 100, "loading"); // throttled
        p.update(100, 100, "done"); // final, passes

        assert_eq!(emitter.progress.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_throttle_lets_everything_through() {
        let emitter = Arc::new(CountingEmitter::default());
        let p = reporter(emitter.clone(), Duration::ZERO);

        p.message("a");
        p.phase("scan", "b");
        p.update(1, 2, "c");

        assert_eq!(emitter.progress.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn disabled_reporter_never_panics() {
        let p = ProgressReporter::disabled();
        p.message("into the void");
        p.update(5, 10, "still nothing");
        p.update(10, 10, "done");
    }
}
