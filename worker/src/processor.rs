//! The work processor: a single-worker, event-driven execution loop.
//!
//! Responsibilities:
//! - Scan the registry and admit due work into a FIFO queue (market timing
//!   and staleness are checked at admission).
//! - Resolve dependencies at the moment of execution, injecting missing
//!   predecessors at the queue front.
//! - Execute exactly one item at a time under a per-item deadline.
//! - Record completion in the durable cache and feed failures into a bounded
//!   retry queue.
//!
//! Non-responsibilities:
//! - Knowing what any work type actually does (handlers are capabilities).
//! - Market-hours knowledge (external `MarketChecker`).
//! - Durability of the queues; only the cache outlives a restart, and the
//!   next scan re-derives pending work from `find_subjects`.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use common::logger::warn_if_slow;
use common::time::now_epoch;
use store::WorkCache;

use crate::counters::Counters;
use crate::error::ProcessorError;
use crate::events::{BusEvent, EventEmitter, JobCompleted, JobFailed, JobStarted};
use crate::gate::{MarketChecker, MarketGate};
use crate::progress::ProgressReporter;
use crate::registry::Registry;
use crate::types::{ProcessorConfig, WorkItem, WorkType, queue_key};

#[derive(Default)]
struct QueueState {
    work_queue: VecDeque<WorkItem>,
    /// Keys currently in `work_queue`; enforces at most one entry per key.
    queued: HashSet<String>,
    retry_queue: VecDeque<WorkItem>,
    /// Key of the item currently executing, if any.
    in_flight: Option<String>,
}

pub struct Processor {
    registry: Arc<Registry>,
    cache: Arc<WorkCache>,
    gate: MarketGate,
    emitter: Arc<dyn EventEmitter>,
    cfg: ProcessorConfig,
    counters: Counters,

    /// Queue bookkeeping. Held only for in-memory mutation, never across
    /// `execute` or cache I/O.
    state: Mutex<QueueState>,

    /// Serializes every `execute` call, including manual ones.
    exec_permit: tokio::sync::Mutex<()>,

    wake_tx: mpsc::Sender<()>,
    wake_rx: Mutex<Option<mpsc::Receiver<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Processor {
    pub fn new(
        registry: Arc<Registry>,
        cache: Arc<WorkCache>,
        checker: Arc<dyn MarketChecker>,
        emitter: Arc<dyn EventEmitter>,
        cfg: ProcessorConfig,
        counters: Counters,
    ) -> Arc<Self> {
        // Capacity 1: pending wake-ups coalesce.
        let (wake_tx, wake_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            registry,
            cache,
            gate: MarketGate::new(checker),
            emitter,
            cfg,
            counters,
            state: Mutex::new(QueueState::default()),
            exec_permit: tokio::sync::Mutex::new(()),
            wake_tx,
            wake_rx: Mutex::new(Some(wake_rx)),
            shutdown_tx,
        })
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Wakes the loop. Coalesced: at most one wake is ever pending.
    pub fn trigger(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Asks the loop to exit after the current iteration. A running item is
    /// allowed to finish in its own task.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// The main loop. Spawn once; a second call returns immediately.
    pub async fn run(self: Arc<Self>) {
        let Some(mut wake_rx) = self.wake_rx.lock().take() else {
            warn!("processor loop already running; ignoring second run()");
            return;
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Failsafe cadence: interval work runs even when no event arrives.
        let mut tick = tokio::time::interval(self.cfg.periodic_trigger_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            registered = self.registry.len(),
            timeout_secs = self.cfg.work_timeout.as_secs(),
            "work processor started"
        );

        loop {
            tokio::select! {
                _ = wake_rx.recv() => {}
                _ = tick.tick() => {}
                _ = shutdown_rx.changed() => break,
            }

            self.populate_queue().await;
            Arc::clone(&self).dispatch_next().await;
        }

        info!("work processor stopped");
    }

    /// Scans the registry in registration order and admits due work.
    ///
    /// Dependencies are not examined here; they are resolved at the point
    /// of execution so a predecessor completing between now and then is
    /// honored.
    #[instrument(skip(self), target = "processor")]
    async fn populate_queue(&self) {
        let now = now_epoch();

        for wt in self.registry.all() {
            let subjects = wt.handler.find_subjects().await;

            for subject in subjects {
                let key = queue_key(&wt.id, &subject);

                let occupied = {
                    let st = self.state.lock();
                    st.queued.contains(&key) || st.in_flight.as_deref() == Some(key.as_str())
                };
                if occupied {
                    self.counters.skip_queued.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                if !self.gate.permits(wt.timing, &subject).await {
                    self.counters.skip_timing.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                if !wt.interval.is_zero() {
                    match self.cache.is_fresh(&key, now).await {
                        Ok(true) => {
                            self.counters.skip_fresh.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            // Treat an unreadable cache as stale; running
                            // early is safer than never running.
                            warn!(work_id = %key, error = ?e, "cache read failed; admitting item");
                        }
                    }
                }

                let mut st = self.state.lock();
                if st.queued.insert(key.clone()) {
                    st.work_queue.push_back(WorkItem::new(wt.id.clone(), subject));
                    debug!(work_id = %key, depth = st.work_queue.len(), "work item admitted");
                }
            }
        }
    }

    /// Spawns the next runnable item, if the worker is idle.
    async fn dispatch_next(self: Arc<Self>) {
        if self.state.lock().in_flight.is_some() {
            return;
        }

        let Some((wt, item)) = self.next_item().await else {
            return;
        };

        // Reserve before spawning so the next wake cannot double-dispatch.
        self.state.lock().in_flight = Some(item.id());

        let proc = Arc::clone(&self);
        tokio::spawn(async move {
            proc.execute_item(wt, item, true).await;
        });
    }

    /// Pops queue heads until one item has its dependencies satisfied.
    ///
    /// Items whose predecessors were injected (or are not currently
    /// allowed to run) go back to the tail. A per-pass set marks keys that
    /// were already deferred once; re-encounters rotate to the tail, and
    /// once a whole rotation finds nothing runnable the scan gives up until
    /// the next wake. The retry queue is only consulted when the main queue
    /// is empty.
    async fn next_item(&self) -> Option<(WorkType, WorkItem)> {
        let mut deferred_this_pass: HashSet<String> = HashSet::new();
        let mut rotations = 0usize;

        loop {
            let (item, from_retry) = {
                let mut st = self.state.lock();
                if let Some(it) = st.work_queue.pop_front() {
                    let key = it.id();
                    st.queued.remove(&key);
                    (it, false)
                } else if let Some(it) = st.retry_queue.pop_front() {
                    (it, true)
                } else {
                    return None;
                }
            };

            let key = item.id();

            if deferred_this_pass.contains(&key) {
                rotations += 1;
                let mut st = self.state.lock();
                let remaining = st.work_queue.len() + st.retry_queue.len() + 1;
                if from_retry {
                    st.retry_queue.push_back(item);
                } else if st.queued.insert(key) {
                    st.work_queue.push_back(item);
                }
                if rotations > remaining {
                    // Full circle: everything left is waiting on something.
                    return None;
                }
                continue;
            }

            let Some(wt) = self.registry.get(&item.type_id) else {
                warn!(type_id = %item.type_id, "queued item references unregistered type; dropping");
                continue;
            };

            let mut visited = HashSet::from([key.clone()]);
            let deferred = self.resolve_dependencies(&wt, &item.subject, &mut visited).await;

            if deferred {
                debug!(work_id = %key, "dependencies pending; item re-queued at tail");
                deferred_this_pass.insert(key.clone());
                let mut st = self.state.lock();
                if from_retry {
                    st.retry_queue.push_back(item);
                } else if st.queued.insert(key) {
                    st.work_queue.push_back(item);
                }
                continue;
            }

            return Some((wt, item));
        }
    }

    /// Ensures every dependency of `wt` has completed for `subject`,
    /// injecting missing predecessors at the queue front.
    ///
    /// Returns true when the caller must wait for at least one predecessor.
    /// `visited` carries the queue keys along this resolution path; a
    /// revisit means the catalog declared a cycle, which is logged and
    /// skipped rather than followed.
    fn resolve_dependencies<'a>(
        &'a self,
        wt: &'a WorkType,
        subject: &'a str,
        visited: &'a mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            let mut needs_resolution = false;

            for dep_id in &wt.depends_on {
                let dep_key = queue_key(dep_id, subject);

                // Any completion record satisfies the edge, fresh or stale.
                match self.cache.expires_at(&dep_key).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(dependency = %dep_key, error = ?e, "cache read failed; treating dependency as unmet");
                    }
                }

                if !visited.insert(dep_key.clone()) {
                    self.counters.cycles_detected.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        dependent = %wt.id,
                        dependency = %dep_key,
                        "dependency cycle detected; skipping edge"
                    );
                    continue;
                }

                // Already waiting in the queue: pull it to the front so it
                // runs before its dependent comes around again.
                let moved = {
                    let mut st = self.state.lock();
                    if st.queued.contains(&dep_key) {
                        if let Some(pos) =
                            st.work_queue.iter().position(|it| it.id() == dep_key)
                        {
                            let it = st.work_queue.remove(pos);
                            if let Some(it) = it {
                                st.work_queue.push_front(it);
                            }
                        }
                        true
                    } else {
                        false
                    }
                };
                if moved {
                    needs_resolution = true;
                    continue;
                }

                let Some(dep_wt) = self.registry.get(dep_id) else {
                    warn!(dependent = %wt.id, dependency = %dep_id, "unknown dependency; skipping edge");
                    continue;
                };

                if !self.gate.permits(dep_wt.timing, subject).await {
                    // Cannot inject it now; the dependent stays queued and
                    // is revisited on a later wake.
                    debug!(dependency = %dep_key, "dependency blocked by market timing");
                    needs_resolution = true;
                    continue;
                }

                // Queue the dependency's own predecessors first, then the
                // dependency itself in front of them; the front-pull above
                // straightens the order as items are popped.
                self.resolve_dependencies(&dep_wt, subject, visited).await;

                {
                    let mut st = self.state.lock();
                    if st.queued.insert(dep_key.clone()) {
                        st.work_queue
                            .push_front(WorkItem::new(dep_id.clone(), subject));
                        debug!(dependency = %dep_key, "dependency injected at queue front");
                    }
                }
                needs_resolution = true;
            }

            needs_resolution
        })
    }

    /// Runs one item to completion and does the follow-up bookkeeping.
    ///
    /// `skip_if_fresh` is set on the loop path: an item that became fresh
    /// while it sat in the queue is silently dropped. Manual execution
    /// passes false to force the run.
    async fn execute_item(&self, wt: WorkType, item: WorkItem, skip_if_fresh: bool) {
        let key = item.id();

        if skip_if_fresh && !wt.interval.is_zero() {
            match self.cache.is_fresh(&key, now_epoch()).await {
                Ok(true) => {
                    debug!(work_id = %key, "item became fresh while queued; skipping");
                    self.finish(&key);
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!(work_id = %key, error = ?e, "cache read failed; executing anyway"),
            }
        }

        let _permit = self.exec_permit.lock().await;
        {
            // The loop reserves before spawning; a manual run only claims
            // the slot when nothing else holds it.
            let mut st = self.state.lock();
            if st.in_flight.is_none() {
                st.in_flight = Some(key.clone());
            }
        }

        let run_id = Uuid::new_v4();
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        self.emitter.emit(BusEvent::JobStarted(JobStarted {
            work_id: key.clone(),
            run_id,
            type_id: wt.id.clone(),
            subject: item.subject.clone(),
            at: chrono::Utc::now(),
        }));

        let progress = ProgressReporter::new(
            key.clone(),
            run_id,
            wt.id.clone(),
            item.subject.clone(),
            Some(Arc::clone(&self.emitter)),
            self.cfg.progress_throttle,
        );

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            self.cfg.work_timeout,
            wt.handler.execute(&item.subject, &progress),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => {
                warn!(
                    work_id = %key,
                    timeout_secs = self.cfg.work_timeout.as_secs(),
                    "work item exceeded its deadline; cancelled"
                );
                Err(anyhow::anyhow!(
                    "timed out after {}s",
                    self.cfg.work_timeout.as_secs()
                ))
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.emitter.emit(BusEvent::JobCompleted(JobCompleted {
                    work_id: key.clone(),
                    run_id,
                    type_id: wt.id.clone(),
                    subject: item.subject.clone(),
                    duration_ms,
                    at: chrono::Utc::now(),
                }));

                // Completion doubles as the staleness record: interval-free
                // types land already stale but present, which is what
                // dependency resolution looks for.
                let expires_at = now_epoch() + wt.interval.as_secs() as i64;
                let write = warn_if_slow("cache_completion_write", Duration::from_millis(100), async {
                    self.cache.set(&key, expires_at).await
                })
                .await;
                if let Err(e) = write {
                    warn!(work_id = %key, error = ?e, "failed to record completion in cache");
                }

                debug!(work_id = %key, duration_ms, "work item completed");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.emitter.emit(BusEvent::JobFailed(JobFailed {
                    work_id: key.clone(),
                    run_id,
                    type_id: wt.id.clone(),
                    subject: item.subject.clone(),
                    error: format!("{e:#}"),
                    duration_ms,
                    retries: item.retries,
                    at: chrono::Utc::now(),
                }));

                let mut item = item;
                if item.retries < self.cfg.max_retries {
                    item.retries += 1;
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    debug!(work_id = %key, retries = item.retries, "work item queued for retry");
                    self.state.lock().retry_queue.push_back(item);
                } else {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        work_id = %key,
                        retries = item.retries,
                        "retry budget exhausted; dropping work item"
                    );
                }
            }
        }

        self.finish(&key);
    }

    fn finish(&self, key: &str) {
        let mut st = self.state.lock();
        if st.in_flight.as_deref() == Some(key) {
            st.in_flight = None;
        }
        drop(st);

        // Wake the loop so the next item is picked immediately.
        self.trigger();
    }

    /// Operator-initiated execution.
    ///
    /// Bypasses market timing and staleness but still refuses to run ahead
    /// of unmet dependencies. Shares the execution permit with the loop, so
    /// at most one `execute` runs at any instant, whoever started it.
    pub async fn execute_now(&self, type_id: &str, subject: &str) -> Result<(), ProcessorError> {
        let wt = self
            .registry
            .get(type_id)
            .ok_or_else(|| ProcessorError::UnknownWorkType(type_id.to_string()))?;

        let work_id = queue_key(type_id, subject);

        let mut missing = Vec::new();
        for dep_id in &wt.depends_on {
            let dep_key = queue_key(dep_id, subject);
            match self.cache.expires_at(&dep_key).await {
                Ok(Some(_)) => {}
                Ok(None) => missing.push(dep_key),
                Err(e) => {
                    warn!(dependency = %dep_key, error = ?e, "cache read failed during manual execution");
                    missing.push(dep_key);
                }
            }
        }
        if !missing.is_empty() {
            return Err(ProcessorError::DependenciesNotMet { work_id, missing });
        }

        info!(work_id = %work_id, "manual execution requested");
        self.execute_item(wt, WorkItem::new(type_id, subject), false)
            .await;
        Ok(())
    }
}
