//! Event-bus trigger wiring.
//!
//! Inbound topics wake the processor; some of them first evict the cache
//! families whose inputs just changed, so the next scan recomputes them.
//! Outbound lifecycle events pass through untouched.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use store::WorkCache;
use worker::events::{BusEvent, EventBus};
use worker::processor::Processor;

use crate::catalog::dividend::DIVIDEND_PREFIX;
use crate::catalog::planner::PLANNER_ARTIFACTS;

pub fn spawn_bus_triggers(
    bus: &EventBus,
    cache: Arc<WorkCache>,
    processor: Arc<Processor>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        info!("event-bus trigger handler started");

        loop {
            match rx.recv().await {
                Ok(event) => handle(event, &cache, &processor).await,
                Err(RecvError::Lagged(missed)) => {
                    // Wake anyway: a trigger we missed is still a trigger.
                    warn!(missed, "trigger handler lagged behind the bus");
                    processor.trigger();
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("event-bus trigger handler stopped");
    })
}

async fn handle(event: BusEvent, cache: &WorkCache, processor: &Processor) {
    match event {
        BusEvent::StateChanged => {
            debug!("portfolio state changed; evicting planner artifacts");
            for key in PLANNER_ARTIFACTS {
                if let Err(e) = cache.delete(key).await {
                    warn!(key, error = ?e, "artifact eviction failed");
                }
            }
            processor.trigger();
        }

        BusEvent::DividendDetected { ref isin } => {
            debug!(isin = %isin, "dividend detected; evicting dividend artifacts");
            if let Err(e) = cache.delete_by_prefix(DIVIDEND_PREFIX).await {
                warn!(error = ?e, "dividend family eviction failed");
            }
            processor.trigger();
        }

        BusEvent::RecommendationsReady | BusEvent::MarketsStatusChanged => {
            processor.trigger();
        }

        // Outbound lifecycle traffic; nothing for the trigger layer to do.
        BusEvent::JobStarted(_)
        | BusEvent::JobProgress(_)
        | BusEvent::JobCompleted(_)
        | BusEvent::JobFailed(_) => {}
    }
}
