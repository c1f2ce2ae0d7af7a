//! The work-type catalog.
//!
//! Binds the capability bundle to concrete `WorkType` definitions and
//! registers them in the order the chains should be scanned. Everything
//! here is composition: ids, dependency edges, market timings, intervals,
//! and the artifact plumbing between chained steps. The actual domain work
//! lives behind the capability traits.

use std::sync::Arc;

use tracing::{info, warn};

use common::time::now_epoch;
use store::WorkCache;
use worker::events::EventEmitter;
use worker::registry::Registry;

use crate::caps::{
    BrokerGateway, DeploymentMonitor, DisplayDriver, DividendDesk, MaintenanceRunner,
    PlannerEngine, RegimeAnalyzer, SecurityAnalyzer, TradeDesk,
};
use crate::config::AppConfig;

pub mod analysis;
pub mod deployment;
pub mod dividend;
pub mod maintenance;
pub mod planner;
pub mod security;
pub mod sync;
pub mod trading;

/// Every external collaborator the catalog needs, wired once at startup.
#[derive(Clone)]
pub struct Capabilities {
    pub broker: Arc<dyn BrokerGateway>,
    pub display: Arc<dyn DisplayDriver>,
    pub planner: Arc<dyn PlannerEngine>,
    pub dividends: Arc<dyn DividendDesk>,
    pub securities: Arc<dyn SecurityAnalyzer>,
    pub maintenance: Arc<dyn MaintenanceRunner>,
    pub trading: Arc<dyn TradeDesk>,
    pub regime: Arc<dyn RegimeAnalyzer>,
    pub deployment: Arc<dyn DeploymentMonitor>,
}

/// Registers the full catalog. Registration order is scan order.
pub fn register_catalog(
    registry: &Registry,
    caps: &Capabilities,
    cache: &Arc<WorkCache>,
    emitter: &Arc<dyn EventEmitter>,
    cfg: &AppConfig,
) {
    sync::register(registry, caps);
    planner::register(registry, caps, cache, emitter);
    dividend::register(registry, caps, cache);
    security::register(registry, caps);
    maintenance::register(registry, caps);
    trading::register(registry, caps);
    analysis::register(registry, caps);
    deployment::register(registry, caps, cfg);

    info!(count = registry.len(), "work catalog registered");
}

/// Admission rule for artifact-driven on-demand steps: due when every input
/// artifact is fresh and the output artifact is not.
///
/// An unreadable output counts as due (recomputing beats stalling); an
/// unreadable input counts as not-due (garbage in would just burn retries).
pub(crate) async fn artifact_due(cache: &WorkCache, inputs: &[&str], output: &str) -> bool {
    let now = now_epoch();

    for &key in inputs {
        match cache.is_fresh(key, now).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(key, error = ?e, "input artifact unreadable; holding step back");
                return false;
            }
        }
    }

    match cache.is_fresh(output, now).await {
        Ok(fresh) => !fresh,
        Err(e) => {
            warn!(key = output, error = ?e, "output artifact unreadable; treating as due");
            true
        }
    }
}
