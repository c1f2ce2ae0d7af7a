//! Capability contracts consumed by the work-type catalog.
//!
//! These are the seams to the rest of the daemon: broker adapters, the
//! planner, the dividend desk, maintenance jobs and so on. The catalog only
//! ever holds `Arc<dyn ...>` handles; the concrete services are wired at
//! startup and never seen by the scheduling core.
//!
//! Implementations must normalize their failures into `anyhow` errors; the
//! processor treats any error as a retryable failure.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use worker::progress::ProgressReporter;

/// Broker-facing synchronization: positions, trades, cashflows, prices.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn sync_portfolio(&self, progress: &ProgressReporter) -> Result<()>;
    async fn sync_trades(&self, progress: &ProgressReporter) -> Result<()>;
    async fn sync_cashflows(&self, progress: &ProgressReporter) -> Result<()>;
    async fn sync_prices(&self, progress: &ProgressReporter) -> Result<()>;
    async fn sync_negative_balances(&self, progress: &ProgressReporter) -> Result<()>;
    async fn sync_exchange_rates(&self, progress: &ProgressReporter) -> Result<()>;
}

/// Pushes refreshed state to the LED ticker.
#[async_trait]
pub trait DisplayDriver: Send + Sync {
    async fn refresh_display(&self) -> Result<()>;
}

/// Output of one planning pass over the opportunity context.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub sequences: Value,
    pub best_sequence: Value,
}

/// Portfolio planning pipeline. Artifacts flow between the steps through
/// the work cache; the engine itself is stateless across calls.
#[async_trait]
pub trait PlannerEngine: Send + Sync {
    async fn compute_weights(
        &self,
        progress: &ProgressReporter,
    ) -> Result<BTreeMap<String, f64>>;

    async fn build_opportunity_context(
        &self,
        weights: &BTreeMap<String, f64>,
        progress: &ProgressReporter,
    ) -> Result<Value>;

    async fn build_plan(&self, context: &Value, progress: &ProgressReporter)
    -> Result<PlanOutcome>;

    async fn publish_recommendations(
        &self,
        best_sequence: &Value,
        progress: &ProgressReporter,
    ) -> Result<()>;
}

/// Dividend processing: detection through reinvestment.
#[async_trait]
pub trait DividendDesk: Send + Sync {
    /// Scans accounts for dividend events; an empty list means nothing to do.
    async fn detect(&self, progress: &ProgressReporter) -> Result<Value>;
    async fn analyze(&self, events: &Value, progress: &ProgressReporter) -> Result<Value>;
    async fn recommend(&self, analysis: &Value, progress: &ProgressReporter) -> Result<Value>;
    async fn execute_reinvestment(
        &self,
        recommendation: &Value,
        progress: &ProgressReporter,
    ) -> Result<()>;
}

/// Per-security analysis. `pending_securities` bounds its own output.
#[async_trait]
pub trait SecurityAnalyzer: Send + Sync {
    async fn pending_securities(&self) -> Result<Vec<String>>;
    async fn sync_security(&self, isin: &str, progress: &ProgressReporter) -> Result<()>;
    async fn compute_technical(&self, isin: &str, progress: &ProgressReporter) -> Result<()>;
    async fn evaluate_formulas(&self, isin: &str, progress: &ProgressReporter) -> Result<()>;
    async fn refresh_tags(&self, isin: &str, progress: &ProgressReporter) -> Result<()>;
    async fn refresh_metadata(&self, progress: &ProgressReporter) -> Result<()>;
}

/// Housekeeping: backups, vacuum, health, data retention.
#[async_trait]
pub trait MaintenanceRunner: Send + Sync {
    async fn backup_database(&self, progress: &ProgressReporter) -> Result<()>;
    async fn upload_backup(&self, progress: &ProgressReporter) -> Result<()>;
    async fn rotate_remote_backups(&self, progress: &ProgressReporter) -> Result<()>;
    async fn vacuum_database(&self) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
    async fn cleanup_history(&self) -> Result<()>;
    async fn cleanup_cache(&self) -> Result<()>;
    async fn cleanup_client_data(&self) -> Result<()>;
    async fn cleanup_recommendations(&self) -> Result<()>;
}

/// Order execution against the broker.
#[async_trait]
pub trait TradeDesk: Send + Sync {
    async fn has_pending_orders(&self) -> Result<bool>;
    async fn execute_pending_orders(&self, progress: &ProgressReporter) -> Result<()>;
    async fn retry_failed_orders(&self, progress: &ProgressReporter) -> Result<()>;
}

#[async_trait]
pub trait RegimeAnalyzer: Send + Sync {
    async fn classify_market_regime(&self, progress: &ProgressReporter) -> Result<()>;
}

#[async_trait]
pub trait DeploymentMonitor: Send + Sync {
    async fn check_for_update(&self) -> Result<()>;
}
