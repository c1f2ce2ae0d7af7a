//! Stand-in capability implementations.
//!
//! These keep the daemon bootable before the real adapters are wired in:
//! every operation logs, reports progress where it makes sense, and
//! succeeds without touching the outside world. The market checker reports
//! all venues closed so nothing trades by accident.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use worker::gate::MarketChecker;
use worker::progress::ProgressReporter;

use crate::caps::{
    BrokerGateway, DeploymentMonitor, DisplayDriver, DividendDesk, MaintenanceRunner,
    PlanOutcome, PlannerEngine, RegimeAnalyzer, SecurityAnalyzer, TradeDesk,
};

// TODO: replace these one by one as the broker, planner and display
// adapters are ported over from the previous daemon.

pub struct StubMarketChecker;

#[async_trait]
impl MarketChecker for StubMarketChecker {
    async fn is_any_market_open(&self) -> bool {
        false
    }

    async fn is_security_market_open(&self, _subject: &str) -> bool {
        false
    }

    async fn are_all_markets_closed(&self) -> bool {
        true
    }
}

pub struct StubBroker;

#[async_trait]
impl BrokerGateway for StubBroker {
    async fn sync_portfolio(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("portfolio sync (stub)");
        Ok(())
    }

    async fn sync_trades(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("trade sync (stub)");
        Ok(())
    }

    async fn sync_cashflows(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("cashflow sync (stub)");
        Ok(())
    }

    async fn sync_prices(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("price sync (stub)");
        Ok(())
    }

    async fn sync_negative_balances(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("negative balance sweep (stub)");
        Ok(())
    }

    async fn sync_exchange_rates(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("exchange rate sync (stub)");
        Ok(())
    }
}

pub struct StubDisplay;

#[async_trait]
impl DisplayDriver for StubDisplay {
    async fn refresh_display(&self) -> anyhow::Result<()> {
        info!("display refresh (stub)");
        Ok(())
    }
}

pub struct StubPlanner;

#[async_trait]
impl PlannerEngine for StubPlanner {
    async fn compute_weights(
        &self,
        _progress: &ProgressReporter,
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        Ok(BTreeMap::new())
    }

    async fn build_opportunity_context(
        &self,
        _weights: &BTreeMap<String, f64>,
        _progress: &ProgressReporter,
    ) -> anyhow::Result<Value> {
        Ok(json!({ "opportunities": [] }))
    }

    async fn build_plan(
        &self,
        _context: &Value,
        _progress: &ProgressReporter,
    ) -> anyhow::Result<PlanOutcome> {
        Ok(PlanOutcome {
            sequences: json!([]),
            best_sequence: json!(null),
        })
    }

    async fn publish_recommendations(
        &self,
        _best_sequence: &Value,
        _progress: &ProgressReporter,
    ) -> anyhow::Result<()> {
        info!("recommendations published (stub)");
        Ok(())
    }
}

pub struct StubDividends;

#[async_trait]
impl DividendDesk for StubDividends {
    async fn detect(&self, _progress: &ProgressReporter) -> anyhow::Result<Value> {
        Ok(json!([]))
    }

    async fn analyze(&self, _events: &Value, _: &ProgressReporter) -> anyhow::Result<Value> {
        Ok(json!([]))
    }

    async fn recommend(&self, _analysis: &Value, _: &ProgressReporter) -> anyhow::Result<Value> {
        Ok(json!([]))
    }

    async fn execute_reinvestment(
        &self,
        _recommendation: &Value,
        _: &ProgressReporter,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StubSecurities;

#[async_trait]
impl SecurityAnalyzer for StubSecurities {
    async fn pending_securities(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn sync_security(&self, isin: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        info!(isin, "security sync (stub)");
        Ok(())
    }

    async fn compute_technical(&self, isin: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        info!(isin, "technical analysis (stub)");
        Ok(())
    }

    async fn evaluate_formulas(&self, isin: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        info!(isin, "formula evaluation (stub)");
        Ok(())
    }

    async fn refresh_tags(&self, isin: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        info!(isin, "tag refresh (stub)");
        Ok(())
    }

    async fn refresh_metadata(&self, _: &ProgressReporter) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StubMaintenance;

#[async_trait]
impl MaintenanceRunner for StubMaintenance {
    async fn backup_database(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("database backup (stub)");
        Ok(())
    }

    async fn upload_backup(&self, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("remote backup upload (stub)");
        Ok(())
    }

    async fn rotate_remote_backups(&self, _: &ProgressReporter) -> anyhow::Result<()> {
        Ok(())
    }

    async fn vacuum_database(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cleanup_history(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cleanup_cache(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cleanup_client_data(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cleanup_recommendations(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StubTrading;

#[async_trait]
impl TradeDesk for StubTrading {
    async fn has_pending_orders(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn execute_pending_orders(&self, _: &ProgressReporter) -> anyhow::Result<()> {
        Ok(())
    }

    async fn retry_failed_orders(&self, _: &ProgressReporter) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StubRegime;

#[async_trait]
impl RegimeAnalyzer for StubRegime {
    async fn classify_market_regime(&self, _: &ProgressReporter) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StubDeployment;

#[async_trait]
impl DeploymentMonitor for StubDeployment {
    async fn check_for_update(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The full stub bundle, for tests and the unwired binary.
pub fn stub_capabilities() -> crate::catalog::Capabilities {
    use std::sync::Arc;

    crate::catalog::Capabilities {
        broker: Arc::new(StubBroker),
        display: Arc::new(StubDisplay),
        planner: Arc::new(StubPlanner),
        dividends: Arc::new(StubDividends),
        securities: Arc::new(StubSecurities),
        maintenance: Arc::new(StubMaintenance),
        trading: Arc::new(StubTrading),
        regime: Arc::new(StubRegime),
        deployment: Arc::new(StubDeployment),
    }
}
