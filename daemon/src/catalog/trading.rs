//! Order execution.
//!
//! `trading:execute` is purely demand-driven: it only enters the queue when
//! the desk reports pending orders, and only while the market can actually
//! fill them. The retry sweep runs hourly during open hours to pick up
//! orders that bounced earlier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::TradeDesk;

const RETRY_INTERVAL: Duration = Duration::from_secs(3600);

pub struct TradingExecute(pub Arc<dyn TradeDesk>);

#[async_trait]
impl WorkHandler for TradingExecute {
    async fn find_subjects(&self) -> Vec<String> {
        match self.0.has_pending_orders().await {
            Ok(true) => vec![String::new()],
            Ok(false) => Vec::new(),
            Err(e) => {
                warn!(error = ?e, "pending order lookup failed; skipping scan");
                Vec::new()
            }
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.execute_pending_orders(progress).await
    }
}

pub struct TradingRetry(pub Arc<dyn TradeDesk>);

#[async_trait]
impl WorkHandler for TradingRetry {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.retry_failed_orders(progress).await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities) {
    registry.register(WorkType::new(
        "trading:execute",
        MarketTiming::DuringMarketOpen,
        Arc::new(TradingExecute(caps.trading.clone())),
    ));

    registry.register(
        WorkType::new(
            "trading:retry",
            MarketTiming::DuringMarketOpen,
            Arc::new(TradingRetry(caps.trading.clone())),
        )
        .with_interval(RETRY_INTERVAL),
    );
}
