//! Market-wide analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::RegimeAnalyzer;

const REGIME_INTERVAL: Duration = Duration::from_secs(24 * 3600);

pub struct MarketRegime(pub Arc<dyn RegimeAnalyzer>);

#[async_trait]
impl WorkHandler for MarketRegime {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.classify_market_regime(progress).await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities) {
    registry.register(
        WorkType::new(
            "analysis:market-regime",
            MarketTiming::AllMarketsClosed,
            Arc::new(MarketRegime(caps.regime.clone())),
        )
        .with_interval(REGIME_INTERVAL),
    );
}
