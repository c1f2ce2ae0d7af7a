//! Broker synchronization chain.
//!
//! `sync:portfolio` is the root: positions must be current before trades,
//! cashflows, prices and negative balances are reconciled against them.
//! The LED display refreshes only after prices did. Exchange rates are
//! independent of the portfolio and run on their own cadence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::{BrokerGateway, DisplayDriver};

const SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);
const PRICES_INTERVAL: Duration = Duration::from_secs(5 * 60);
const RATES_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct SyncPortfolio(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncPortfolio {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_portfolio(progress).await
    }
}

pub struct SyncTrades(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncTrades {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_trades(progress).await
    }
}

pub struct SyncCashflows(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncCashflows {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_cashflows(progress).await
    }
}

pub struct SyncPrices(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncPrices {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_prices(progress).await
    }
}

pub struct SyncNegativeBalances(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncNegativeBalances {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_negative_balances(progress).await
    }
}

pub struct SyncRates(pub Arc<dyn BrokerGateway>);

#[async_trait]
impl WorkHandler for SyncRates {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.sync_exchange_rates(progress).await
    }
}

pub struct SyncDisplay(pub Arc<dyn DisplayDriver>);

#[async_trait]
impl WorkHandler for SyncDisplay {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("refreshing ticker display");
        self.0.refresh_display().await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities) {
    let broker = &caps.broker;

    registry.register(
        WorkType::new(
            "sync:portfolio",
            MarketTiming::AnyTime,
            Arc::new(SyncPortfolio(broker.clone())),
        )
        .with_interval(SYNC_INTERVAL),
    );

    registry.register(
        WorkType::new(
            "sync:trades",
            MarketTiming::AnyTime,
            Arc::new(SyncTrades(broker.clone())),
        )
        .with_interval(SYNC_INTERVAL)
        .with_depends_on(["sync:portfolio"]),
    );

    registry.register(
        WorkType::new(
            "sync:cashflows",
            MarketTiming::AnyTime,
            Arc::new(SyncCashflows(broker.clone())),
        )
        .with_interval(SYNC_INTERVAL)
        .with_depends_on(["sync:portfolio"]),
    );

    registry.register(
        WorkType::new(
            "sync:prices",
            MarketTiming::AnyTime,
            Arc::new(SyncPrices(broker.clone())),
        )
        .with_interval(PRICES_INTERVAL)
        .with_depends_on(["sync:portfolio"]),
    );

    registry.register(
        WorkType::new(
            "sync:negative-balances",
            MarketTiming::AnyTime,
            Arc::new(SyncNegativeBalances(broker.clone())),
        )
        .with_interval(SYNC_INTERVAL)
        .with_depends_on(["sync:portfolio"]),
    );

    registry.register(
        WorkType::new(
            "sync:display",
            MarketTiming::AnyTime,
            Arc::new(SyncDisplay(caps.display.clone())),
        )
        .with_interval(PRICES_INTERVAL)
        .with_depends_on(["sync:prices"]),
    );

    registry.register(
        WorkType::new(
            "sync:rates",
            MarketTiming::AnyTime,
            Arc::new(SyncRates(broker.clone())),
        )
        .with_interval(RATES_INTERVAL),
    );
}
