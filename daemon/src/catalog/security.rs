//! Per-security analysis chain.
//!
//! Subjects are ISINs reported by the analyzer capability; each security
//! moves through sync, then technicals and formulas, with tagging riding on
//! the synced data as well. Dependencies are subject-scoped: AAPL's
//! technicals wait for AAPL's sync, not for anyone else's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::SecurityAnalyzer;

const SECURITY_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Which per-ISIN operation a handler performs.
#[derive(Clone, Copy)]
pub enum SecurityStep {
    Sync,
    Technical,
    Formula,
    Tags,
}

pub struct SecurityHandler {
    pub securities: Arc<dyn SecurityAnalyzer>,
    pub step: SecurityStep,
}

#[async_trait]
impl WorkHandler for SecurityHandler {
    async fn find_subjects(&self) -> Vec<String> {
        match self.securities.pending_securities().await {
            Ok(isins) => isins,
            Err(e) => {
                warn!(error = ?e, "pending securities lookup failed; skipping scan");
                Vec::new()
            }
        }
    }

    async fn execute(&self, subject: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        match self.step {
            SecurityStep::Sync => self.securities.sync_security(subject, progress).await,
            SecurityStep::Technical => self.securities.compute_technical(subject, progress).await,
            SecurityStep::Formula => self.securities.evaluate_formulas(subject, progress).await,
            SecurityStep::Tags => self.securities.refresh_tags(subject, progress).await,
        }
    }
}

pub struct SecurityMetadata(pub Arc<dyn SecurityAnalyzer>);

#[async_trait]
impl WorkHandler for SecurityMetadata {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.refresh_metadata(progress).await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities) {
    let securities = &caps.securities;

    let handler = |step| {
        Arc::new(SecurityHandler {
            securities: securities.clone(),
            step,
        })
    };

    registry.register(
        WorkType::new(
            "security:sync",
            MarketTiming::AfterMarketClose,
            handler(SecurityStep::Sync),
        )
        .with_interval(SECURITY_INTERVAL),
    );

    registry.register(
        WorkType::new(
            "security:technical",
            MarketTiming::AfterMarketClose,
            handler(SecurityStep::Technical),
        )
        .with_interval(SECURITY_INTERVAL)
        .with_depends_on(["security:sync"]),
    );

    registry.register(
        WorkType::new(
            "security:formula",
            MarketTiming::AfterMarketClose,
            handler(SecurityStep::Formula),
        )
        .with_interval(SECURITY_INTERVAL)
        .with_depends_on(["security:technical"]),
    );

    registry.register(
        WorkType::new(
            "security:tags",
            MarketTiming::AfterMarketClose,
            handler(SecurityStep::Tags),
        )
        .with_interval(SECURITY_INTERVAL)
        .with_depends_on(["security:sync"]),
    );

    registry.register(
        WorkType::new(
            "security:metadata",
            MarketTiming::AnyTime,
            Arc::new(SecurityMetadata(securities.clone())),
        )
        .with_interval(SECURITY_INTERVAL),
    );
}
