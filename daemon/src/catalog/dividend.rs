//! Dividend processing chain.
//!
//! Detection through reinvestment, all on-demand. Artifacts live under the
//! `dividend:` prefix so a `DividendDetected` event can evict the whole
//! family in one stroke and restart the chain from a clean slate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use common::time::now_epoch;
use store::WorkCache;
use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::{Capabilities, artifact_due};
use crate::caps::DividendDesk;

pub const DIVIDEND_PREFIX: &str = "dividend:";

const EVENTS: &str = "dividend:events";
const ANALYSIS: &str = "dividend:analysis";
const RECOMMENDATION: &str = "dividend:recommendation";
const EXECUTED: &str = "dividend:executed";

/// Dividends move on a daily rhythm; a day of quiet per scan is enough.
const ARTIFACT_TTL: Duration = Duration::from_secs(24 * 3600);

fn expiry() -> i64 {
    now_epoch() + ARTIFACT_TTL.as_secs() as i64
}

pub struct DividendDetect {
    pub desk: Arc<dyn DividendDesk>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for DividendDetect {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[], EVENTS).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let events = self.desk.detect(progress).await?;
        self.cache.set_json(EVENTS, &events, expiry()).await
    }
}

pub struct DividendAnalyze {
    pub desk: Arc<dyn DividendDesk>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for DividendAnalyze {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[EVENTS], ANALYSIS).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let events: serde_json::Value = self
            .cache
            .get_json(EVENTS)
            .await?
            .context("dividend events artifact missing")?;

        let analysis = self.desk.analyze(&events, progress).await?;
        self.cache.set_json(ANALYSIS, &analysis, expiry()).await
    }
}

pub struct DividendRecommend {
    pub desk: Arc<dyn DividendDesk>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for DividendRecommend {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[ANALYSIS], RECOMMENDATION).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let analysis: serde_json::Value = self
            .cache
            .get_json(ANALYSIS)
            .await?
            .context("dividend analysis artifact missing")?;

        let recommendation = self.desk.recommend(&analysis, progress).await?;
        self.cache
            .set_json(RECOMMENDATION, &recommendation, expiry())
            .await
    }
}

pub struct DividendExecute {
    pub desk: Arc<dyn DividendDesk>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for DividendExecute {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[RECOMMENDATION], EXECUTED).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let recommendation: serde_json::Value = self
            .cache
            .get_json(RECOMMENDATION)
            .await?
            .context("dividend recommendation artifact missing")?;

        self.desk
            .execute_reinvestment(&recommendation, progress)
            .await?;

        self.cache.set(EXECUTED, expiry()).await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities, cache: &Arc<WorkCache>) {
    let desk = &caps.dividends;

    registry.register(WorkType::new(
        "dividend:detect",
        MarketTiming::AnyTime,
        Arc::new(DividendDetect {
            desk: desk.clone(),
            cache: cache.clone(),
        }),
    ));

    registry.register(
        WorkType::new(
            "dividend:analyze",
            MarketTiming::AnyTime,
            Arc::new(DividendAnalyze {
                desk: desk.clone(),
                cache: cache.clone(),
            }),
        )
        .with_depends_on(["dividend:detect"]),
    );

    registry.register(
        WorkType::new(
            "dividend:recommend",
            MarketTiming::AnyTime,
            Arc::new(DividendRecommend {
                desk: desk.clone(),
                cache: cache.clone(),
            }),
        )
        .with_depends_on(["dividend:analyze"]),
    );

    registry.register(
        WorkType::new(
            "dividend:execute",
            MarketTiming::AnyTime,
            Arc::new(DividendExecute {
                desk: desk.clone(),
                cache: cache.clone(),
            }),
        )
        .with_depends_on(["dividend:recommend"]),
    );
}
