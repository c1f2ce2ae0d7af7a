//! Portfolio planning chain.
//!
//! `planner:weights` recomputes target weights on a short interval; the
//! downstream steps are on-demand and flow their artifacts through the work
//! cache: weights feed the opportunity context, the context feeds the plan,
//! and the best sequence feeds the published recommendations.
//!
//! The weights step carries the invalidation logic: unchanged weights buy
//! the downstream artifacts more runway, changed weights evict them so the
//! rest of the chain recomputes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use common::time::now_epoch;
use store::WorkCache;
use worker::events::{BusEvent, EventEmitter};
use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::{Capabilities, artifact_due};
use crate::caps::PlannerEngine;

pub const OPTIMIZER_WEIGHTS: &str = "optimizer_weights";
pub const OPPORTUNITY_CONTEXT: &str = "opportunity-context";
pub const SEQUENCES: &str = "sequences";
pub const BEST_SEQUENCE: &str = "best-sequence";

/// Artifact families evicted when portfolio state changes.
pub const PLANNER_ARTIFACTS: [&str; 4] = [
    OPTIMIZER_WEIGHTS,
    OPPORTUNITY_CONTEXT,
    SEQUENCES,
    BEST_SEQUENCE,
];

const RECOMMENDATIONS_PUBLISHED: &str = "planner:recommendations-published";

/// Weights cadence and artifact lifetime share one clock.
pub const ARTIFACT_TTL: Duration = Duration::from_secs(5 * 60);

pub struct PlannerWeights {
    pub planner: Arc<dyn PlannerEngine>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for PlannerWeights {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("computing target weights");
        let weights = self.planner.compute_weights(progress).await?;

        let cached: Option<BTreeMap<String, f64>> =
            self.cache.get_json(OPTIMIZER_WEIGHTS).await?;

        if cached.as_ref() == Some(&weights) {
            // Same allocation: the downstream artifacts stay valid, they
            // just deserve a longer lease.
            for key in PLANNER_ARTIFACTS {
                self.cache.extend_expiration(key, ARTIFACT_TTL).await?;
            }
            info!(target: "planner", "weights unchanged; extended downstream artifacts");
        } else {
            self.cache
                .set_json(
                    OPTIMIZER_WEIGHTS,
                    &weights,
                    now_epoch() + ARTIFACT_TTL.as_secs() as i64,
                )
                .await?;
            for key in [OPPORTUNITY_CONTEXT, SEQUENCES, BEST_SEQUENCE] {
                self.cache.delete(key).await?;
            }
            info!(target: "planner", "weights changed; downstream artifacts invalidated");
        }

        Ok(())
    }
}

pub struct PlannerContext {
    pub planner: Arc<dyn PlannerEngine>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for PlannerContext {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[OPTIMIZER_WEIGHTS], OPPORTUNITY_CONTEXT).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let weights: BTreeMap<String, f64> = self
            .cache
            .get_json(OPTIMIZER_WEIGHTS)
            .await?
            .context("optimizer weights artifact missing")?;

        let context = self.planner.build_opportunity_context(&weights, progress).await?;

        self.cache
            .set_json(
                OPPORTUNITY_CONTEXT,
                &context,
                now_epoch() + ARTIFACT_TTL.as_secs() as i64,
            )
            .await
    }
}

pub struct PlannerPlan {
    pub planner: Arc<dyn PlannerEngine>,
    pub cache: Arc<WorkCache>,
}

#[async_trait]
impl WorkHandler for PlannerPlan {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[OPPORTUNITY_CONTEXT], BEST_SEQUENCE).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let context: serde_json::Value = self
            .cache
            .get_json(OPPORTUNITY_CONTEXT)
            .await?
            .context("opportunity context artifact missing")?;

        let outcome = self.planner.build_plan(&context, progress).await?;

        let expires = now_epoch() + ARTIFACT_TTL.as_secs() as i64;
        self.cache.set_json(SEQUENCES, &outcome.sequences, expires).await?;
        self.cache
            .set_json(BEST_SEQUENCE, &outcome.best_sequence, expires)
            .await
    }
}

pub struct PlannerRecommendations {
    pub planner: Arc<dyn PlannerEngine>,
    pub cache: Arc<WorkCache>,
    pub emitter: Arc<dyn EventEmitter>,
}

#[async_trait]
impl WorkHandler for PlannerRecommendations {
    async fn find_subjects(&self) -> Vec<String> {
        if artifact_due(&self.cache, &[BEST_SEQUENCE], RECOMMENDATIONS_PUBLISHED).await {
            vec![String::new()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        let best: serde_json::Value = self
            .cache
            .get_json(BEST_SEQUENCE)
            .await?
            .context("best sequence artifact missing")?;

        self.planner.publish_recommendations(&best, progress).await?;

        self.cache
            .set(
                RECOMMENDATIONS_PUBLISHED,
                now_epoch() + ARTIFACT_TTL.as_secs() as i64,
            )
            .await?;

        self.emitter.emit(BusEvent::RecommendationsReady);
        Ok(())
    }
}

pub fn register(
    registry: &Registry,
    caps: &Capabilities,
    cache: &Arc<WorkCache>,
    emitter: &Arc<dyn EventEmitter>,
) {
    let planner = &caps.planner;

    registry.register(
        WorkType::new(
            "planner:weights",
            MarketTiming::AnyTime,
            Arc::new(PlannerWeights {
                planner: planner.clone(),
                cache: cache.clone(),
            }),
        )
        .with_interval(ARTIFACT_TTL),
    );

    registry.register(
        WorkType::new(
            "planner:context",
            MarketTiming::AnyTime,
            Arc::new(PlannerContext {
                planner: planner.clone(),
                cache: cache.clone(),
            }),
        )
        .with_depends_on(["planner:weights"]),
    );

    registry.register(
        WorkType::new(
            "planner:plan",
            MarketTiming::AnyTime,
            Arc::new(PlannerPlan {
                planner: planner.clone(),
                cache: cache.clone(),
            }),
        )
        .with_depends_on(["planner:context"]),
    );

    registry.register(
        WorkType::new(
            "planner:recommendations",
            MarketTiming::AnyTime,
            Arc::new(PlannerRecommendations {
                planner: planner.clone(),
                cache: cache.clone(),
                emitter: emitter.clone(),
            }),
        )
        .with_depends_on(["planner:plan"]),
    );
}
