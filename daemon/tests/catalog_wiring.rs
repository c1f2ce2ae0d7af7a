//! Composition tests for the catalog: registration order, chain edges,
//! timings and intervals, the planner-weights invalidation rules, and the
//! event-bus trigger evictions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::sleep;

use common::time::now_epoch;
use daemon::caps::{PlanOutcome, PlannerEngine};
use daemon::catalog::planner::{
    ARTIFACT_TTL, BEST_SEQUENCE, OPPORTUNITY_CONTEXT, OPTIMIZER_WEIGHTS, PlannerWeights,
    SEQUENCES,
};
use daemon::catalog::{Capabilities, register_catalog};
use daemon::config::AppConfig;
use daemon::stubs::{StubMarketChecker, stub_capabilities};
use daemon::triggers::spawn_bus_triggers;
use store::WorkCache;
use store::memory::MemoryCacheRepository;
use worker::counters::Counters;
use worker::events::{BusEvent, EventBus, EventEmitter};
use worker::processor::Processor;
use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler};

fn mk_cache() -> Arc<WorkCache> {
    Arc::new(WorkCache::new(Arc::new(MemoryCacheRepository::new())))
}

fn registered(caps: &Capabilities) -> (Arc<Registry>, Arc<WorkCache>) {
    let registry = Arc::new(Registry::new());
    let cache = mk_cache();
    let bus = Arc::new(EventBus::default()) as Arc<dyn EventEmitter>;
    register_catalog(&registry, caps, &cache, &bus, &AppConfig::from_env());
    (registry, cache)
}

#[tokio::test]
async fn catalog_registers_every_chain_in_order() {
    let (registry, _) = registered(&stub_capabilities());

    let ids: Vec<String> = registry.all().into_iter().map(|wt| wt.id).collect();

    assert_eq!(
        ids,
        [
            "sync:portfolio",
            "sync:trades",
            "sync:cashflows",
            "sync:prices",
            "sync:negative-balances",
            "sync:display",
            "sync:rates",
            "planner:weights",
            "planner:context",
            "planner:plan",
            "planner:recommendations",
            "dividend:detect",
            "dividend:analyze",
            "dividend:recommend",
            "dividend:execute",
            "security:sync",
            "security:technical",
            "security:formula",
            "security:tags",
            "security:metadata",
            "maintenance:backup",
            "maintenance:r2-backup",
            "maintenance:r2-rotation",
            "maintenance:vacuum",
            "maintenance:health",
            "maintenance:cleanup:history",
            "maintenance:cleanup:cache",
            "maintenance:cleanup:client-data",
            "maintenance:cleanup:recommendations",
            "trading:execute",
            "trading:retry",
            "analysis:market-regime",
            "deployment:check",
        ]
    );
}

#[tokio::test]
async fn chain_edges_match_the_design() {
    let (registry, _) = registered(&stub_capabilities());

    let deps = |id: &str| registry.get(id).unwrap().depends_on;

    for dependent in ["sync:trades", "sync:cashflows", "sync:prices", "sync:negative-balances"] {
        assert_eq!(deps(dependent), ["sync:portfolio"], "{dependent}");
    }
    assert_eq!(deps("sync:display"), ["sync:prices"]);
    assert!(deps("sync:rates").is_empty());

    assert!(deps("planner:weights").is_empty());
    assert_eq!(deps("planner:context"), ["planner:weights"]);
    assert_eq!(deps("planner:plan"), ["planner:context"]);
    assert_eq!(deps("planner:recommendations"), ["planner:plan"]);

    assert_eq!(deps("dividend:analyze"), ["dividend:detect"]);
    assert_eq!(deps("dividend:recommend"), ["dividend:analyze"]);
    assert_eq!(deps("dividend:execute"), ["dividend:recommend"]);

    assert_eq!(deps("security:technical"), ["security:sync"]);
    assert_eq!(deps("security:formula"), ["security:technical"]);
    assert_eq!(deps("security:tags"), ["security:sync"]);
    assert!(deps("security:metadata").is_empty());

    assert_eq!(deps("maintenance:r2-backup"), ["maintenance:backup"]);
    assert_eq!(deps("maintenance:r2-rotation"), ["maintenance:r2-backup"]);
    assert_eq!(deps("maintenance:vacuum"), ["maintenance:backup"]);
}

#[tokio::test]
async fn timings_and_intervals_match_the_design() {
    let (registry, _) = registered(&stub_capabilities());

    let wt = |id: &str| registry.get(id).unwrap();

    assert_eq!(wt("sync:rates").timing, MarketTiming::AnyTime);
    assert_eq!(wt("sync:rates").interval, Duration::from_secs(3600));

    assert_eq!(wt("planner:weights").interval, Duration::from_secs(300));
    assert_eq!(wt("planner:context").interval, Duration::ZERO);
    assert_eq!(wt("planner:recommendations").interval, Duration::ZERO);

    for id in ["dividend:detect", "dividend:analyze", "dividend:recommend", "dividend:execute"] {
        assert_eq!(wt(id).timing, MarketTiming::AnyTime, "{id}");
        assert_eq!(wt(id).interval, Duration::ZERO, "{id}");
    }

    for id in ["security:sync", "security:technical", "security:formula", "security:tags"] {
        assert_eq!(wt(id).timing, MarketTiming::AfterMarketClose, "{id}");
    }

    for id in [
        "maintenance:backup",
        "maintenance:r2-backup",
        "maintenance:r2-rotation",
        "maintenance:vacuum",
        "maintenance:health",
        "maintenance:cleanup:history",
        "maintenance:cleanup:cache",
        "maintenance:cleanup:client-data",
    ] {
        assert_eq!(wt(id).timing, MarketTiming::AllMarketsClosed, "{id}");
        assert_eq!(wt(id).interval, Duration::from_secs(24 * 3600), "{id}");
    }
    assert_eq!(
        wt("maintenance:cleanup:recommendations").timing,
        MarketTiming::AnyTime
    );
    assert_eq!(
        wt("maintenance:cleanup:recommendations").interval,
        Duration::from_secs(3600)
    );

    assert_eq!(wt("trading:execute").timing, MarketTiming::DuringMarketOpen);
    assert_eq!(wt("trading:execute").interval, Duration::ZERO);
    assert_eq!(wt("trading:retry").interval, Duration::from_secs(3600));

    assert_eq!(wt("analysis:market-regime").timing, MarketTiming::AllMarketsClosed);
    assert_eq!(
        wt("analysis:market-regime").interval,
        Duration::from_secs(24 * 3600)
    );
}

// -----------------------
// Planner weights specialization
// -----------------------

struct FixedPlanner {
    weights: BTreeMap<String, f64>,
}

#[async_trait]
impl PlannerEngine for FixedPlanner {
    async fn compute_weights(
        &self,
        _: &ProgressReporter,
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        Ok(self.weights.clone())
    }

    async fn build_opportunity_context(
        &self,
        _: &BTreeMap<String, f64>,
        _: &ProgressReporter,
    ) -> anyhow::Result<Value> {
        unreachable!("weights tests never build a context")
    }

    async fn build_plan(&self, _: &Value, _: &ProgressReporter) -> anyhow::Result<PlanOutcome> {
        unreachable!("weights tests never build a plan")
    }

    async fn publish_recommendations(
        &self,
        _: &Value,
        _: &ProgressReporter,
    ) -> anyhow::Result<()> {
        unreachable!("weights tests never publish")
    }
}

async fn seed_planner_artifacts(cache: &WorkCache, now: i64) {
    let weights = BTreeMap::from([("AAPL".to_string(), 0.5f64)]);
    cache
        .set_json(OPTIMIZER_WEIGHTS, &weights, now + 100)
        .await
        .unwrap();
    cache
        .set_json(OPPORTUNITY_CONTEXT, &json!({"ctx": 1}), now + 200)
        .await
        .unwrap();
    cache.set_json(SEQUENCES, &json!([1, 2]), now + 300).await.unwrap();
    cache
        .set_json(BEST_SEQUENCE, &json!([1]), now + 400)
        .await
        .unwrap();
}

#[tokio::test]
async fn unchanged_weights_extend_all_planner_artifacts() {
    let cache = mk_cache();
    let now = now_epoch();
    seed_planner_artifacts(&cache, now).await;

    let handler = PlannerWeights {
        planner: Arc::new(FixedPlanner {
            weights: BTreeMap::from([("AAPL".to_string(), 0.5f64)]),
        }),
        cache: cache.clone(),
    };

    handler.execute("", &ProgressReporter::disabled()).await.unwrap();

    let delta = ARTIFACT_TTL.as_secs() as i64;
    assert_eq!(
        cache.expires_at(OPTIMIZER_WEIGHTS).await.unwrap(),
        Some(now + 100 + delta)
    );
    assert_eq!(
        cache.expires_at(OPPORTUNITY_CONTEXT).await.unwrap(),
        Some(now + 200 + delta)
    );
    assert_eq!(cache.expires_at(SEQUENCES).await.unwrap(), Some(now + 300 + delta));
    assert_eq!(
        cache.expires_at(BEST_SEQUENCE).await.unwrap(),
        Some(now + 400 + delta)
    );
}

#[tokio::test]
async fn changed_weights_rewrite_and_evict_downstream() {
    let cache = mk_cache();
    let now = now_epoch();
    seed_planner_artifacts(&cache, now).await;

    let handler = PlannerWeights {
        planner: Arc::new(FixedPlanner {
            weights: BTreeMap::from([("AAPL".to_string(), 0.6f64)]),
        }),
        cache: cache.clone(),
    };

    handler.execute("", &ProgressReporter::disabled()).await.unwrap();

    let weights: BTreeMap<String, f64> =
        cache.get_json(OPTIMIZER_WEIGHTS).await.unwrap().unwrap();
    assert_eq!(weights, BTreeMap::from([("AAPL".to_string(), 0.6f64)]));

    let expires = cache.expires_at(OPTIMIZER_WEIGHTS).await.unwrap().unwrap();
    let delta = ARTIFACT_TTL.as_secs() as i64;
    assert!(
        (expires - now_epoch() - delta).abs() <= 2,
        "fresh weights must expire one ttl from now"
    );

    for key in [OPPORTUNITY_CONTEXT, SEQUENCES, BEST_SEQUENCE] {
        assert_eq!(cache.expires_at(key).await.unwrap(), None, "{key} must be evicted");
    }
}

// -----------------------
// Bus triggers
// -----------------------

fn mk_processor(cache: Arc<WorkCache>, bus: Arc<EventBus>) -> Arc<Processor> {
    Processor::new(
        Arc::new(Registry::new()),
        cache,
        Arc::new(StubMarketChecker),
        bus as Arc<dyn EventEmitter>,
        worker::types::ProcessorConfig::default(),
        Counters::default(),
    )
}

#[tokio::test]
async fn state_changed_evicts_planner_artifacts() {
    let cache = mk_cache();
    let now = now_epoch();
    seed_planner_artifacts(&cache, now).await;
    cache.set("sync:portfolio", now + 600).await.unwrap();

    let bus = Arc::new(EventBus::default());
    let processor = mk_processor(cache.clone(), bus.clone());
    spawn_bus_triggers(&bus, cache.clone(), processor);

    // Give the handler task a beat to subscribe.
    sleep(Duration::from_millis(20)).await;
    bus.emit(BusEvent::StateChanged);
    sleep(Duration::from_millis(50)).await;

    for key in [OPTIMIZER_WEIGHTS, OPPORTUNITY_CONTEXT, SEQUENCES, BEST_SEQUENCE] {
        assert_eq!(cache.expires_at(key).await.unwrap(), None, "{key}");
    }
    // Completion markers for unrelated types are untouched.
    assert!(cache.expires_at("sync:portfolio").await.unwrap().is_some());
}

#[tokio::test]
async fn dividend_detected_evicts_the_dividend_family() {
    let cache = mk_cache();
    let now = now_epoch();
    cache.set("dividend:detect", now + 600).await.unwrap();
    cache
        .set_json("dividend:analysis", &json!([]), now + 600)
        .await
        .unwrap();
    seed_planner_artifacts(&cache, now).await;

    let bus = Arc::new(EventBus::default());
    let processor = mk_processor(cache.clone(), bus.clone());
    spawn_bus_triggers(&bus, cache.clone(), processor);

    sleep(Duration::from_millis(20)).await;
    bus.emit(BusEvent::DividendDetected {
        isin: "NL0010273215".into(),
    });
    sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.expires_at("dividend:detect").await.unwrap(), None);
    assert_eq!(cache.expires_at("dividend:analysis").await.unwrap(), None);
    // Planner artifacts survive a dividend event.
    assert!(cache.expires_at(OPTIMIZER_WEIGHTS).await.unwrap().is_some());
}
