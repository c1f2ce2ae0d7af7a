use std::sync::Arc;

use daemon::catalog::register_catalog;
use daemon::config::AppConfig;
use daemon::http::{ApiState, router};
use daemon::stubs::{StubMarketChecker, stub_capabilities};
use daemon::triggers::spawn_bus_triggers;

use common::logger::init_tracing;
use store::WorkCache;
use store::db::Db;
use store::repository_sqlx::SqlxCacheRepository;
use worker::counters::Counters;
use worker::events::{EventBus, EventEmitter};
use worker::processor::Processor;
use worker::registry::Registry;

/// Connects the database, runs migrations and wraps the cache over it.
async fn init_cache(cfg: &AppConfig) -> anyhow::Result<Arc<WorkCache>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let repo = Arc::new(SqlxCacheRepository::new((*db.pool).clone()));
    Ok(Arc::new(WorkCache::new(repo)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting work daemon...");

    let cfg = AppConfig::from_env();

    let cache = init_cache(&cfg).await?;
    let bus = Arc::new(EventBus::default());
    let registry = Arc::new(Registry::new());

    let processor = Processor::new(
        registry.clone(),
        cache.clone(),
        Arc::new(StubMarketChecker),
        bus.clone() as Arc<dyn EventEmitter>,
        cfg.processor(),
        Counters::default(),
    );

    let caps = stub_capabilities();
    register_catalog(
        &registry,
        &caps,
        &cache,
        &(bus.clone() as Arc<dyn EventEmitter>),
        &cfg,
    );

    tokio::spawn(processor.clone().run());
    spawn_bus_triggers(&bus, cache.clone(), processor.clone());

    let app = router(ApiState {
        registry: registry.clone(),
        processor: processor.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&cfg.http_listen_addr).await?;
    tracing::info!(addr = %cfg.http_listen_addr, "admin api listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "admin api server exited");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    processor.stop();

    Ok(())
}
