//! Admin API tests, driven through the router without a listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use daemon::catalog::register_catalog;
use daemon::config::AppConfig;
use daemon::http::{ApiState, router};
use daemon::stubs::{StubMarketChecker, stub_capabilities};
use store::WorkCache;
use store::memory::MemoryCacheRepository;
use worker::counters::Counters;
use worker::events::{EventBus, EventEmitter};
use worker::processor::Processor;
use worker::registry::Registry;
use worker::types::ProcessorConfig;

fn mk_state() -> ApiState {
    let registry = Arc::new(Registry::new());
    let cache = Arc::new(WorkCache::new(Arc::new(MemoryCacheRepository::new())));
    let bus = Arc::new(EventBus::default());

    let processor = Processor::new(
        registry.clone(),
        cache.clone(),
        Arc::new(StubMarketChecker),
        bus.clone() as Arc<dyn EventEmitter>,
        ProcessorConfig::default(),
        Counters::default(),
    );

    register_catalog(
        &registry,
        &stub_capabilities(),
        &cache,
        &(bus as Arc<dyn EventEmitter>),
        &AppConfig::from_env(),
    );

    ApiState { registry, processor }
}

async fn send(state: &ApiState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

#[tokio::test]
async fn list_types_returns_catalog_in_registration_order() {
    let state = mk_state();

    let (status, body) = send(&state, "GET", "/api/work/types").await;
    assert_eq!(status, StatusCode::OK);

    let types = body.as_array().expect("array body");
    assert_eq!(types.len(), state.registry.len());
    assert_eq!(types[0]["id"], "sync:portfolio");
    assert_eq!(types[0]["market_timing"], "any_time");

    let context = types
        .iter()
        .find(|t| t["id"] == "planner:context")
        .expect("planner:context listed");
    assert_eq!(context["depends_on"], serde_json::json!(["planner:weights"]));
}

#[tokio::test]
async fn trigger_endpoint_acknowledges() {
    let state = mk_state();

    let (status, body) = send(&state, "POST", "/api/work/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "triggered");
}

#[tokio::test]
async fn execute_endpoint_runs_a_root_type() {
    let state = mk_state();

    let (status, body) = send(&state, "POST", "/api/work/sync:portfolio/execute").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "executed");
    assert_eq!(body["work_type"], "sync:portfolio");
    assert!(body.get("subject").is_none());
}

#[tokio::test]
async fn execute_endpoint_echoes_the_subject() {
    let state = mk_state();

    // security:sync has no dependencies, so any subject runs directly.
    let (status, body) =
        send(&state, "POST", "/api/work/security:sync/NL0010273215/execute").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["work_type"], "security:sync");
    assert_eq!(body["subject"], "NL0010273215");
}

#[tokio::test]
async fn unknown_type_is_a_bad_request() {
    let state = mk_state();

    let (status, body) = send(&state, "POST", "/api/work/sync:nonsense/execute").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"].as_str().unwrap().contains("unknown work type"),
        "body: {body}"
    );
}

#[tokio::test]
async fn unmet_dependencies_are_a_bad_request() {
    let state = mk_state();

    let (status, body) = send(&state, "POST", "/api/work/planner:context/execute").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"].as_str().unwrap().contains("dependencies not met"),
        "body: {body}"
    );
}

#[tokio::test]
async fn manual_chain_walks_through_dependencies() {
    let state = mk_state();

    // Clearing the root first: run it, then its dependent becomes eligible.
    let (status, _) = send(&state, "POST", "/api/work/maintenance:backup/execute").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&state, "POST", "/api/work/maintenance:vacuum/execute").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
}
