//! Thin admin API over the processor.
//!
//! Four endpoints: list the catalog, force a type (optionally per subject),
//! and poke the scheduling loop. No auth; this binds to loopback on a
//! personal box.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use worker::ProcessorError;
use worker::processor::Processor;
use worker::registry::Registry;
use worker::types::MarketTiming;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    pub processor: Arc<Processor>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/work/types", get(list_types))
        .route("/api/work/trigger", post(trigger))
        .route("/api/work/:work_type/execute", post(execute_global))
        .route("/api/work/:work_type/:subject/execute", post(execute_subject))
        .with_state(state)
}

#[derive(Serialize)]
struct WorkTypeInfo {
    id: String,
    market_timing: MarketTiming,
    depends_on: Vec<String>,
}

async fn list_types(State(state): State<ApiState>) -> Json<Vec<WorkTypeInfo>> {
    let types = state
        .registry
        .all()
        .into_iter()
        .map(|wt| WorkTypeInfo {
            id: wt.id,
            market_timing: wt.timing,
            depends_on: wt.depends_on,
        })
        .collect();

    Json(types)
}

async fn trigger(State(state): State<ApiState>) -> Json<serde_json::Value> {
    state.processor.trigger();
    Json(json!({ "status": "triggered" }))
}

async fn execute_global(
    State(state): State<ApiState>,
    Path(work_type): Path<String>,
) -> Response {
    run_now(&state, &work_type, "").await
}

async fn execute_subject(
    State(state): State<ApiState>,
    Path((work_type, subject)): Path<(String, String)>,
) -> Response {
    run_now(&state, &work_type, &subject).await
}

async fn run_now(state: &ApiState, work_type: &str, subject: &str) -> Response {
    info!(work_type, subject, "manual execution via admin api");

    match state.processor.execute_now(work_type, subject).await {
        Ok(()) => {
            let mut body = json!({ "status": "executed", "work_type": work_type });
            if !subject.is_empty() {
                body["subject"] = json!(subject);
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e @ ProcessorError::UnknownWorkType(_))
        | Err(e @ ProcessorError::DependenciesNotMet { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
