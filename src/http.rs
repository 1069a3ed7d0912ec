// HTTP façade (C6): route dispatch, JSON codec, error-to-status mapping.
// Handlers never touch node state directly — they call into the
// `ReplicationController`, which owns the critical section, and hand
// anything that mutates state off to `propagate` for outbound replication.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::operation::{OpKind, Operation};
use crate::replication::DeliveryOutcome;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/alumnos", post(create_record).get(list_records))
        .route(
            "/alumnos/{key}",
            get(get_record).put(update_record),
        )
        .route("/replicate", post(replicate))
        .route("/log", get(log))
        .route("/queue", get(queue))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.controller.health()))
}

#[derive(Debug, Deserialize)]
struct WriteRequest {
    key: String,
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    payload: Value,
}

#[derive(Debug, Serialize)]
struct WriteResponse<'a> {
    key: &'a str,
    vc: &'a crate::vector_clock::VectorClock,
}

async fn create_record(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> AppResult<Json<Value>> {
    let op = state
        .controller
        .local_write(OpKind::Create, req.key, req.payload)?;
    spawn_propagation(&state, op.clone());
    Ok(Json(json!(WriteResponse {
        key: &op.key,
        vc: &op.vc
    })))
}

async fn update_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> AppResult<Json<Value>> {
    let op = state
        .controller
        .local_write(OpKind::Update, key, req.payload)?;
    spawn_propagation(&state, op.clone());
    Ok(Json(json!(WriteResponse {
        key: &op.key,
        vc: &op.vc
    })))
}

async fn list_records(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.controller.list()))
}

async fn get_record(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Json<Value>> {
    state
        .controller
        .get(&key)
        .map(|record| Json(json!(record)))
        .ok_or_else(|| AppError::NotFound(format!("key {key:?} not found")))
}

#[derive(Debug, Serialize)]
struct ReplicateResponse {
    accepted: bool,
    delivered_now: bool,
}

async fn replicate(
    State(state): State<AppState>,
    Json(op): Json<Operation>,
) -> AppResult<Json<ReplicateResponse>> {
    let outcome = state.controller.replicate(op)?;
    Ok(Json(ReplicateResponse {
        accepted: true,
        delivered_now: matches!(
            outcome,
            DeliveryOutcome::Delivered | DeliveryOutcome::AlreadyApplied
        ),
    }))
}

async fn log(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.controller.log_snapshot()))
}

async fn queue(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.controller.queue_snapshot()))
}

fn spawn_propagation(state: &AppState, op: Operation) {
    let controller = std::sync::Arc::clone(&state.controller);
    tokio::spawn(async move {
        controller.propagate(op).await;
    });
}
