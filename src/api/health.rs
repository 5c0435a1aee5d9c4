use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::segments::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    queue_depth: usize,
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        queue_depth: state.segment_queue.peek_len(),
    })
}
