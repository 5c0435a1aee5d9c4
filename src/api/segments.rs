use crate::services::{CatalogStore, SegmentQueue, SegmentScheduler};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for the thin transport-control router. This is
/// deliberately narrow: the transport itself — frame emission, resampling,
/// WebRTC/HTTP range-serving — stays out of scope.
pub struct AppState {
    pub catalog: CatalogStore,
    pub segment_queue: Arc<SegmentQueue>,
    pub scheduler: Arc<SegmentScheduler>,
}

pub fn segment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/segments/next", get(next_segment))
        .route("/segments/request-more", post(request_more))
}

#[derive(Debug, Serialize)]
struct NextSegmentResponse {
    segment: Option<crate::models::SegmentHandle>,
}

/// Pops the head of the Segment Queue for the transport to play. Returns
/// `segment: null` when the queue is momentarily empty — the transport is
/// expected to hold/loop its last frame rather than treat this as an
/// error.
async fn next_segment(State(state): State<Arc<AppState>>) -> Json<NextSegmentResponse> {
    let segment = state.segment_queue.try_consume_head().await;
    Json(NextSegmentResponse { segment })
}

/// The transport's lookahead dropped low; ask the scheduler to bypass its
/// queue-depth gate on the next tick.
async fn request_more(State(state): State<Arc<AppState>>) -> &'static str {
    state.scheduler.request_more_segments();
    "ok"
}
