use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error taxonomy for the segment-production pipeline plus the ambient
/// failure modes every service needs.
///
/// Stage-local recoveries (defaulting on a malformed planner field, falling
/// back to `blend` on an unknown transition kind, skipping voice on
/// synthesis failure) never construct these variants — they're handled
/// inline and never propagate. Only failures that prevent producing a
/// valid segment reach the scheduler as one of these.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A capability's required credentials/configuration are absent and
    /// the caller has no sensible default left to fall back to.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A capability call failed transiently (network, rate limit, timeout).
    #[error("capability call failed: {0}")]
    CapabilityTransient(String),

    /// Track selection produced no candidate.
    #[error("no candidate track available")]
    NoCandidate,

    /// The track fetcher could not obtain audio for a required track.
    #[error("failed to fetch track: {0}")]
    FetchFailed(String),

    /// The planner's response had no usable value for a field with no safe
    /// default (most fields fall back silently; this is for the rest).
    #[error("planner response malformed: {0}")]
    PlanMalformed(String),

    /// The filter-graph executor exited non-zero or produced no output.
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// A required Catalog Store write failed (segment row). Planner-trace
    /// write failures are logged and swallowed, never constructed here.
    #[error("failed to persist: {0}")]
    PersistFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::CapabilityUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::CapabilityTransient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::NoCandidate => (StatusCode::CONFLICT, self.to_string()),
            AppError::FetchFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::PlanMalformed(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::RenderFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::PersistFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Database(e) => {
                tracing::error!("database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::Http(e) => {
                tracing::error!("http client error: {e}");
                (StatusCode::BAD_GATEWAY, "upstream request failed".to_string())
            }
            AppError::Io(e) => {
                tracing::error!("io error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::Json(e) => {
                tracing::error!("json error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
