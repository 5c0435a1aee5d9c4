use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only; used as the history windows consulted by track selection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayHistoryEntry {
    pub id: i64,
    pub session_id: Uuid,
    pub track_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transition_kind: String,
}
