use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only, optional: a failed insert here is logged and swallowed,
/// never propagated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlannerTrace {
    pub id: i64,
    pub session_id: Uuid,
    pub stage: String,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub reasoning_budget: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlannerTrace {
    pub session_id: Uuid,
    pub stage: String,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub reasoning_budget: Option<i32>,
}
