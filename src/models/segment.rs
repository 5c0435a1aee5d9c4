use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One of the five transition kinds the Transition Library knows how to
/// build, plus the `blend`/`crossfade` alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Blend,
    BassSwap,
    FilterSweep,
    EchoOut,
    VinylStop,
}

impl TransitionKind {
    /// Any string that doesn't match a known kind collapses to `Blend`.
    pub fn parse_or_blend(s: &str) -> Self {
        match s {
            "blend" | "crossfade" => TransitionKind::Blend,
            "bass_swap" => TransitionKind::BassSwap,
            "filter_sweep" => TransitionKind::FilterSweep,
            "echo_out" => TransitionKind::EchoOut,
            "vinyl_stop" => TransitionKind::VinylStop,
            _ => TransitionKind::Blend,
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransitionKind::Blend => "blend",
            TransitionKind::BassSwap => "bass_swap",
            TransitionKind::FilterSweep => "filter_sweep",
            TransitionKind::EchoOut => "echo_out",
            TransitionKind::VinylStop => "vinyl_stop",
        };
        write!(f, "{s}")
    }
}

/// Append-only row persisted by `persist_*_segment`; `track_id` is the B
/// track of the transition the segment carries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SegmentRow {
    pub id: i64,
    pub session_id: Uuid,
    pub segment_index: i64,
    pub track_id: Uuid,
    pub file_path: String,
    pub duration_sec: f64,
    pub used_voice: bool,
    pub created_at: DateTime<Utc>,
}

/// The handle placed on the Segment Queue: just enough for the transport
/// to play the file and for the scheduler to log what it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHandle {
    pub segment_index: i64,
    pub track_id: Uuid,
    pub file_path: String,
    pub duration_sec: f64,
}

/// The sidecar JSON written alongside each rendered segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSidecar {
    /// `None` for the bootstrap segment, which has no preceding A track.
    pub song1: Option<Song1Timing>,
    pub song2: Song2Timing,
    /// `None` for the bootstrap segment (no transition to describe).
    pub transition: Option<TransitionTiming>,
    pub tts: Option<TtsTiming>,
    pub render: RenderTiming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song1Timing {
    pub start: f64,
    pub end: f64,
    pub transition_start: f64,
    pub segment_transition_pos: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song2Timing {
    pub start: f64,
    pub end: f64,
    pub handoff_start: f64,
    pub overlap_with_next: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionTiming {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub crossfade_duration: f64,
    pub delay_ms: i64,
    pub start_in_segment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsTiming {
    pub start: f64,
    pub end: f64,
    pub delay_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderTiming {
    pub expected_duration: f64,
    pub actual_duration: f64,
    pub handoff_gap: f64,
}
