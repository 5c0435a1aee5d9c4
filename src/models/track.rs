use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A track in the catalog. Never deleted — eviction only nulls the local
/// cache fields, it does not remove the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub track_id: Uuid,
    pub title: String,
    pub artist: String,
    pub release_date: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub explicit: bool,
    pub duration_sec: f64,
    pub local_path: Option<String>,
    pub filesize_bytes: Option<i64>,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl Track {
    pub fn is_cached(&self) -> bool {
        self.local_path.is_some()
    }
}

/// Set once on first metadata fetch for a track.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Features {
    pub track_id: Uuid,
    pub tempo: Option<f64>,
    pub key: Option<i32>,
    pub mode: Option<i32>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub valence: Option<f64>,
    pub loudness: Option<f64>,
    pub instrumentalness: Option<f64>,
}

/// Set once, optional — not every track gets a lyrics analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LyricsAnalysis {
    pub track_id: Uuid,
    #[sqlx(json)]
    pub themes: Vec<String>,
    #[sqlx(json)]
    pub moods: Vec<String>,
    pub narrative_style: Option<String>,
    pub tension_score: Option<f64>,
    pub release_score: Option<f64>,
    pub vocal_density_score: Option<f64>,
    pub imagery_score: Option<f64>,
    pub narrative_continuity_score: Option<f64>,
}

/// A metadata search hit from the Metadata Provider capability, before it
/// has necessarily been ingested into the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSearchHit {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub release_date: Option<String>,
}
