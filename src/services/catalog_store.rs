use crate::error::Result;
use crate::models::{
    Features, LyricsAnalysis, NewPlannerTrace, PlannerTrace, PlayHistoryEntry, SegmentRow,
    Session, Track,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed persistence for tracks, their derived features,
/// sessions, play history, rendered segments, and planner traces, shared
/// across the scheduler and transport-control router via a connection
/// pool.
#[derive(Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_track(&self, track_id: Uuid) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE track_id = $1")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(track)
    }

    pub async fn upsert_track(&self, track: &Track) -> Result<()> {
        sqlx::query(
            "INSERT INTO tracks
                (track_id, title, artist, release_date, language, explicit,
                 duration_sec, local_path, filesize_bytes, play_count, last_played_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (track_id) DO UPDATE SET
                title = EXCLUDED.title,
                artist = EXCLUDED.artist,
                release_date = EXCLUDED.release_date,
                language = EXCLUDED.language,
                explicit = EXCLUDED.explicit,
                duration_sec = EXCLUDED.duration_sec,
                local_path = EXCLUDED.local_path,
                filesize_bytes = EXCLUDED.filesize_bytes,
                play_count = EXCLUDED.play_count,
                last_played_at = EXCLUDED.last_played_at",
        )
        .bind(track.track_id)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(track.release_date)
        .bind(&track.language)
        .bind(track.explicit)
        .bind(track.duration_sec)
        .bind(&track.local_path)
        .bind(track.filesize_bytes)
        .bind(track.play_count)
        .bind(track.last_played_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_play(&self, track_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE tracks SET play_count = play_count + 1, last_played_at = $2
             WHERE track_id = $1",
        )
        .bind(track_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Tracks with a populated `local_path` (i.e. already cached locally),
    /// ordered least-played-first, excluding a caller-supplied set (usually
    /// the recently played window, as a recency guardrail).
    pub async fn get_cached_tracks(&self, limit: i64, exclude: &[Uuid]) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            "SELECT * FROM tracks
             WHERE local_path IS NOT NULL AND NOT (track_id = ANY($1))
             ORDER BY play_count ASC, COALESCE(last_played_at, TIMESTAMP 'epoch') ASC
             LIMIT $2",
        )
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracks)
    }

    pub async fn upsert_features(&self, features: &Features) -> Result<()> {
        sqlx::query(
            "INSERT INTO features
                (track_id, tempo, key, mode, energy, danceability, valence, loudness, instrumentalness)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (track_id) DO UPDATE SET
                tempo = EXCLUDED.tempo, key = EXCLUDED.key, mode = EXCLUDED.mode,
                energy = EXCLUDED.energy, danceability = EXCLUDED.danceability,
                valence = EXCLUDED.valence, loudness = EXCLUDED.loudness,
                instrumentalness = EXCLUDED.instrumentalness",
        )
        .bind(features.track_id)
        .bind(features.tempo)
        .bind(features.key)
        .bind(features.mode)
        .bind(features.energy)
        .bind(features.danceability)
        .bind(features.valence)
        .bind(features.loudness)
        .bind(features.instrumentalness)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_features(&self, track_id: Uuid) -> Result<Option<Features>> {
        let features = sqlx::query_as::<_, Features>("SELECT * FROM features WHERE track_id = $1")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(features)
    }

    pub async fn upsert_lyrics_analysis(&self, analysis: &LyricsAnalysis) -> Result<()> {
        sqlx::query(
            "INSERT INTO lyrics_analysis
                (track_id, themes, moods, narrative_style, tension_score, release_score,
                 vocal_density_score, imagery_score, narrative_continuity_score)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (track_id) DO UPDATE SET
                themes = EXCLUDED.themes, moods = EXCLUDED.moods,
                narrative_style = EXCLUDED.narrative_style,
                tension_score = EXCLUDED.tension_score, release_score = EXCLUDED.release_score,
                vocal_density_score = EXCLUDED.vocal_density_score,
                imagery_score = EXCLUDED.imagery_score,
                narrative_continuity_score = EXCLUDED.narrative_continuity_score",
        )
        .bind(analysis.track_id)
        .bind(sqlx::types::Json(&analysis.themes))
        .bind(sqlx::types::Json(&analysis.moods))
        .bind(&analysis.narrative_style)
        .bind(analysis.tension_score)
        .bind(analysis.release_score)
        .bind(analysis.vocal_density_score)
        .bind(analysis.imagery_score)
        .bind(analysis.narrative_continuity_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_lyrics_analysis(&self, track_id: Uuid) -> Result<Option<LyricsAnalysis>> {
        let analysis =
            sqlx::query_as::<_, LyricsAnalysis>("SELECT * FROM lyrics_analysis WHERE track_id = $1")
                .bind(track_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(analysis)
    }

    pub async fn create_session(&self, session_id: Uuid, mode: &str) -> Result<()> {
        sqlx::query("INSERT INTO sessions (session_id, started_at, mode) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(Utc::now())
            .bind(mode)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET ended_at = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn insert_play_history(
        &self,
        session_id: Uuid,
        track_id: Uuid,
        transition_kind: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO play_history (session_id, track_id, started_at, transition_kind)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(track_id)
        .bind(Utc::now())
        .bind(transition_kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recently played tracks for a session, most recent first — the
    /// window the Planning Graph consults for its recency guardrail.
    pub async fn get_recent_plays(&self, session_id: Uuid, limit: i64) -> Result<Vec<PlayHistoryEntry>> {
        let rows = sqlx::query_as::<_, PlayHistoryEntry>(
            "SELECT * FROM play_history WHERE session_id = $1 ORDER BY started_at DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recently played tracks across all sessions, most recent first —
    /// the exclusion window track selection consults so a track freshly
    /// played in another session doesn't resurface immediately.
    pub async fn global_recent_plays(&self, limit: i64) -> Result<Vec<PlayHistoryEntry>> {
        let rows = sqlx::query_as::<_, PlayHistoryEntry>(
            "SELECT * FROM play_history ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_segment(&self, segment: &SegmentRow) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO segments
                (session_id, segment_index, track_id, file_path, duration_sec, used_voice, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(segment.session_id)
        .bind(segment.segment_index)
        .bind(segment.track_id)
        .bind(&segment.file_path)
        .bind(segment.duration_sec)
        .bind(segment.used_voice)
        .bind(segment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.0)
    }

    pub async fn insert_planner_trace(&self, trace: &NewPlannerTrace) -> Result<()> {
        sqlx::query(
            "INSERT INTO planner_traces
                (session_id, stage, prompt, response, model, reasoning_budget, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(trace.session_id)
        .bind(&trace.stage)
        .bind(&trace.prompt)
        .bind(&trace.response)
        .bind(&trace.model)
        .bind(trace.reasoning_budget)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_traces(&self, session_id: Uuid, limit: i64) -> Result<Vec<PlannerTrace>> {
        let traces = sqlx::query_as::<_, PlannerTrace>(
            "SELECT * FROM planner_traces WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(traces)
    }

    /// Total bytes currently occupied by cached (locally downloaded) tracks.
    pub async fn cache_size_bytes(&self) -> Result<i64> {
        let total: (Option<i64>,) =
            sqlx::query_as("SELECT SUM(filesize_bytes) FROM tracks WHERE local_path IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.0.unwrap_or(0))
    }

    /// Tracks eligible for eviction, least-played-first (the Media Cache's
    /// eviction candidate order).
    pub async fn cached_tracks_by_play_count(&self) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            "SELECT * FROM tracks
             WHERE local_path IS NOT NULL
             ORDER BY play_count ASC, COALESCE(last_played_at, TIMESTAMP 'epoch') ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tracks)
    }

    pub async fn clear_local_path(&self, track_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE tracks SET local_path = NULL, filesize_bytes = NULL WHERE track_id = $1",
        )
        .bind(track_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
