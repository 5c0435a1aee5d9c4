mod api;
mod capability;
mod config;
mod error;
mod models;
mod services;
mod util;

use crate::api::segments::AppState;
use crate::capability::{
    ClaudePlannerLlm, ElevenLabsVoiceSynthesizer, FfmpegExecutor, FilterGraphExecutor,
    MetadataProvider, NullMetadataProvider, NullPlannerLlm, NullVoiceSynthesizer, PlannerLlm,
    SoundchartsMetadataProvider, TrackFetcher, VoiceSynthesizer, YtDlpTrackFetcher,
};
use crate::config::Config;
use crate::services::planning_graph::ReasoningBudgets;
use crate::services::segment_contract::ContinuityParams;
use crate::services::{CatalogStore, MediaCache, PlanningGraph, SegmentQueue, SegmentScheduler, TransitionLibrary, UserContext};
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aidj=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("configuration loaded");

    let db = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    tracing::info!("connected to database");

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("database migrations completed");

    tokio::fs::create_dir_all(&config.song_cache_dir).await.ok();
    tokio::fs::create_dir_all(&config.tts_dir).await.ok();
    tokio::fs::create_dir_all(&config.segment_dir).await.ok();

    // Capability clients: each falls back to its no-op implementation when
    // credentials are absent.
    let metadata: Arc<dyn MetadataProvider> =
        match (&config.soundcharts_app_id, &config.soundcharts_api_key) {
            (Some(app_id), Some(api_key)) => {
                tracing::info!("metadata provider: soundcharts");
                Arc::new(SoundchartsMetadataProvider::new(app_id.clone(), api_key.clone()))
            }
            _ => {
                tracing::warn!("metadata provider disabled - SOUNDCHARTS_APP_ID/SOUNDCHARTS_API_KEY not set");
                Arc::new(NullMetadataProvider)
            }
        };

    let planner: Arc<dyn PlannerLlm> = match &config.anthropic_api_key {
        Some(api_key) => {
            tracing::info!("planner: claude");
            Arc::new(ClaudePlannerLlm::new(api_key.clone()))
        }
        None => {
            tracing::warn!("planner disabled - ANTHROPIC_API_KEY not set");
            Arc::new(NullPlannerLlm)
        }
    };

    let voice: Arc<dyn VoiceSynthesizer> = match (&config.elevenlabs_api_key, &config.elevenlabs_voice_id) {
        (Some(api_key), Some(voice_id)) => {
            tracing::info!("voice synthesizer: elevenlabs");
            Arc::new(ElevenLabsVoiceSynthesizer::new(
                api_key.clone(),
                voice_id.clone(),
                config.elevenlabs_model_id.clone(),
            ))
        }
        _ => {
            tracing::warn!("voice synthesizer disabled - ELEVENLABS_API_KEY/ELEVENLABS_VOICE_ID not set");
            Arc::new(NullVoiceSynthesizer)
        }
    };

    tracing::info!("track fetcher: yt-dlp");
    let fetcher: Arc<dyn TrackFetcher> = Arc::new(YtDlpTrackFetcher::new(
        config.ytdlp_path.clone(),
        config.ffmpeg_path.clone(),
        PathBuf::from(&config.song_cache_dir),
    ));
    let executor: Arc<dyn FilterGraphExecutor> = Arc::new(FfmpegExecutor::new(
        config.ffmpeg_path.clone(),
        config.target_lufs,
    ));

    let catalog = CatalogStore::new(db.clone());
    let media_cache = MediaCache::new(catalog.clone(), config.cache_max_bytes);
    let transitions = TransitionLibrary::new(config.bass_crossover_freq);
    let continuity = ContinuityParams {
        lead_in: config.lead_in,
        b_end_buffer: config.b_end_buffer,
        overlap: config.overlap,
        v_off: config.v_off,
    };
    let reasoning_budgets = ReasoningBudgets {
        track_selector: config.thinking_budget_track_selector,
        transition_planner: config.thinking_budget_transition_planner,
        speech_writer: config.thinking_budget_speech_writer,
    };

    let planning_graph = Arc::new(PlanningGraph::new(
        metadata,
        planner,
        voice,
        fetcher,
        executor,
        catalog.clone(),
        media_cache,
        transitions,
        continuity,
        PathBuf::from(&config.segment_dir),
        PathBuf::from(&config.tts_dir),
        reasoning_budgets,
        config.target_lufs,
        config.duck_level,
    ));

    let segment_queue = Arc::new(SegmentQueue::new());
    let user_context = load_user_context(&config).await;
    let session_id = Uuid::new_v4();

    let scheduler = Arc::new(SegmentScheduler::new(
        planning_graph,
        catalog.clone(),
        segment_queue.clone(),
        session_id,
        user_context,
    ));

    tokio::spawn({
        let scheduler = scheduler.clone();
        async move {
            scheduler.run().await;
        }
    });
    tracing::info!(%session_id, "segment scheduler started");

    let app_state = Arc::new(AppState {
        catalog,
        segment_queue,
        scheduler,
    });

    let app = Router::new()
        .route("/healthz", get(api::healthz))
        .nest("/api/v1", api::segment_routes())
        .with_state(app_state)
        .layer(CorsLayer::new().allow_origin(Any));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads the user-context JSON file the Planning Graph's track selector and
/// speech writer personalize against. Absent or unparseable file falls
/// back to an anonymous default rather than failing startup.
async fn load_user_context(config: &Config) -> UserContext {
    let Some(path) = &config.user_context_file else {
        return UserContext::default();
    };

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse USER_CONTEXT_FILE, using default");
                UserContext::default()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to read USER_CONTEXT_FILE, using default");
            UserContext::default()
        }
    }
}
