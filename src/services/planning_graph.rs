use crate::capability::{
    FilterGraphBuilder, FilterGraphExecutor, MetadataProvider, PlannerLlm, TrackFetcher,
    TransitionPlan, VoiceSynthesizer,
};
use crate::error::{AppError, Result};
use crate::models::{
    NewPlannerTrace, SegmentHandle, SegmentRow, SegmentSidecar, Song1Timing, Song2Timing,
    TransitionKind, TransitionTiming, TtsTiming,
};
use crate::services::catalog_store::CatalogStore;
use crate::services::media_cache::MediaCache;
use crate::services::segment_contract::{
    self, build_steady_plan, clamp_crossfade, resolve_t_trans_a, ContinuityParams,
};
use crate::services::transition_library::TransitionLibrary;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// User-facing personalization context loaded once per process from
/// `USER_CONTEXT_FILE`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserContext {
    pub name: String,
    pub preferences: Vec<String>,
    pub mood: f64,
    pub prompt: Option<String>,
}

/// Mutable record threaded through every stage of a single Planning Graph
/// invocation. One `PlanRecord` per segment, discarded after the invocation
/// completes.
#[derive(Debug, Default)]
struct PlanRecord {
    session_id: Uuid,
    segment_index: i64,
    song_a_uuid: Option<Uuid>,
    song_b_uuid: Option<Uuid>,
    song_a_path: Option<PathBuf>,
    song_b_path: Option<PathBuf>,
    song_a_duration: Option<f64>,
    song_b_duration: Option<f64>,
    transition_kind: TransitionKind,
    t_trans_a: f64,
    x: f64,
    v_off: f64,
    rationale: String,
    speech_script: Option<String>,
    voice_path: Option<PathBuf>,
}

pub struct PlanningGraph {
    metadata: Arc<dyn MetadataProvider>,
    planner: Arc<dyn PlannerLlm>,
    voice: Arc<dyn VoiceSynthesizer>,
    fetcher: Arc<dyn TrackFetcher>,
    executor: Arc<dyn FilterGraphExecutor>,
    catalog: CatalogStore,
    media_cache: MediaCache,
    transitions: TransitionLibrary,
    continuity: ContinuityParams,
    segment_dir: PathBuf,
    tts_dir: PathBuf,
    reasoning_budgets: ReasoningBudgets,
    target_lufs: f64,
    duck_level: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ReasoningBudgets {
    pub track_selector: u32,
    pub transition_planner: u32,
    pub speech_writer: u32,
}

impl PlanningGraph {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        planner: Arc<dyn PlannerLlm>,
        voice: Arc<dyn VoiceSynthesizer>,
        fetcher: Arc<dyn TrackFetcher>,
        executor: Arc<dyn FilterGraphExecutor>,
        catalog: CatalogStore,
        media_cache: MediaCache,
        transitions: TransitionLibrary,
        continuity: ContinuityParams,
        segment_dir: PathBuf,
        tts_dir: PathBuf,
        reasoning_budgets: ReasoningBudgets,
        target_lufs: f64,
        duck_level: f64,
    ) -> Self {
        Self {
            metadata,
            planner,
            voice,
            fetcher,
            executor,
            catalog,
            media_cache,
            transitions,
            continuity,
            segment_dir,
            tts_dir,
            reasoning_budgets,
            target_lufs,
            duck_level,
        }
    }

    /// Bootstrap shape: `select_initial → ensure_cached → persist_metadata →
    /// write_intro_script → synthesize_voice → render_bootstrap_segment →
    /// persist_segment_and_history → emit_ready`.
    pub async fn run_bootstrap(
        &self,
        session_id: Uuid,
        user_context: &UserContext,
    ) -> Result<SegmentHandle> {
        let mut plan = PlanRecord {
            session_id,
            segment_index: 0,
            ..Default::default()
        };

        self.select_initial(&mut plan, user_context).await?;
        self.ensure_cached(&mut plan, false).await?;
        self.persist_metadata(&plan).await;
        self.write_intro_script(&mut plan, user_context).await;
        self.synthesize_voice(&mut plan).await;
        let (sidecar, rendered_path, duration) = self.render_bootstrap_segment(&plan).await?;
        self.persist(&plan, &rendered_path, duration, &sidecar).await?;

        Ok(SegmentHandle {
            segment_index: plan.segment_index,
            track_id: plan.song_b_uuid.expect("bootstrap always selects a track"),
            file_path: rendered_path.to_string_lossy().to_string(),
            duration_sec: duration,
        })
    }

    /// Steady shape: `plan_next_track → ensure_cached(A,B) → fetch_if_needed(B)
    /// → (plan_transition ∥ write_transition_script) → synthesize_voice →
    /// render_transition_segment → persist_segment_and_history → emit_ready`.
    pub async fn run_steady(
        &self,
        session_id: Uuid,
        segment_index: i64,
        song_a_uuid: Uuid,
        user_context: &UserContext,
    ) -> Result<SegmentHandle> {
        let mut plan = PlanRecord {
            session_id,
            segment_index,
            song_a_uuid: Some(song_a_uuid),
            ..Default::default()
        };

        self.plan_next_track(&mut plan, user_context).await?;
        self.ensure_cached(&mut plan, true).await?;

        // (plan_transition ∥ write_transition_script): independent network
        // calls, joined. plan_transition already swallows a malformed/failed
        // LLM call into a default blend plan internally; an `Err` here means
        // a genuine precondition failed (no song A), which fails the
        // segment rather than rendering on a fabricated plan.
        let (transition_result, script_result) = tokio::join!(
            self.plan_transition(&plan, user_context),
            self.write_transition_script(&plan, user_context),
        );

        let (kind, t_trans_a, x, v_off, rationale) = transition_result?;
        plan.transition_kind = kind;
        plan.t_trans_a = t_trans_a;
        plan.x = x;
        plan.v_off = v_off;
        plan.rationale = rationale;
        plan.speech_script = script_result.ok().flatten();
        self.trace(plan.session_id, "plan_transition", &plan.rationale).await;

        self.synthesize_voice(&mut plan).await;
        let (sidecar, rendered_path, duration) = self.render_transition_segment(&plan).await?;
        self.persist(&plan, &rendered_path, duration, &sidecar).await?;

        Ok(SegmentHandle {
            segment_index: plan.segment_index,
            track_id: plan.song_b_uuid.expect("steady plan always selects a track"),
            file_path: rendered_path.to_string_lossy().to_string(),
            duration_sec: duration,
        })
    }

    // --- stages -------------------------------------------------------

    async fn select_initial(&self, plan: &mut PlanRecord, ctx: &UserContext) -> Result<()> {
        let (track_id, rationale) = self.choose_track(plan.session_id, &[], ctx).await?;
        plan.song_b_uuid = Some(track_id);
        self.trace(plan.session_id, "select_initial", &rationale).await;
        Ok(())
    }

    async fn plan_next_track(&self, plan: &mut PlanRecord, ctx: &UserContext) -> Result<()> {
        let recent = self.catalog.global_recent_plays(50).await?;
        let exclude: Vec<Uuid> = recent.iter().map(|p| p.track_id).collect();
        let (track_id, rationale) = self.choose_track(plan.session_id, &exclude, ctx).await?;
        plan.song_b_uuid = Some(track_id);
        self.trace(plan.session_id, "plan_next_track", &rationale).await;
        Ok(())
    }

    /// Shared selection logic for both stages: prefer cached candidates
    /// excluding recent history; otherwise ask PL for search queries and
    /// query MP. Falls back to the first candidate if PL is unavailable;
    /// fails `NO_CANDIDATE` if nothing is found at all.
    async fn choose_track(
        &self,
        _session_id: Uuid,
        exclude: &[Uuid],
        ctx: &UserContext,
    ) -> Result<(Uuid, String)> {
        let cached = self.catalog.get_cached_tracks(20, exclude).await?;

        if !cached.is_empty() {
            let system = "You are selecting the next track for a continuous, personalized DJ mix.";
            let user = format!(
                "User: {} (mood {:.2}, preferences: {}). Candidates: {}",
                ctx.name,
                ctx.mood,
                ctx.preferences.join(", "),
                cached
                    .iter()
                    .map(|t| format!("{} — {} by {}", t.track_id, t.title, t.artist))
                    .collect::<Vec<_>>()
                    .join("; ")
            );

            match self
                .planner
                .select_track(system, &user, self.reasoning_budgets.track_selector)
                .await
            {
                Ok(sel) => {
                    if let Ok(id) = Uuid::parse_str(&sel.track_id) {
                        return Ok((id, sel.rationale));
                    }
                    warn!("planner returned non-UUID track_id, falling back to first candidate");
                }
                Err(e) => warn!(error = %e, "track selection unavailable, falling back to first candidate"),
            }

            return Ok((cached[0].track_id, "fallback selection (first cached candidate)".into()));
        }

        let queries = self
            .planner
            .suggest_search_queries(
                "Suggest up to 5 specific artist/title search queries for this listener.",
                &format!("Preferences: {}", ctx.preferences.join(", ")),
                self.reasoning_budgets.track_selector,
            )
            .await
            .unwrap_or_default();

        for query in queries.iter().take(5) {
            let hits = self.metadata.search(query, 5).await.unwrap_or_default();
            if let Some(hit) = hits.into_iter().find(|h| Uuid::parse_str(&h.id).is_ok()) {
                let id = Uuid::parse_str(&hit.id).expect("checked above");
                return Ok((id, format!("search hit for query '{query}'")));
            }
        }

        Err(AppError::NoCandidate)
    }

    /// For each track the plan currently references (A if present, B
    /// always), looks up a local path via the Media Cache / Catalog Store;
    /// fetches via TF when missing.
    async fn ensure_cached(&self, plan: &mut PlanRecord, want_a: bool) -> Result<()> {
        if want_a {
            if let Some(song_a_uuid) = plan.song_a_uuid {
                if let Some(track) = self.catalog.get_track(song_a_uuid).await? {
                    if let Some(path) = track.local_path.clone() {
                        plan.song_a_path = Some(PathBuf::from(path));
                        plan.song_a_duration = Some(track.duration_sec);
                    }
                }
            }
        }

        let song_b_uuid = plan.song_b_uuid.expect("song B must be selected before ensure_cached");
        let track = self.catalog.get_track(song_b_uuid).await?;

        if let Some(track) = &track {
            if let Some(path) = &track.local_path {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    plan.song_b_path = Some(PathBuf::from(path));
                    plan.song_b_duration = Some(track.duration_sec);
                    return Ok(());
                }
            }
        }

        let (title, artist) = track
            .as_ref()
            .map(|t| (t.title.clone(), t.artist.clone()))
            .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));

        let fetched = self
            .fetcher
            .fetch(&format!("{artist} {title}"), &artist, &title)
            .await
            .map_err(|e| AppError::FetchFailed(e.to_string()))?;

        let filesize = tokio::fs::metadata(&fetched.path).await.ok().map(|m| m.len() as i64);

        let mut track = track.unwrap_or(crate::models::Track {
            track_id: song_b_uuid,
            title,
            artist,
            release_date: None,
            language: None,
            explicit: false,
            duration_sec: fetched.duration_s,
            local_path: None,
            filesize_bytes: None,
            play_count: 0,
            last_played_at: None,
        });
        track.local_path = Some(fetched.path.to_string_lossy().to_string());
        track.filesize_bytes = filesize;
        track.duration_sec = fetched.duration_s;
        self.catalog.upsert_track(&track).await?;
        self.media_cache.enforce_limit().await?;

        plan.song_b_path = Some(fetched.path);
        plan.song_b_duration = Some(fetched.duration_s);
        Ok(())
    }

    async fn write_intro_script(&self, plan: &mut PlanRecord, ctx: &UserContext) {
        let system = "Write a short, upbeat DJ intro for the first song of a set.";
        let user = format!("Listener: {}. {}", ctx.name, ctx.prompt.clone().unwrap_or_default());
        match self
            .planner
            .write_script(system, &user, self.reasoning_budgets.speech_writer)
            .await
        {
            Ok(script) => plan.speech_script = script,
            Err(e) => warn!(error = %e, "intro script generation failed, rendering without voice"),
        }
    }

    /// Features/LyricsAnalysis are set-once: fetched from MP only the first
    /// time a track is seen, never refreshed on later plays. Popularity has
    /// no persisted column, so a successful read is only traced.
    async fn persist_metadata(&self, plan: &PlanRecord) {
        let Some(track_id) = plan.song_b_uuid else { return };
        let id = track_id.to_string();

        if matches!(self.catalog.get_features(track_id).await, Ok(None)) {
            match self.metadata.get_metadata(&id).await {
                Ok(Some(mut features)) => {
                    features.track_id = track_id;
                    if let Err(e) = self.catalog.upsert_features(&features).await {
                        warn!(error = %e, "failed to persist track features (non-fatal)");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "metadata fetch failed, rendering without features"),
            }
        }

        if matches!(self.catalog.get_lyrics_analysis(track_id).await, Ok(None)) {
            match self.metadata.get_lyrics_analysis(&id).await {
                Ok(Some(mut analysis)) => {
                    analysis.track_id = track_id;
                    if let Err(e) = self.catalog.upsert_lyrics_analysis(&analysis).await {
                        warn!(error = %e, "failed to persist lyrics analysis (non-fatal)");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "lyrics analysis fetch failed"),
            }
        }

        match self.metadata.get_popularity(&id, "spotify").await {
            Ok(Some(value)) => {
                self.trace(plan.session_id, "persist_metadata", &format!("popularity {value:.2}"))
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "popularity fetch failed"),
        }
    }

    async fn plan_transition(
        &self,
        plan: &PlanRecord,
        ctx: &UserContext,
    ) -> Result<(TransitionKind, f64, f64, f64, String)> {
        let t_a = plan
            .song_a_duration
            .ok_or_else(|| AppError::PlanMalformed("no song A for transition".into()))?;
        let t_b = plan.song_b_duration.unwrap_or(210.0);

        let system = "You are planning a DJ transition between two tracks. Respond with the transition field guide format.";
        let user = format!(
            "Song A duration {t_a:.1}s, song B duration {t_b:.1}s. Listener mood {:.2}.",
            ctx.mood
        );

        let raw = match self
            .planner
            .plan_transition(system, &user, self.reasoning_budgets.transition_planner)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "transition planning failed, using default plan");
                let default = TransitionPlan::default_for(t_a);
                return Ok((
                    default.transition_kind,
                    default.t_trans_a,
                    default.x,
                    default.v_off,
                    default.rationale,
                ));
            }
        };

        let x = clamp_crossfade(raw.x, t_a, t_b);
        let (t_trans_a, clamped) = resolve_t_trans_a(Some(raw.t_trans_a), t_a, self.continuity.b_end_buffer, x);
        if clamped {
            warn!(t_a, forced = t_trans_a, "t_trans_A clamped below its requested value");
        }

        Ok((raw.transition_kind, t_trans_a, x, raw.v_off, raw.rationale))
    }

    async fn write_transition_script(&self, plan: &PlanRecord, ctx: &UserContext) -> Result<Option<String>> {
        let system = "Write a short DJ transition line (at most 4 sentences).";
        let user = format!(
            "Listener: {}. Transitioning into a new track. {}",
            ctx.name,
            ctx.prompt.clone().unwrap_or_default()
        );
        self.planner
            .write_script(system, &user, self.reasoning_budgets.speech_writer)
            .await
    }

    async fn synthesize_voice(&self, plan: &mut PlanRecord) {
        let Some(script) = plan.speech_script.clone() else { return };
        match self.voice.synthesize(&script, &self.tts_dir).await {
            Ok(path) => plan.voice_path = path,
            Err(e) => warn!(error = %e, "voice synthesis failed, rendering without voice"),
        }
    }

    async fn render_bootstrap_segment(
        &self,
        plan: &PlanRecord,
    ) -> Result<(SegmentSidecar, PathBuf, f64)> {
        let song_b_path = plan.song_b_path.clone().expect("song B must be cached before render");
        let t_b = plan.song_b_duration.unwrap_or(210.0);
        let b_trim = segment_contract::bootstrap_b_trim(t_b, self.continuity.b_end_buffer);

        let output_path = self.segment_dir.join(format!("bootstrap_{}.mp3", Uuid::new_v4()));
        tokio::fs::create_dir_all(&self.segment_dir).await?;

        let mut inputs = vec![song_b_path.clone()];
        let graph = if let Some(voice_path) = &plan.voice_path {
            inputs.insert(0, voice_path.clone());
            format!(
                "[0:a]afade=t=out:st=0:d=0.5[tts];\
                 [1:a]atrim=start=0:duration={b_trim},asetpts=PTS-STARTPTS,\
                 afade=t=in:st=0:d={overlap}[song];\
                 [tts][song]amix=inputs=2:duration=longest:dropout_transition=0[out]",
                overlap = self.continuity.overlap,
            )
        } else {
            format!("[0:a]atrim=start=0:duration={b_trim},asetpts=PTS-STARTPTS[out]")
        };

        let validated = FilterGraphBuilder::new().push(graph).build()?;
        self.executor.run(&inputs, &validated, &["[out]"], &output_path).await?;
        let actual_duration = self.executor.probe_duration(&output_path).await?;

        let sidecar = SegmentSidecar {
            song1: None,
            song2: Song2Timing {
                start: 0.0,
                end: b_trim,
                handoff_start: b_trim,
                overlap_with_next: self.continuity.overlap,
            },
            transition: None,
            tts: plan.voice_path.as_ref().map(|_| TtsTiming {
                start: 0.0,
                end: 0.5,
                delay_ms: 0,
            }),
            render: crate::models::RenderTiming {
                expected_duration: b_trim,
                actual_duration,
                handoff_gap: 0.0,
            },
        };

        Ok((sidecar, output_path, actual_duration))
    }

    async fn render_transition_segment(
        &self,
        plan: &PlanRecord,
    ) -> Result<(SegmentSidecar, PathBuf, f64)> {
        let song_a_path = plan.song_a_path.clone().ok_or_else(|| {
            AppError::RenderFailed("steady segment requires song A to be cached".into())
        })?;
        let song_b_path = plan.song_b_path.clone().expect("song B must be cached before render");
        let t_a = plan.song_a_duration.unwrap_or(210.0);
        let t_b = plan.song_b_duration.unwrap_or(210.0);

        let steady = build_steady_plan(t_a, t_b, plan.x, plan.t_trans_a, &self.continuity);
        // Bass swap's peak time is relative to the trimmed-and-reset A
        // stream (asetpts=PTS-STARTPTS), i.e. the segment timeline, not A's
        // original absolute position.
        let peak_time = steady.tau_x + plan.x / 2.0;

        let gain_a = self.target_lufs - self.executor.probe_loudness(&song_a_path).await?;
        let gain_b = self.target_lufs - self.executor.probe_loudness(&song_b_path).await?;

        let mut inputs = vec![song_a_path, song_b_path];
        let mut builder = FilterGraphBuilder::new();
        builder.push(format!(
            "[0:a]atrim=start={:.3}:duration={:.3},asetpts=PTS-STARTPTS,volume={:.2}dB[a1];\
             [1:a]atrim=duration={:.3},asetpts=PTS-STARTPTS,volume={:.2}dB,adelay={}|{}[a2]",
            steady.t_start_a, steady.l_a_seg, gain_a,
            steady.t_b_end, gain_b, steady.delay_ms, steady.delay_ms,
        ));
        builder.push(self.transitions.build(plan.transition_kind, plan.x, peak_time, "[a1]", "[a2]", "[mix]"));

        let voice_timing = if let Some(voice_path) = &plan.voice_path {
            inputs.push(voice_path.clone());
            let voice_duration = self.executor.probe_duration(voice_path).await?;
            let gain_v = self.target_lufs - self.executor.probe_loudness(voice_path).await?;
            let v = segment_contract::voice_timing(steady.tau_x, plan.v_off, voice_duration);

            builder.push(format!(
                "[2:a]volume={:.2}dB,adelay={}|{}[tts]",
                gain_v, v.delay_ms, v.delay_ms,
            ));
            builder.push(format!(
                "[mix]volume=enable=between(t\\,{:.3}\\,{:.3}):volume={}[ducked]",
                v.t_v_start, v.t_v_end, self.duck_level,
            ));
            builder.push("[ducked][tts]amix=inputs=2:duration=longest:normalize=0[mixed]");
            builder.push("[mixed]alimiter=limit=0.95[out]");
            Some(v)
        } else {
            builder.push("[mix]alimiter=limit=0.95[out]");
            None
        };

        let validated = builder.build()?;
        let output_path = self.segment_dir.join(format!("segment_{}.mp3", Uuid::new_v4()));
        tokio::fs::create_dir_all(&self.segment_dir).await?;

        self.executor.run(&inputs, &validated, &["[out]"], &output_path).await?;
        let actual_duration = self.executor.probe_duration(&output_path).await?;

        if (actual_duration - steady.d_seg).abs() > 0.25 && actual_duration < steady.d_seg {
            warn!(
                expected = steady.d_seg,
                actual = actual_duration,
                "rendered segment shorter than expected duration"
            );
        }

        let gap = segment_contract::handoff_gap(&steady);
        if gap > 0.0 {
            warn!(gap, "positive handoff gap between consecutive segments");
        }

        let sidecar = SegmentSidecar {
            song1: Some(Song1Timing {
                start: steady.t_start_a,
                end: t_a,
                transition_start: plan.t_trans_a,
                segment_transition_pos: steady.tau_x,
            }),
            song2: Song2Timing {
                start: 0.0,
                end: steady.t_b_end,
                handoff_start: steady.handoff_b,
                overlap_with_next: self.continuity.overlap,
            },
            transition: Some(TransitionTiming {
                kind: plan.transition_kind,
                crossfade_duration: plan.x,
                delay_ms: steady.delay_ms,
                start_in_segment: steady.tau_x,
            }),
            tts: voice_timing.map(|v| TtsTiming {
                start: v.t_v_start,
                end: v.t_v_end,
                delay_ms: v.delay_ms,
            }),
            render: crate::models::RenderTiming {
                expected_duration: steady.d_seg,
                actual_duration,
                handoff_gap: gap,
            },
        };

        Ok((sidecar, output_path, actual_duration))
    }

    async fn persist(
        &self,
        plan: &PlanRecord,
        rendered_path: &PathBuf,
        duration: f64,
        sidecar: &SegmentSidecar,
    ) -> Result<()> {
        let track_id = plan.song_b_uuid.expect("persist requires a selected track");

        let sidecar_path = rendered_path.with_extension("json");
        match serde_json::to_vec_pretty(sidecar) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&sidecar_path, bytes).await {
                    warn!(error = %e, "failed to write segment sidecar (non-fatal)");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize segment sidecar (non-fatal)"),
        }

        let row = SegmentRow {
            id: 0,
            session_id: plan.session_id,
            segment_index: plan.segment_index,
            track_id,
            file_path: rendered_path.to_string_lossy().to_string(),
            duration_sec: duration,
            used_voice: plan.voice_path.is_some(),
            created_at: chrono::Utc::now(),
        };
        self.catalog.insert_segment(&row).await?;
        self.catalog.record_play(track_id).await?;
        self.catalog
            .insert_play_history(plan.session_id, track_id, &plan.transition_kind.to_string())
            .await?;

        info!(segment_index = plan.segment_index, %track_id, "segment persisted");
        Ok(())
    }

    async fn trace(&self, session_id: Uuid, stage: &str, rationale: &str) {
        let trace = NewPlannerTrace {
            session_id,
            stage: stage.to_string(),
            prompt: String::new(),
            response: rationale.to_string(),
            model: "n/a".to_string(),
            reasoning_budget: None,
        };
        // Planner traces are a non-fatal, best-effort record.
        if let Err(e) = self.catalog.insert_planner_trace(&trace).await {
            warn!(error = %e, "failed to persist planner trace (non-fatal)");
        }
    }
}
