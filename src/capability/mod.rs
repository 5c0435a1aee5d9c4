//! Capability interfaces: each external dependency (metadata lookup,
//! planning LLM, voice synthesis, track fetching, filter-graph execution)
//! is a trait plus a no-op implementation used for graceful degradation
//! (credentials absent) and for tests.

pub mod filter_graph_executor;
pub mod metadata_provider;
pub mod planner_llm;
pub mod track_fetcher;
pub mod voice_synthesizer;

pub use filter_graph_executor::{FfmpegExecutor, FilterGraphBuilder, FilterGraphExecutor};
pub use metadata_provider::{MetadataProvider, NullMetadataProvider, SoundchartsMetadataProvider};
pub use planner_llm::{ClaudePlannerLlm, NullPlannerLlm, PlannerLlm, TransitionPlan};
pub use track_fetcher::{NullTrackFetcher, TrackFetcher, YtDlpTrackFetcher};
pub use voice_synthesizer::{ElevenLabsVoiceSynthesizer, NullVoiceSynthesizer, VoiceSynthesizer};
