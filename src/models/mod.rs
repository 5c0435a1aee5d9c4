pub mod play_history;
pub mod planner_trace;
pub mod segment;
pub mod session;
pub mod track;

pub use play_history::PlayHistoryEntry;
pub use planner_trace::{NewPlannerTrace, PlannerTrace};
pub use segment::{
    RenderTiming, SegmentHandle, SegmentRow, SegmentSidecar, Song1Timing, Song2Timing,
    TransitionKind, TransitionTiming, TtsTiming,
};
pub use session::Session;
pub use track::{Features, LyricsAnalysis, MetadataSearchHit, Track};
