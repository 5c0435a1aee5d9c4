pub mod catalog_store;
pub mod media_cache;
pub mod planning_graph;
pub mod segment_contract;
pub mod segment_queue;
pub mod segment_scheduler;
pub mod transition_library;

pub use catalog_store::CatalogStore;
pub use media_cache::MediaCache;
pub use planning_graph::{PlanningGraph, UserContext};
pub use segment_queue::SegmentQueue;
pub use segment_scheduler::SegmentScheduler;
pub use transition_library::TransitionLibrary;
