pub mod health;
pub mod segments;

pub use health::healthz;
pub use segments::{segment_routes, AppState};
