use crate::services::catalog_store::CatalogStore;
use crate::services::planning_graph::{PlanningGraph, UserContext};
use crate::services::segment_queue::SegmentQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The long-running loop that keeps the Segment Queue fed. Runs exactly
/// one Planning Graph invocation at a time; ordering of segments is
/// therefore strictly monotonic by construction.
pub struct SegmentScheduler {
    graph: Arc<PlanningGraph>,
    catalog: CatalogStore,
    queue: Arc<SegmentQueue>,
    session_id: Uuid,
    user_context: UserContext,
    running: AtomicBool,
    urgent_requested: AtomicBool,
}

/// Pure decision rule for the steady-loop tick: cooldown gate OR urgency,
/// then a queue-depth gate that urgency also bypasses. Extracted so it's
/// testable without a live clock, queue, or database.
fn can_plan(cooldown_elapsed: bool, is_urgent: bool, queue_len: usize) -> bool {
    let gated_by_cooldown = cooldown_elapsed || is_urgent;
    if !gated_by_cooldown {
        return false;
    }
    is_urgent || queue_len < 3
}

/// Cooldown adjustment after a planning attempt: reset to the 3 s floor on
/// success, back off multiplicatively (capped at 120 s) on failure or
/// no-selection.
fn next_cooldown(current: f64, succeeded: bool) -> f64 {
    if succeeded {
        3.0
    } else {
        (current * 1.5).min(120.0)
    }
}

impl SegmentScheduler {
    pub fn new(
        graph: Arc<PlanningGraph>,
        catalog: CatalogStore,
        queue: Arc<SegmentQueue>,
        session_id: Uuid,
        user_context: UserContext,
    ) -> Self {
        Self {
            graph,
            catalog,
            queue,
            session_id,
            user_context,
            running: AtomicBool::new(false),
            urgent_requested: AtomicBool::new(false),
        }
    }

    /// Transport calls this when its own lookahead is insufficient. Sets
    /// `urgent_requested`, which bypasses the queue-depth gate but not the
    /// cooldown window.
    pub fn request_more_segments(&self) {
        info!("transport requested more segments");
        self.urgent_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Creates or resumes the session, runs the bootstrap Planning Graph
    /// until it succeeds, then enters the steady loop. Intended to be
    /// spawned as a single long-lived `tokio::task`.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        if let Err(e) = self.catalog.create_session(self.session_id, "autonomous").await {
            error!(error = %e, "failed to create session (continuing anyway)");
        }

        let mut segments_planned: i64 = 0;

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            match self.graph.run_bootstrap(self.session_id, &self.user_context).await {
                Ok(handle) => {
                    info!(segment_index = handle.segment_index, "bootstrap segment ready");
                    if self.queue.offer(handle).is_err() {
                        warn!("segment queue full immediately after bootstrap; dropping handle");
                    }
                    segments_planned += 1;
                    break;
                }
                Err(e) => {
                    error!(error = %e, "bootstrap planning graph failed, retrying in 30s");
                    sleep(Duration::from_secs(30)).await;
                }
            }
        }

        let mut plan_cooldown_s: f64 = 3.0;
        let mut last_plan_at = tokio::time::Instant::now() - Duration::from_secs(3600);

        while self.running.load(Ordering::SeqCst) {
            let is_urgent = self.urgent_requested.load(Ordering::SeqCst);
            let cooldown_elapsed = last_plan_at.elapsed().as_secs_f64() >= plan_cooldown_s;

            if can_plan(cooldown_elapsed, is_urgent, self.queue.peek_len()) {
                self.urgent_requested.store(false, Ordering::SeqCst);
                last_plan_at = tokio::time::Instant::now();

                let recent = self.catalog.get_recent_plays(self.session_id, 1).await.ok();
                let song_a_uuid = recent.and_then(|r| r.into_iter().next()).map(|p| p.track_id);

                match song_a_uuid {
                    Some(song_a_uuid) => {
                        match self
                            .graph
                            .run_steady(self.session_id, segments_planned, song_a_uuid, &self.user_context)
                            .await
                        {
                            Ok(handle) => {
                                info!(segment_index = handle.segment_index, "segment ready");
                                if self.queue.offer(handle).is_err() {
                                    warn!("segment queue full, dropping rendered segment");
                                }
                                segments_planned += 1;
                                plan_cooldown_s = next_cooldown(plan_cooldown_s, true);
                            }
                            Err(e) => {
                                error!(error = %e, "planning graph invocation failed");
                                plan_cooldown_s = next_cooldown(plan_cooldown_s, false);
                            }
                        }
                    }
                    None => {
                        warn!("no play history to derive song A from, skipping this tick");
                        plan_cooldown_s = next_cooldown(plan_cooldown_s, false);
                    }
                }
            }

            sleep(Duration::from_secs(2)).await;
        }

        if let Err(e) = self.catalog.end_session(self.session_id).await {
            error!(error = %e, "failed to mark session ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_alone_gates_planning() {
        assert!(!can_plan(false, false, 0));
        assert!(can_plan(true, false, 0));
    }

    #[test]
    fn queue_depth_gate_blocks_once_at_three() {
        assert!(can_plan(true, false, 2));
        assert!(!can_plan(true, false, 3));
    }

    #[test]
    fn urgency_bypasses_both_the_cooldown_and_the_queue_depth_gate() {
        assert!(can_plan(false, true, 3));
        assert!(can_plan(false, true, 10));
    }

    #[test]
    fn cooldown_resets_on_success_and_backs_off_on_failure() {
        assert_eq!(next_cooldown(3.0, true), 3.0);
        assert_eq!(next_cooldown(40.0, true), 3.0);
        assert_eq!(next_cooldown(3.0, false), 4.5);
        assert_eq!(next_cooldown(100.0, false), 120.0);
    }
}
