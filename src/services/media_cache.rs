use crate::services::catalog_store::CatalogStore;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Enforces the byte budget on locally cached track files, evicting
/// least-played-first once the budget is exceeded, with the eviction
/// ordering pushed down into a single Catalog Store query rather than
/// iterating row-by-row in application code.
#[derive(Clone)]
pub struct MediaCache {
    catalog: CatalogStore,
    max_bytes: i64,
}

impl MediaCache {
    pub fn new(catalog: CatalogStore, max_bytes: u64) -> Self {
        Self {
            catalog,
            max_bytes: max_bytes as i64,
        }
    }

    pub async fn cache_size_bytes(&self) -> crate::error::Result<i64> {
        self.catalog.cache_size_bytes().await
    }

    /// Evicts least-played cached tracks (deleting their files) until the
    /// total cache size is at or under budget. Returns the evicted track
    /// ids.
    pub async fn enforce_limit(&self) -> crate::error::Result<Vec<Uuid>> {
        let current_size = self.catalog.cache_size_bytes().await?;
        if current_size <= self.max_bytes {
            return Ok(Vec::new());
        }

        info!(current_size, max_bytes = self.max_bytes, "cache over budget, evicting");

        let candidates = self.catalog.cached_tracks_by_play_count().await?;
        let sizes: Vec<(Uuid, i64)> = candidates
            .iter()
            .map(|t| (t.track_id, t.filesize_bytes.unwrap_or(0)))
            .collect();
        let evicted = select_evictions(&sizes, current_size, self.max_bytes);
        let by_id: std::collections::HashMap<Uuid, &crate::models::Track> =
            candidates.iter().map(|t| (t.track_id, t)).collect();

        for track_id in &evicted {
            if let Some(local_path) = by_id.get(track_id).and_then(|t| t.local_path.as_ref()) {
                if Path::new(local_path).exists() {
                    if let Err(e) = tokio::fs::remove_file(local_path).await {
                        warn!(path = %local_path, error = %e, "failed to delete evicted track file");
                    }
                }
            }
            self.catalog.clear_local_path(*track_id).await?;
        }

        info!(evicted = evicted.len(), "cache eviction complete");
        Ok(evicted)
    }
}

/// Pure eviction decision: walks `candidates` (expected least-played-first,
/// the order `cached_tracks_by_play_count` queries for) and picks tracks to
/// evict, in order, until `current_size` would fall at or under `max_bytes`.
fn select_evictions(candidates: &[(Uuid, i64)], current_size: i64, max_bytes: i64) -> Vec<Uuid> {
    let mut remaining = current_size;
    let mut evicted = Vec::new();
    for (track_id, filesize) in candidates {
        if remaining <= max_bytes {
            break;
        }
        remaining -= filesize;
        evicted.push(*track_id);
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_played_first_until_under_budget() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        // Ordered least-played-first, as cached_tracks_by_play_count returns.
        let candidates = vec![(a, 30), (b, 30), (c, 30)];

        let evicted = select_evictions(&candidates, 100, 50);

        assert_eq!(evicted, vec![a, b]);
    }

    #[test]
    fn stops_evicting_once_under_budget() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let candidates = vec![(a, 60), (b, 60)];

        let evicted = select_evictions(&candidates, 70, 50);

        assert_eq!(evicted, vec![a]);
    }

    #[test]
    fn no_eviction_when_already_under_budget() {
        let candidates = vec![(Uuid::new_v4(), 10)];
        assert!(select_evictions(&candidates, 40, 50).is_empty());
    }
}
