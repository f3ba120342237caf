//! Fingerprint-keyed match cache with per-entry TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::schema::ProfileId;

/// Hex-encoded SHA-256 killmail fingerprint.
pub type Fingerprint = String;

/// Upper bound on an entry's lifetime; longer TTLs are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    matches: Arc<Vec<ProfileId>>,
    /// Index generation the result was computed against.
    generation: u64,
    expires_at: Instant,
}

/// Concurrent match cache.
///
/// Entries remember the index generation they were computed against; a lookup
/// under a different generation is a miss, so results from before a rebuild
/// are never served.
#[derive(Debug, Default)]
pub struct MatchCache {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &str, generation: u64) -> Option<Arc<Vec<ProfileId>>> {
        let entry = self.entries.get(fingerprint)?;
        if entry.generation != generation || entry.expires_at <= Instant::now() {
            return None;
        }
        Some(Arc::clone(&entry.matches))
    }

    pub fn put(
        &self,
        fingerprint: Fingerprint,
        matches: Arc<Vec<ProfileId>>,
        generation: u64,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        self.entries.insert(
            fingerprint,
            CacheEntry {
                matches,
                generation,
                expires_at,
            },
        );
    }

    /// Drop expired entries and entries from older generations.
    pub fn cleanup(&self, current_generation: u64) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.expires_at > now && e.generation == current_generation);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl_and_generation() {
        let cache = MatchCache::new();
        cache.put("fp".into(), Arc::new(vec![1, 2]), 3, Duration::from_secs(60));

        assert_eq!(cache.get("fp", 3).as_deref(), Some(&vec![1, 2]));
        assert!(cache.get("fp", 4).is_none(), "stale generation is a miss");
        assert!(cache.get("other", 3).is_none());
    }

    #[test]
    fn expired_entries_miss_and_are_swept() {
        let cache = MatchCache::new();
        cache.put("old".into(), Arc::new(vec![1]), 1, Duration::ZERO);
        cache.put("fresh".into(), Arc::new(vec![2]), 1, Duration::from_secs(60));
        cache.put("stale".into(), Arc::new(vec![3]), 0, Duration::from_secs(60));

        assert!(cache.get("old", 1).is_none());
        assert_eq!(cache.cleanup(1), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh", 1).is_some());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let cache = MatchCache::new();
        cache.put("fp".into(), Arc::new(vec![1]), 1, Duration::MAX);

        assert_eq!(cache.get("fp", 1).as_deref(), Some(&vec![1]));
        assert_eq!(cache.cleanup(1), 0);
    }
}
