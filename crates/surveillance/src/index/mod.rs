//! Profile index: compiled predicates, inverted index and match cache.
//!
//! The compiled profiles and the inverted index live together in an immutable
//! [`IndexSnapshot`]. [`IndexManager::rebuild`] builds a complete new snapshot
//! off to the side and publishes it with a single pointer swap, so lookups
//! never block and never see a half-built index. Each snapshot carries a
//! generation number which also scopes the match cache.

mod cache;


use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use killwatch_core::Killmail;
use serde::Serialize;
use tracing::{info, warn};

use crate::compiler::{compile_profile, CompiledProfile, IndexKey, IndexPlan};
use crate::schema::{Field, Profile, ProfileId};

pub use self::cache::{Fingerprint, MatchCache};

// ── Snapshot ────────────────────────────────────────────────────────

/// One immutable generation of the profile index.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    generation: u64,
    profiles: HashMap<ProfileId, CompiledProfile>,
    postings: HashMap<IndexKey, Vec<ProfileId>>,
    /// Fields that appear in at least one posting key.
    indexed_fields: Vec<Field>,
    full_scan: BTreeSet<ProfileId>,
}

impl IndexSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn profile(&self, id: ProfileId) -> Option<&CompiledProfile> {
        self.profiles.get(&id)
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn full_scan(&self) -> &BTreeSet<ProfileId> {
        &self.full_scan
    }

    /// Profiles that may match `km`: a superset of the true matches.
    pub fn find_candidates(&self, km: &Killmail) -> BTreeSet<ProfileId> {
        let mut candidates = self.full_scan.clone();
        for &field in &self.indexed_fields {
            for value in field.extract(km).index_keys() {
                if let Some(ids) = self.postings.get(&IndexKey { field, value }) {
                    candidates.extend(ids.iter().copied());
                }
            }
        }
        candidates
    }

    fn build(generation: u64, profiles: &[Profile]) -> (IndexSnapshot, RebuildReport) {
        let mut snapshot = IndexSnapshot {
            generation,
            ..IndexSnapshot::default()
        };
        let mut report = RebuildReport {
            generation,
            ..RebuildReport::default()
        };

        for profile in profiles {
            // Last definition wins, even when it is inactive or fails to compile.
            if snapshot.profiles.contains_key(&profile.id) {
                warn!(profile_id = profile.id, "duplicate profile id, keeping the last definition");
                snapshot.remove(profile.id);
            }
            if !profile.is_active {
                report.skipped_inactive += 1;
                continue;
            }
            let compiled = match compile_profile(profile) {
                Ok(c) => c,
                Err(e) => {
                    warn!(profile_id = profile.id, error = %e, "excluding profile that failed to compile");
                    report.failures.push(ProfileFailure {
                        profile_id: profile.id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            snapshot.insert(compiled);
        }

        let mut fields: Vec<Field> = snapshot.postings.keys().map(|k| k.field).collect();
        fields.sort();
        fields.dedup();
        snapshot.indexed_fields = fields;

        report.compiled = snapshot.profiles.len();
        report.full_scan = snapshot.full_scan.len();
        report.indexed = report.compiled - report.full_scan;
        report.index_keys = snapshot.postings.len();
        (snapshot, report)
    }

    fn insert(&mut self, compiled: CompiledProfile) {
        let id = compiled.id;
        match &compiled.plan {
            IndexPlan::FullScan => {
                self.full_scan.insert(id);
            }
            IndexPlan::Keys(keys) => {
                for key in keys {
                    self.postings.entry(*key).or_default().push(id);
                }
            }
        }
        self.profiles.insert(id, compiled);
    }

    fn remove(&mut self, id: ProfileId) {
        self.profiles.remove(&id);
        self.full_scan.remove(&id);
        self.postings.retain(|_, ids| {
            ids.retain(|p| *p != id);
            !ids.is_empty()
        });
    }
}

// ── Reports ─────────────────────────────────────────────────────────

/// A profile left out of a rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileFailure {
    pub profile_id: ProfileId,
    pub error: String,
}

/// Outcome of [`IndexManager::rebuild`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    pub generation: u64,
    /// Profiles compiled into the new snapshot.
    pub compiled: usize,
    /// Compiled profiles registered under index keys.
    pub indexed: usize,
    /// Compiled profiles evaluated against every killmail.
    pub full_scan: usize,
    pub index_keys: usize,
    pub skipped_inactive: usize,
    pub failures: Vec<ProfileFailure>,
}

/// Point-in-time sizes of the index tables.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub generation: u64,
    pub profiles: usize,
    pub full_scan: usize,
    pub index_keys: usize,
    pub cache_entries: usize,
}

// ── Manager ─────────────────────────────────────────────────────────

/// Owner of the current index snapshot and the match cache.
pub struct IndexManager {
    current: ArcSwap<IndexSnapshot>,
    cache: MatchCache,
    /// Serializes rebuilds; lookups never take it.
    rebuild_lock: Mutex<()>,
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexManager {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(IndexSnapshot::default()),
            cache: MatchCache::new(),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Compile `profiles` into a fresh snapshot and publish it atomically.
    ///
    /// Inactive profiles are skipped and profiles that fail to compile are
    /// excluded with a warning; neither aborts the rebuild. The match cache
    /// is cleared because its entries belong to the previous generation.
    pub fn rebuild(&self, profiles: &[Profile]) -> RebuildReport {
        let _guard = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = self.current.load().generation + 1;
        let (snapshot, report) = IndexSnapshot::build(generation, profiles);
        self.current.store(Arc::new(snapshot));
        self.cache.clear();

        info!(
            generation,
            compiled = report.compiled,
            indexed = report.indexed,
            full_scan = report.full_scan,
            failures = report.failures.len(),
            "profile index rebuilt"
        );
        report
    }

    /// The current snapshot; stays valid even if a rebuild swaps it out.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn find_candidates(&self, km: &Killmail) -> BTreeSet<ProfileId> {
        self.current.load().find_candidates(km)
    }

    /// Cached matches for `fingerprint` computed against the current generation.
    pub fn cache_get(&self, fingerprint: &str) -> Option<Arc<Vec<ProfileId>>> {
        self.cache.get(fingerprint, self.generation())
    }

    /// Store matches computed against snapshot `generation`.
    pub fn cache_put(
        &self,
        fingerprint: Fingerprint,
        matches: Arc<Vec<ProfileId>>,
        generation: u64,
        ttl: Duration,
    ) {
        if generation != self.generation() {
            // Computed against a snapshot that has since been replaced.
            return;
        }
        self.cache.put(fingerprint, matches, generation, ttl);
    }

    /// Sweep expired cache entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cache.cleanup(self.generation())
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.current.load();
        IndexStats {
            generation: snapshot.generation,
            profiles: snapshot.profiles.len(),
            full_scan: snapshot.full_scan.len(),
            index_keys: snapshot.postings.len(),
            cache_entries: self.cache.len(),
        }
    }
}
