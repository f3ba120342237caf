//! In-process recorder for embedding and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MatchRecord, MatchRecorder, PersistenceError, ProfileCounter};
use crate::schema::ProfileId;

#[derive(Debug, Default)]
struct State {
    records: Vec<MatchRecord>,
    counters: HashMap<ProfileId, (u64, DateTime<Utc>)>,
    batches: usize,
}

/// Keeps every recorded match in memory.
///
/// [`fail_next`](Self::fail_next) makes the following batches fail, which
/// lets callers exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryMatchRecorder {
    state: Mutex<State>,
    failures_left: AtomicUsize,
}

impl InMemoryMatchRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, batches: usize) {
        self.failures_left.store(batches, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.lock().records.clone()
    }

    pub fn match_count(&self, profile_id: ProfileId) -> u64 {
        self.lock().counters.get(&profile_id).map_or(0, |c| c.0)
    }

    pub fn last_match_at(&self, profile_id: ProfileId) -> Option<DateTime<Utc>> {
        self.lock().counters.get(&profile_id).map(|c| c.1)
    }

    /// Number of batches successfully stored.
    pub fn batches(&self) -> usize {
        self.lock().batches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MatchRecorder for InMemoryMatchRecorder {
    async fn batch_record_matches(
        &self,
        records: &[MatchRecord],
        counters: &[ProfileCounter],
    ) -> Result<(), PersistenceError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PersistenceError::Unavailable("injected failure".to_string()));
        }

        let mut state = self.lock();
        state.records.extend_from_slice(records);
        for counter in counters {
            let entry = state
                .counters
                .entry(counter.profile_id)
                .or_insert((0, counter.last_match_at));
            entry.0 += counter.matches;
            entry.1 = entry.1.max(counter.last_match_at);
        }
        state.batches += 1;
        Ok(())
    }
}
