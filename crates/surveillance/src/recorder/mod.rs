//! Match persistence: records, per-profile counters and recorder backends.
//!
//! The engine buffers matches and hands them to a [`MatchRecorder`] in
//! batches. Delivery is at-least-once: a failed batch is retried on the next
//! flush, so backends should tolerate duplicates.

mod jsonl;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use killwatch_core::{Killmail, KillmailId};
use serde::{Deserialize, Serialize};

use crate::schema::ProfileId;

pub use self::jsonl::{JournalEntry, JsonlMatchRecorder};
pub use self::memory::InMemoryMatchRecorder;

/// One profile matching one killmail.
///
/// Carries the whole normalized killmail, shared with the notification for
/// the same match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub profile_id: ProfileId,
    pub killmail: Arc<Killmail>,
    pub matched_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn killmail_id(&self) -> KillmailId {
        self.killmail.killmail_id
    }
}

/// Increment to apply to a profile's `match_count` / `last_match_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCounter {
    pub profile_id: ProfileId,
    pub matches: u64,
    pub last_match_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("recorder unavailable: {0}")]
    Unavailable(String),
}

/// Backend that durably stores match records and counter increments.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    async fn batch_record_matches(
        &self,
        records: &[MatchRecord],
        counters: &[ProfileCounter],
    ) -> Result<(), PersistenceError>;
}

/// Fold records into one counter increment per profile, ordered by id.
pub fn aggregate_counters(records: &[MatchRecord]) -> Vec<ProfileCounter> {
    let mut by_profile: BTreeMap<ProfileId, ProfileCounter> = BTreeMap::new();
    for record in records {
        by_profile
            .entry(record.profile_id)
            .and_modify(|c| {
                c.matches += 1;
                c.last_match_at = c.last_match_at.max(record.matched_at);
            })
            .or_insert_with(|| ProfileCounter {
                profile_id: record.profile_id,
                matches: 1,
                last_match_at: record.matched_at,
            });
    }
    by_profile.into_values().collect()
}

/// Persist a batch of records together with their aggregated counters.
pub async fn record_matches_batch(
    recorder: &dyn MatchRecorder,
    records: &[MatchRecord],
) -> Result<(), PersistenceError> {
    if records.is_empty() {
        return Ok(());
    }
    let counters = aggregate_counters(records);
    recorder.batch_record_matches(records, &counters).await
}
