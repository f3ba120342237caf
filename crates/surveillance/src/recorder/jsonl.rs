//! Append-only JSON-lines recorder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{MatchRecord, MatchRecorder, PersistenceError, ProfileCounter};

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Match(MatchRecord),
    Counter(ProfileCounter),
}

/// Appends match records and counter increments to a JSON-lines file.
///
/// Each batch is written with a single `write_all`, records first and
/// counters after, so a reader never sees counters for unwritten records.
pub struct JsonlMatchRecorder {
    path: PathBuf,
    /// Serializes appends from concurrent flushes.
    write_lock: Mutex<()>,
}

impl JsonlMatchRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the journal back; blank lines are ignored.
    pub async fn read_entries(&self) -> Result<Vec<JournalEntry>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(PersistenceError::from))
            .collect()
    }
}

#[async_trait]
impl MatchRecorder for JsonlMatchRecorder {
    async fn batch_record_matches(
        &self,
        records: &[MatchRecord],
        counters: &[ProfileCounter],
    ) -> Result<(), PersistenceError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, &JournalEntry::Match(record.clone()))?;
            buf.push(b'\n');
        }
        for counter in counters {
            serde_json::to_writer(&mut buf, &JournalEntry::Counter(counter.clone()))?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        debug!(
            path = %self.path.display(),
            records = records.len(),
            counters = counters.len(),
            "appended match batch"
        );
        Ok(())
    }
}
