//! Matching coordinator: the per-killmail entry point and engine lifecycle.
//!
//! Per killmail the coordinator validates, fingerprints, consults the cache,
//! narrows candidates through the index and hands evaluation to the worker
//! pool. Results are cached, queued for batch persistence and emitted as
//! [`MatchNotification`]s. Evaluation always runs to completion on the pool,
//! even when the caller's time budget runs out first.

mod background;
mod pending;


use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use killwatch_core::{Killmail, SurveillanceConfig};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::compiler::CompiledProfile;
use crate::error::{Result, SurveillanceError};
use crate::evaluator::{generate_cache_key, validate_killmail, EvaluatorStats, MatchEvaluator};
use crate::index::{Fingerprint, IndexManager, IndexSnapshot, IndexStats, RebuildReport};
use crate::recorder::{MatchRecord, MatchRecorder, PersistenceError};
use crate::schema::ProfileId;
use crate::store::ProfileStore;

use self::pending::PendingBatch;

/// Lifecycle phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No profile set has been loaded yet; every call returns no matches.
    Initializing,
    Ready,
    /// A rebuild is in progress; matching continues on the previous snapshot.
    Reloading,
}

/// A profile matched a killmail; consumed by the notification dispatcher.
#[derive(Debug, Clone)]
pub struct MatchNotification {
    pub profile_id: ProfileId,
    pub killmail: Arc<Killmail>,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub phase: Phase,
    pub index: IndexStats,
    pub evaluator: EvaluatorStats,
    pub pending_records: usize,
}

pub(crate) struct Inner {
    config: SurveillanceConfig,
    store: Arc<dyn ProfileStore>,
    recorder: Arc<dyn MatchRecorder>,
    index: IndexManager,
    evaluator: MatchEvaluator,
    phase: RwLock<Phase>,
    reload_lock: tokio::sync::Mutex<()>,
    pending: PendingBatch,
    notifications: mpsc::Sender<MatchNotification>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to the matching engine; cheap to clone.
#[derive(Clone)]
pub struct MatchingCoordinator {
    inner: Arc<Inner>,
}

impl MatchingCoordinator {
    /// Build a coordinator and the receiving end of its notification channel.
    ///
    /// No profiles are loaded until [`initialize`](Self::initialize) succeeds.
    pub fn new(
        config: SurveillanceConfig,
        store: Arc<dyn ProfileStore>,
        recorder: Arc<dyn MatchRecorder>,
    ) -> Result<(Self, mpsc::Receiver<MatchNotification>)> {
        let evaluator = MatchEvaluator::new(config.resolved_worker_threads(), config.max_in_flight)?;
        let (notifications, notification_rx) = mpsc::channel(config.notify_capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        let inner = Inner {
            pending: PendingBatch::new(config.pending_capacity),
            config,
            store,
            recorder,
            index: IndexManager::new(),
            evaluator,
            phase: RwLock::new(Phase::Initializing),
            reload_lock: tokio::sync::Mutex::new(()),
            notifications,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        };
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            notification_rx,
        ))
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: Phase) {
        *self.inner.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load active profiles and build the first index.
    pub async fn initialize(&self) -> Result<RebuildReport> {
        let report = self.reload().await?;
        info!(
            generation = report.generation,
            profiles = report.compiled,
            workers = self.inner.evaluator.worker_threads(),
            "matching coordinator ready"
        );
        Ok(report)
    }

    /// Re-read active profiles and swap in a fresh index.
    ///
    /// Reloads are serialized. Calls to [`match_killmail`](Self::match_killmail)
    /// keep using the previous snapshot until the swap. On failure the
    /// previous index stays in place.
    pub async fn reload(&self) -> Result<RebuildReport> {
        let _guard = self.inner.reload_lock.lock().await;

        let previous = self.phase();
        if previous == Phase::Ready {
            self.set_phase(Phase::Reloading);
        }

        let result = self.rebuild_from_store().await;
        match &result {
            Ok(_) => self.set_phase(Phase::Ready),
            Err(e) => {
                warn!(error = %e, "profile reload failed, keeping previous index");
                self.set_phase(previous);
            }
        }
        result
    }

    async fn rebuild_from_store(&self) -> Result<RebuildReport> {
        let profiles = self.inner.store.get_active_profiles().await?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.index.rebuild(&profiles))
            .await
            .map_err(|e| SurveillanceError::Rebuild(e.to_string()))
    }

    /// Persist every pending match record.
    pub async fn flush(&self) -> std::result::Result<usize, PersistenceError> {
        self.inner.pending.flush(self.inner.recorder.as_ref()).await
    }

    /// Sweep expired cache entries.
    pub fn cleanup(&self) -> usize {
        let removed = self.inner.index.cleanup_expired();
        if removed > 0 {
            debug!(removed, "swept expired match cache entries");
        }
        removed
    }

    /// Stop background tasks and perform a final flush.
    pub async fn shutdown(&self) -> std::result::Result<usize, PersistenceError> {
        let _ = self.inner.shutdown.send(true);
        let tasks: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
        let flushed = self.flush().await?;
        info!(flushed, "matching coordinator shut down");
        Ok(flushed)
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            phase: self.phase(),
            index: self.inner.index.stats(),
            evaluator: self.inner.evaluator.stats(),
            pending_records: self.inner.pending.queued(),
        }
    }

    // ── Matching ────────────────────────────────────────────────────

    /// Match one raw killmail against all active profiles.
    ///
    /// Never fails: malformed input, calls before the first load, calls that
    /// exceed the time budget and calls refused by a full evaluation backlog
    /// all return an empty list.
    pub async fn match_killmail(&self, raw: &Value) -> Vec<ProfileId> {
        if self.phase() == Phase::Initializing {
            debug!("profiles not loaded yet, skipping killmail");
            return Vec::new();
        }

        let km = match validate_killmail(raw) {
            Ok(km) => km,
            Err(e) => {
                let killmail_id = raw.get("killmail_id").and_then(Value::as_i64);
                warn!(?killmail_id, error = %e, "rejected malformed killmail");
                return Vec::new();
            }
        };
        self.match_normalized(km).await
    }

    /// Match an already validated killmail.
    pub async fn match_normalized(&self, km: Killmail) -> Vec<ProfileId> {
        if self.phase() == Phase::Initializing {
            return Vec::new();
        }

        let fingerprint = generate_cache_key(&km);
        if let Some(hit) = self.inner.index.cache_get(&fingerprint) {
            debug!(killmail_id = km.killmail_id, matches = hit.len(), "match cache hit");
            return hit.as_ref().clone();
        }

        let killmail_id = km.killmail_id;
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let km = Arc::new(km);

        let accepted = self.inner.evaluator.try_spawn(move || {
            // Loaded when the job starts, so a queued job sees the latest reload.
            let snapshot = inner.index.snapshot();
            let matches = inner.evaluate(&snapshot, &km, fingerprint);
            // The caller may have given up; the side effects above still happened.
            let _ = tx.send(matches);
        });
        if !accepted {
            warn!(
                killmail_id,
                max_in_flight = self.inner.config.max_in_flight,
                "evaluation backlog full, skipping killmail"
            );
            return Vec::new();
        }

        match tokio::time::timeout(self.inner.config.match_timeout(), rx).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(_)) => {
                warn!(killmail_id, "evaluation job ended without a result");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    killmail_id,
                    timeout_ms = self.inner.config.match_timeout_ms,
                    "match timed out, evaluation continues in background"
                );
                Vec::new()
            }
        }
    }

    /// Start the flush timer, the cache sweeper and the profile change listener.
    pub fn spawn_background(&self) {
        let handles = background::spawn_all(self.clone());
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }

    pub(crate) fn inner(&self) -> &Arc<Inner> {
        &self.inner
    }
}

impl Inner {
    /// Runs on the evaluation pool: evaluate, then cache, queue and notify.
    fn evaluate(&self, snapshot: &IndexSnapshot, km: &Arc<Killmail>, fingerprint: Fingerprint) -> Vec<ProfileId> {
        let candidate_ids = snapshot.find_candidates(km);
        let candidates: Vec<&CompiledProfile> = candidate_ids
            .iter()
            .filter_map(|id| snapshot.profile(*id))
            .collect();

        let matches = self.evaluator.evaluate_candidates_parallel(&candidates, km);

        let matched_at = Utc::now();
        for &profile_id in &matches {
            self.pending.push(MatchRecord {
                profile_id,
                killmail: Arc::clone(km),
                matched_at,
            });
            let notification = MatchNotification {
                profile_id,
                killmail: Arc::clone(km),
                matched_at,
            };
            if let Err(mpsc::error::TrySendError::Full(n)) = self.notifications.try_send(notification) {
                warn!(
                    profile_id = n.profile_id,
                    killmail_id = km.killmail_id,
                    "notification channel full, dropping notification"
                );
            }
        }

        // Cached last, so a cache hit implies the records are already queued.
        self.index.cache_put(
            fingerprint,
            Arc::new(matches.clone()),
            snapshot.generation(),
            self.config.cache_ttl(),
        );

        if !matches.is_empty() {
            info!(
                killmail_id = km.killmail_id,
                candidates = candidate_ids.len(),
                matches = matches.len(),
                "killmail matched profiles"
            );
        }
        matches
    }
}
