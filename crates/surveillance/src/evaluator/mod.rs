//! Match evaluator: killmail intake, fingerprints and parallel predicate runs.
//!
//! Predicates run on a dedicated, bounded `rayon` pool so CPU-bound matching
//! never occupies the async runtime. A predicate that returns an
//! [`EvaluationError`](crate::compiler::EvaluationError) or panics is treated
//! as non-matching for that killmail; the other candidates are unaffected.

mod fingerprint;
mod validate;

#[cfg(test)]
mod tests;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use killwatch_core::Killmail;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::compiler::{CompiledProfile, EvaluationError};
use crate::schema::ProfileId;

pub use self::fingerprint::generate_cache_key;
pub use self::validate::{validate_killmail, ValidationError};

/// Running totals since the evaluator was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    pub killmails_evaluated: u64,
    pub predicates_run: u64,
    pub matches: u64,
    pub faults: u64,
    /// Jobs refused because `max_in_flight` evaluations were already pending.
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    killmails_evaluated: AtomicU64,
    predicates_run: AtomicU64,
    matches: AtomicU64,
    faults: AtomicU64,
    rejected: AtomicU64,
}

/// Runs candidate predicates against a killmail on a bounded worker pool.
pub struct MatchEvaluator {
    pool: rayon::ThreadPool,
    /// One permit per submitted job that has not finished yet.
    in_flight: Arc<Semaphore>,
    max_in_flight: usize,
    counters: Counters,
}

impl MatchEvaluator {
    /// Build an evaluator with `worker_threads` pool threads and room for
    /// `max_in_flight` outstanding jobs (both at least one).
    pub fn new(worker_threads: usize, max_in_flight: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|i| format!("surveillance-eval-{i}"))
            // Without a handler rayon aborts the process on a panicking job.
            .panic_handler(|payload| {
                error!(panic = %panic_message(&*payload), "evaluation job panicked");
            })
            .build()?;
        let max_in_flight = max_in_flight.max(1);
        Ok(Self {
            pool,
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            counters: Counters::default(),
        })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate every candidate against `km`, returning the matching ids in
    /// candidate order. Blocks until all candidates have been evaluated.
    pub fn evaluate_candidates_parallel(
        &self,
        candidates: &[&CompiledProfile],
        km: &Killmail,
    ) -> Vec<ProfileId> {
        let matched: Vec<ProfileId> = self.pool.install(|| {
            candidates
                .par_iter()
                .filter_map(|profile| self.run_one(profile, km).then_some(profile.id))
                .collect()
        });

        self.counters.killmails_evaluated.fetch_add(1, Ordering::Relaxed);
        self.counters
            .matches
            .fetch_add(matched.len() as u64, Ordering::Relaxed);
        debug!(
            killmail_id = km.killmail_id,
            candidates = candidates.len(),
            matches = matched.len(),
            "evaluated candidates"
        );
        matched
    }

    /// Run a job on the evaluation pool without waiting for it.
    ///
    /// Ungated: callers on the matching path go through [`try_spawn`](Self::try_spawn).
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    /// Submit a job unless `max_in_flight` jobs are already queued or running.
    ///
    /// Returns `false` without running `job` when the limit is reached.
    pub fn try_spawn<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let permit = match Arc::clone(&self.in_flight).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        self.spawn(move || {
            let _permit = permit;
            job();
        });
        true
    }

    /// Jobs submitted through [`try_spawn`](Self::try_spawn) that have not finished.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.in_flight.available_permits()
    }

    pub fn stats(&self) -> EvaluatorStats {
        EvaluatorStats {
            killmails_evaluated: self.counters.killmails_evaluated.load(Ordering::Relaxed),
            predicates_run: self.counters.predicates_run.load(Ordering::Relaxed),
            matches: self.counters.matches.load(Ordering::Relaxed),
            faults: self.counters.faults.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    fn run_one(&self, profile: &CompiledProfile, km: &Killmail) -> bool {
        self.counters.predicates_run.fetch_add(1, Ordering::Relaxed);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| profile.matches(km)))
            .unwrap_or_else(|payload| Err(EvaluationError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok(matched) => matched,
            Err(e) => {
                self.counters.faults.fetch_add(1, Ordering::Relaxed);
                warn!(
                    profile_id = profile.id,
                    killmail_id = km.killmail_id,
                    error = %e,
                    "predicate fault, treating profile as non-matching"
                );
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
