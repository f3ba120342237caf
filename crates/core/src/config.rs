use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub surveillance: SurveillanceConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `KILLWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("KILLWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            surveillance: SurveillanceConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let s = &self.surveillance;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  surveillance: workers={}, timeout={}ms, cache_ttl={}s, max_in_flight={}",
            s.resolved_worker_threads(),
            s.match_timeout_ms,
            s.cache_ttl_secs,
            s.max_in_flight
        );
        tracing::info!(
            "  batching:     flush={}s, cleanup={}s, pending_capacity={}",
            s.flush_interval_secs,
            s.cleanup_interval_secs,
            s.pending_capacity
        );
        tracing::info!("  storage:      profiles_dir={}", self.storage.profiles_dir.display());
        tracing::info!("  storage:      matches_path={}", self.storage.matches_path.display());
    }
}

// ── Surveillance engine ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveillanceConfig {
    /// Evaluator pool size (0 means use available parallelism).
    pub worker_threads: usize,
    /// Budget for a single `match_killmail` call.
    pub match_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub flush_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Upper bound on buffered match records awaiting flush.
    pub pending_capacity: usize,
    /// Upper bound on undelivered match notifications.
    pub notify_capacity: usize,
    /// Evaluations submitted to the pool but not yet finished. Killmails
    /// arriving while the limit is reached get an empty result.
    pub max_in_flight: usize,
}

impl Default for SurveillanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            match_timeout_ms: 500,
            cache_ttl_secs: 300,
            flush_interval_secs: 5,
            cleanup_interval_secs: 60,
            pending_capacity: 10_000,
            notify_capacity: 1024,
            max_in_flight: 256,
        }
    }
}

impl SurveillanceConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            worker_threads: profiled_env_usize(p, "SURVEILLANCE_WORKERS", d.worker_threads),
            match_timeout_ms: profiled_env_u64(p, "SURVEILLANCE_MATCH_TIMEOUT_MS", d.match_timeout_ms),
            cache_ttl_secs: profiled_env_u64(p, "SURVEILLANCE_CACHE_TTL_SECS", d.cache_ttl_secs),
            flush_interval_secs: profiled_env_u64(p, "SURVEILLANCE_FLUSH_INTERVAL_SECS", d.flush_interval_secs),
            cleanup_interval_secs: profiled_env_u64(
                p,
                "SURVEILLANCE_CLEANUP_INTERVAL_SECS",
                d.cleanup_interval_secs,
            ),
            pending_capacity: profiled_env_usize(p, "SURVEILLANCE_PENDING_CAPACITY", d.pending_capacity),
            notify_capacity: profiled_env_usize(p, "SURVEILLANCE_NOTIFY_CAPACITY", d.notify_capacity),
            max_in_flight: profiled_env_usize(p, "SURVEILLANCE_MAX_IN_FLIGHT", d.max_in_flight),
        }
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    pub fn match_timeout(&self) -> Duration {
        Duration::from_millis(self.match_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of profile documents for the file-backed profile store.
    pub profiles_dir: PathBuf,
    /// JSON-lines file receiving batched match records.
    pub matches_path: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            profiles_dir: PathBuf::from(profiled_env_or(p, "PROFILES_DIR", "data/profiles")),
            matches_path: PathBuf::from(profiled_env_or(p, "MATCHES_PATH", "data/matches.jsonl")),
        }
    }
}
