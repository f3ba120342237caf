//! surveillance-worker: runs the matching engine over a stream of killmails.
//!
//! Reads normalized killmails as JSON lines (stdin or `--input`), prints one
//! `{"killmail_id", "matches"}` line per killmail, appends match records to a
//! JSON-lines journal and logs match notifications.
//!
//! With `--check` it validates every profile in the profile directory and exits.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use killwatch_core::config::load_dotenv;
use killwatch_core::Config;
use killwatch_surveillance::compiler::validate_filter_tree;
use killwatch_surveillance::recorder::JsonlMatchRecorder;
use killwatch_surveillance::store::{FileProfileStore, LoadStatus, ProfileStore};
use killwatch_surveillance::{MatchNotification, MatchingCoordinator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Killmail surveillance worker: matches killmails against user profiles.
#[derive(Parser, Debug)]
#[command(name = "surveillance-worker", version, about)]
struct Cli {
    /// Directory of YAML/JSON profile documents.
    #[arg(long, env = "PROFILES_DIR")]
    profiles_dir: Option<PathBuf>,

    /// JSON-lines journal receiving match records.
    #[arg(long, env = "MATCHES_PATH")]
    matches_path: Option<PathBuf>,

    /// Killmail input file (JSON lines); reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Evaluator pool size (0 = available parallelism).
    #[arg(long, env = "SURVEILLANCE_WORKERS")]
    workers: Option<usize>,

    /// Per-killmail matching budget in milliseconds.
    #[arg(long, env = "SURVEILLANCE_MATCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Do not watch the profile directory for changes.
    #[arg(long)]
    no_watch: bool,

    /// Validate all profiles and exit.
    #[arg(long)]
    check: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.profiles_dir.clone() {
        config.storage.profiles_dir = dir;
    }
    if let Some(path) = cli.matches_path.clone() {
        config.storage.matches_path = path;
    }
    if let Some(workers) = cli.workers {
        config.surveillance.worker_threads = workers;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.surveillance.match_timeout_ms = timeout_ms;
    }
    config.log_summary();

    let (mut store, results) = FileProfileStore::open(config.storage.profiles_dir.clone())?;
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();
    info!(files = results.len(), failed, "profile directory scanned");

    if cli.check {
        return check_profiles(&store, failed).await;
    }

    if !cli.no_watch {
        store.watch()?;
    }
    let store: Arc<dyn ProfileStore> = Arc::new(store);
    let recorder = Arc::new(JsonlMatchRecorder::new(config.storage.matches_path.clone()));

    let (coordinator, notifications) =
        MatchingCoordinator::new(config.surveillance.clone(), store, recorder)?;
    coordinator.initialize().await?;
    coordinator.spawn_background();
    let dispatcher = tokio::spawn(log_notifications(notifications));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let processed = tokio::select! {
        n = process_lines(&coordinator, reader) => n?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            0
        }
    };

    if let Err(e) = coordinator.shutdown().await {
        warn!(error = %e, "final flush failed, unflushed records are lost");
    }
    let stats = coordinator.stats();
    drop(coordinator);
    let _ = dispatcher.await;

    info!(processed, stats = %serde_json::to_string(&stats)?, "surveillance-worker exited cleanly");
    Ok(())
}

async fn process_lines(
    coordinator: &MatchingCoordinator,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
) -> anyhow::Result<usize> {
    let mut lines = reader.lines();
    let mut processed = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let raw: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "skipping input line that is not JSON");
                continue;
            }
        };

        let matches = coordinator.match_killmail(&raw).await;
        println!(
            "{}",
            json!({ "killmail_id": raw.get("killmail_id"), "matches": matches })
        );
        processed += 1;
    }
    Ok(processed)
}

/// Stand-in for the notification dispatcher: log every match.
async fn log_notifications(mut rx: mpsc::Receiver<MatchNotification>) {
    while let Some(n) = rx.recv().await {
        info!(
            profile_id = n.profile_id,
            killmail_id = n.killmail.killmail_id,
            matched_at = %n.matched_at,
            "match notification"
        );
    }
}

async fn check_profiles(store: &FileProfileStore, failed_files: usize) -> anyhow::Result<()> {
    let mut invalid = 0usize;
    for profile in store.get_active_profiles().await? {
        let report = validate_filter_tree(&profile.filter_tree);
        if !report.valid {
            invalid += 1;
        }
        println!(
            "{}",
            json!({ "profile_id": profile.id, "name": profile.name, "report": report })
        );
    }

    if invalid > 0 || failed_files > 0 {
        anyhow::bail!("{invalid} invalid profile(s), {failed_files} unreadable file(s)");
    }
    info!("all profiles valid");
    Ok(())
}
