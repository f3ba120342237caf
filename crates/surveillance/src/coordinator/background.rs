//! Periodic timers and the profile change listener.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::MatchingCoordinator;
use crate::store::ProfileChange;

pub(super) fn spawn_all(coordinator: MatchingCoordinator) -> Vec<JoinHandle<()>> {
    // Subscribe before spawning so nothing sent in between is missed.
    let shutdown = coordinator.inner.shutdown.subscribe();
    let changes = coordinator.inner.store.subscribe();
    vec![
        tokio::spawn(flush_loop(coordinator.clone(), shutdown.clone())),
        tokio::spawn(cleanup_loop(coordinator.clone(), shutdown.clone())),
        tokio::spawn(change_listener(coordinator, shutdown, changes)),
    ]
}

async fn flush_loop(coordinator: MatchingCoordinator, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(coordinator.inner.config.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Failures are logged by the flush itself; records are retained.
                let _ = coordinator.flush().await;
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("flush loop stopped");
}

async fn cleanup_loop(coordinator: MatchingCoordinator, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(coordinator.inner.config.cleanup_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                coordinator.cleanup();
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("cache cleanup loop stopped");
}

/// Rebuild the index whenever the profile store reports a change.
///
/// Changes that arrive together are coalesced into one reload.
async fn change_listener(
    coordinator: MatchingCoordinator,
    mut shutdown: watch::Receiver<bool>,
    mut changes: broadcast::Receiver<ProfileChange>,
) {
    loop {
        let first = tokio::select! {
            received = changes.recv() => received,
            _ = shutdown.changed() => break,
        };

        match first {
            Ok(change) => {
                debug!(profile_id = change.profile_id, action = ?change.action, "profile change received");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "profile change listener lagged, reloading");
            }
            Err(RecvError::Closed) => {
                info!("profile store closed its change channel");
                break;
            }
        }

        let mut coalesced = 0usize;
        while changes.try_recv().is_ok() {
            coalesced += 1;
        }

        match coordinator.reload().await {
            Ok(report) => info!(
                generation = report.generation,
                profiles = report.compiled,
                coalesced,
                "reloaded profiles after change"
            ),
            Err(e) => warn!(error = %e, "reload after profile change failed"),
        }
    }
    debug!("profile change listener stopped");
}
