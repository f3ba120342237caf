//! Directory-backed profile store with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::error::{LoadResult, LoadStatus, StoreError};
use super::watcher::handle_fs_event;
use super::{
    active_sorted, ChangeAction, ProfileChange, ProfileStore, CHANGE_CHANNEL_CAPACITY,
};
use crate::schema::{Profile, ProfileId};

/// State shared between the store and its watcher callback.
pub(super) struct Shared {
    profiles: RwLock<HashMap<ProfileId, Profile>>,
    /// Which file each profile came from, for deletions.
    paths: RwLock<HashMap<PathBuf, ProfileId>>,
    changes: broadcast::Sender<ProfileChange>,
}

impl Shared {
    /// Insert a profile loaded from `path`, replacing whatever that file held before.
    pub(super) fn upsert(&self, path: &Path, profile: Profile) -> ChangeAction {
        let id = profile.id;
        let previous_id = self
            .paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), id);

        let (stale, action) = {
            let mut profiles = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
            let stale = previous_id.filter(|old| *old != id);
            if let Some(old) = stale {
                profiles.remove(&old);
            }
            let action = ChangeAction::classify(profiles.get(&id), &profile);
            profiles.insert(id, profile);
            (stale, action)
        };

        if let Some(old) = stale {
            self.notify(old, ChangeAction::Deleted);
        }
        self.notify(id, action);
        action
    }

    /// Forget the profile that `path` held, if any.
    pub(super) fn remove_path(&self, path: &Path) -> Option<ProfileId> {
        let id = self
            .paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)?;
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.notify(id, ChangeAction::Deleted);
        Some(id)
    }

    fn notify(&self, profile_id: ProfileId, action: ChangeAction) {
        let _ = self.changes.send(ProfileChange { profile_id, action });
    }
}

/// Filesystem-backed profile store.
///
/// Scans a directory (recursively) for `*.yml`, `*.yaml` and `*.json` profile
/// documents and keeps them in memory keyed by profile id. With
/// [`watch`](Self::watch) enabled, edits on disk are picked up live and
/// announced as [`ProfileChange`]s.
pub struct FileProfileStore {
    profiles_dir: PathBuf,
    shared: Arc<Shared>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl FileProfileStore {
    /// Create a store for `profiles_dir`, creating the directory if needed.
    pub fn new(profiles_dir: PathBuf) -> Self {
        if !profiles_dir.exists() {
            if let Err(e) = fs::create_dir_all(&profiles_dir) {
                warn!(path = %profiles_dir.display(), error = %e, "failed to create profiles directory");
            }
        }
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            profiles_dir,
            shared: Arc::new(Shared {
                profiles: RwLock::new(HashMap::new()),
                paths: RwLock::new(HashMap::new()),
                changes,
            }),
            _watcher: None,
        }
    }

    /// Create a store and load everything currently in the directory.
    pub fn open(profiles_dir: PathBuf) -> Result<(Self, Vec<LoadResult>), StoreError> {
        let store = Self::new(profiles_dir);
        let results = store.load_all()?;
        Ok((store, results))
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    /// Recursively scan the directory and load every profile document.
    ///
    /// Dotfiles and unsupported extensions are skipped. Parse errors are
    /// reported per file and do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>, StoreError> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.profiles_dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<(), StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let path = entry?.path();

            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_profile_file(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML or JSON file".to_string(),
                    },
                });
                continue;
            }

            match load_file(&path) {
                Ok(profile) => {
                    let profile_id = profile.id;
                    info!(profile_id, name = %profile.name, path = %path.display(), "loaded profile");
                    self.shared.upsert(&path, profile);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { profile_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load profile file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Start a filesystem watcher.
    ///
    /// Created or modified files are re-parsed and upserted; deleted files
    /// drop their profile. A file that fails to parse keeps the previous
    /// version of its profile.
    pub fn watch(&mut self) -> Result<(), StoreError> {
        let shared = Arc::clone(&self.shared);

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &shared),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            })?;

        watcher.watch(&self.profiles_dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.profiles_dir.display(), "watching profiles directory for changes");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub(super) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get_active_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let profiles = self
            .shared
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(active_sorted(profiles.values()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProfileChange> {
        self.shared.changes.subscribe()
    }
}

/// Parse a single profile document; the format follows the extension.
pub(super) fn load_file(path: &Path) -> Result<Profile, StoreError> {
    let contents = fs::read_to_string(path)?;
    let profile: Profile = if has_extension(path, &["json"]) {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    if profile.name.trim().is_empty() {
        return Err(StoreError::Invalid(format!(
            "profile {} has an empty name",
            profile.id
        )));
    }
    Ok(profile)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

pub(super) fn is_profile_file(path: &Path) -> bool {
    has_extension(path, &["yml", "yaml", "json"])
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.contains(&e))
}
