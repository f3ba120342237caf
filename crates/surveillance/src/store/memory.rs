//! In-process profile store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    active_sorted, ChangeAction, ProfileChange, ProfileStore, StoreError, CHANGE_CHANNEL_CAPACITY,
};
use crate::schema::{Profile, ProfileId};

/// Profiles held in memory; every mutation emits a [`ProfileChange`].
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<ProfileId, Profile>>,
    changes: broadcast::Sender<ProfileChange>,
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            profiles: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        {
            let mut map = store.profiles.write().unwrap_or_else(PoisonError::into_inner);
            for profile in profiles {
                map.insert(profile.id, profile);
            }
        }
        store
    }

    /// Insert or replace a profile.
    ///
    /// Emits `Enabled`/`Disabled` instead of `Updated` when `is_active` flips.
    pub fn upsert(&self, profile: Profile) {
        let id = profile.id;
        let action = {
            let mut profiles = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
            let action = ChangeAction::classify(profiles.get(&id), &profile);
            profiles.insert(id, profile);
            action
        };
        self.notify(id, action);
    }

    pub fn remove(&self, id: ProfileId) -> Option<Profile> {
        let removed = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            self.notify(id, ChangeAction::Deleted);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.profiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, profile_id: ProfileId, action: ChangeAction) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(ProfileChange { profile_id, action });
        debug!(profile_id, ?action, "profile changed");
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_active_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let map = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
        Ok(active_sorted(map.values()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProfileChange> {
        self.changes.subscribe()
    }
}
