//! Profile stores: the source of surveillance profiles and change notifications.
//!
//! The matching engine only reads profiles. Stores publish a
//! [`ProfileChange`] on a broadcast channel whenever a profile is created,
//! updated or deleted; the coordinator listens and rebuilds its index.

mod error;
mod file;
mod memory;
mod watcher;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::schema::{Profile, ProfileId};

pub use self::error::{LoadResult, LoadStatus, StoreError};
pub use self::file::FileProfileStore;
pub use self::memory::InMemoryProfileStore;

/// Capacity of each store's change broadcast channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    /// An existing profile's `is_active` flipped to true.
    Enabled,
    /// An existing profile's `is_active` flipped to false.
    Disabled,
}

impl ChangeAction {
    /// Classify replacing `previous` with `current`.
    pub fn classify(previous: Option<&Profile>, current: &Profile) -> ChangeAction {
        match previous {
            None => ChangeAction::Created,
            Some(p) if !p.is_active && current.is_active => ChangeAction::Enabled,
            Some(p) if p.is_active && !current.is_active => ChangeAction::Disabled,
            Some(_) => ChangeAction::Updated,
        }
    }
}

/// Notification that a profile's definition changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChange {
    pub profile_id: ProfileId,
    pub action: ChangeAction,
}

/// Read access to surveillance profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Every profile with `is_active == true`, ordered by id.
    async fn get_active_profiles(&self) -> Result<Vec<Profile>, StoreError>;

    /// Receive future change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ProfileChange>;
}

/// Active profiles from an iterator, sorted by id.
pub(crate) fn active_sorted<'a>(profiles: impl Iterator<Item = &'a Profile>) -> Vec<Profile> {
    let mut active: Vec<Profile> = profiles.filter(|p| p.is_active).cloned().collect();
    active.sort_by_key(|p| p.id);
    active
}
