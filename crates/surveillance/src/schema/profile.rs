//! Surveillance profile as handed over by the profile store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FilterTree;

/// Profile identifier assigned by the external profile repository.
pub type ProfileId = i64;

/// A user-defined surveillance profile.
///
/// The matching engine treats profiles as read-only input; `match_count` and
/// `last_match_at` are maintained by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub filter_tree: FilterTree,
    /// Opaque delivery settings, interpreted by the notification dispatcher.
    #[serde(default)]
    pub notification_config: Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub match_count: u64,
    #[serde(default)]
    pub last_match_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Profile {
    /// Active profile with no owner or notification settings.
    pub fn new(id: ProfileId, name: impl Into<String>, filter_tree: FilterTree) -> Self {
        Self {
            id,
            name: name.into(),
            user_id: None,
            filter_tree,
            notification_config: Value::Null,
            is_active: true,
            match_count: 0,
            last_match_at: None,
            created_at: None,
            updated_at: None,
        }
    }
}
