use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream killmail identifier.
pub type KillmailId = i64;

/// A normalized killmail as produced by the ingestion/enrichment pipeline.
///
/// Only `killmail_id`, `killmail_time`, `solar_system_id` and `victim` are
/// mandatory; everything else defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Killmail {
    pub killmail_id: KillmailId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killmail_hash: Option<String>,
    pub killmail_time: DateTime<Utc>,
    pub solar_system_id: i64,
    pub victim: Victim,
    #[serde(default)]
    pub attackers: Vec<Attacker>,
    /// Total destroyed + dropped ISK value.
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub ship_value: Option<f64>,
    #[serde(default)]
    pub fitted_value: Option<f64>,
    /// Tags derived from fitted modules (e.g. "cloak", "cyno").
    #[serde(default)]
    pub module_tags: Vec<String>,
    #[serde(default)]
    pub is_npc: bool,
    #[serde(default)]
    pub is_solo: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Victim {
    #[serde(default)]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub corporation_id: Option<i64>,
    #[serde(default)]
    pub alliance_id: Option<i64>,
    #[serde(default)]
    pub ship_type_id: Option<i64>,
    #[serde(default)]
    pub ship_group_id: Option<i64>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub corporation_name: Option<String>,
    #[serde(default)]
    pub alliance_name: Option<String>,
    #[serde(default)]
    pub ship_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attacker {
    #[serde(default)]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub corporation_id: Option<i64>,
    #[serde(default)]
    pub alliance_id: Option<i64>,
    #[serde(default)]
    pub ship_type_id: Option<i64>,
    #[serde(default)]
    pub final_blow: bool,
}

impl Killmail {
    pub fn attacker_count(&self) -> usize {
        self.attackers.len()
    }

    /// Collect a per-attacker id, skipping attackers without one (NPCs, structures).
    pub fn attacker_ids(&self, pick: impl Fn(&Attacker) -> Option<i64>) -> Vec<i64> {
        self.attackers.iter().filter_map(pick).collect()
    }

    /// Victim id followed by every attacker id for the same attribute.
    pub fn involved_ids(
        &self,
        victim: Option<i64>,
        pick: impl Fn(&Attacker) -> Option<i64>,
    ) -> Vec<i64> {
        let mut ids: Vec<i64> = victim.into_iter().collect();
        ids.extend(self.attackers.iter().filter_map(pick));
        ids
    }
}
