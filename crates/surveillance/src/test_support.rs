//! Shared fixtures for unit tests.

use killwatch_core::{Attacker, Killmail, Victim};
use serde_json::Value;

use crate::schema::{FilterTree, Profile, ProfileId};

/// A small fleet kill: one victim, two attackers.
pub(crate) fn killmail(id: i64) -> Killmail {
    Killmail {
        killmail_id: id,
        killmail_hash: Some(format!("hash{id}")),
        killmail_time: "2024-05-01T12:00:00Z".parse().unwrap(),
        solar_system_id: 30000142,
        victim: Victim {
            character_id: Some(90000001),
            corporation_id: Some(98000001),
            ship_type_id: Some(670),
            ship_group_id: Some(29),
            ..Victim::default()
        },
        attackers: vec![
            Attacker {
                character_id: Some(90000002),
                corporation_id: Some(98000002),
                final_blow: true,
                ..Attacker::default()
            },
            Attacker {
                character_id: Some(90000003),
                corporation_id: Some(98000002),
                ..Attacker::default()
            },
        ],
        total_value: Some(150_000_000.0),
        ship_value: Some(10_000.0),
        fitted_value: None,
        module_tags: vec!["cyno".into()],
        is_npc: false,
        is_solo: false,
    }
}

pub(crate) fn profile(id: ProfileId, tree: FilterTree) -> Profile {
    Profile::new(id, format!("profile {id}"), tree)
}

pub(crate) fn leaf(field: &str, op: &str, value: Value) -> FilterTree {
    FilterTree::leaf(field, op, value)
}
