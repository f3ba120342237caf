//! Whitelisted killmail fields a filter leaf may reference.

use std::fmt;

use chrono::{DateTime, Utc};
use killwatch_core::Killmail;

/// A killmail attribute addressable from a filter tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    KillmailId,
    KillmailTime,
    SolarSystemId,
    VictimCharacterId,
    VictimCorporationId,
    VictimAllianceId,
    VictimShipTypeId,
    VictimShipGroupId,
    AttackerCharacterId,
    AttackerCorporationId,
    AttackerAllianceId,
    AttackerShipTypeId,
    CharacterId,
    CorporationId,
    AllianceId,
    AttackerCount,
    TotalValue,
    ShipValue,
    FittedValue,
    VictimCharacterName,
    VictimCorporationName,
    VictimAllianceName,
    VictimShipName,
    ModuleTags,
    IsSolo,
    IsNpc,
}

/// Every whitelisted field, in declaration order.
pub const ALL_FIELDS: &[Field] = &[
    Field::KillmailId,
    Field::KillmailTime,
    Field::SolarSystemId,
    Field::VictimCharacterId,
    Field::VictimCorporationId,
    Field::VictimAllianceId,
    Field::VictimShipTypeId,
    Field::VictimShipGroupId,
    Field::AttackerCharacterId,
    Field::AttackerCorporationId,
    Field::AttackerAllianceId,
    Field::AttackerShipTypeId,
    Field::CharacterId,
    Field::CorporationId,
    Field::AllianceId,
    Field::AttackerCount,
    Field::TotalValue,
    Field::ShipValue,
    Field::FittedValue,
    Field::VictimCharacterName,
    Field::VictimCorporationName,
    Field::VictimAllianceName,
    Field::VictimShipName,
    Field::ModuleTags,
    Field::IsSolo,
    Field::IsNpc,
];

/// Wire names of every whitelisted field.
pub const FIELD_NAMES: &[&str] = &[
    "killmail_id",
    "killmail_time",
    "solar_system_id",
    "victim_character_id",
    "victim_corporation_id",
    "victim_alliance_id",
    "victim_ship_type_id",
    "victim_ship_group_id",
    "attacker_character_id",
    "attacker_corporation_id",
    "attacker_alliance_id",
    "attacker_ship_type_id",
    "character_id",
    "corporation_id",
    "alliance_id",
    "attacker_count",
    "total_value",
    "ship_value",
    "fitted_value",
    "victim_character_name",
    "victim_corporation_name",
    "victim_alliance_name",
    "victim_ship_name",
    "module_tags",
    "is_solo",
    "is_npc",
];

impl Field {
    pub fn from_name(name: &str) -> Option<Field> {
        ALL_FIELDS.iter().copied().find(|f| f.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::KillmailId => "killmail_id",
            Field::KillmailTime => "killmail_time",
            Field::SolarSystemId => "solar_system_id",
            Field::VictimCharacterId => "victim_character_id",
            Field::VictimCorporationId => "victim_corporation_id",
            Field::VictimAllianceId => "victim_alliance_id",
            Field::VictimShipTypeId => "victim_ship_type_id",
            Field::VictimShipGroupId => "victim_ship_group_id",
            Field::AttackerCharacterId => "attacker_character_id",
            Field::AttackerCorporationId => "attacker_corporation_id",
            Field::AttackerAllianceId => "attacker_alliance_id",
            Field::AttackerShipTypeId => "attacker_ship_type_id",
            Field::CharacterId => "character_id",
            Field::CorporationId => "corporation_id",
            Field::AllianceId => "alliance_id",
            Field::AttackerCount => "attacker_count",
            Field::TotalValue => "total_value",
            Field::ShipValue => "ship_value",
            Field::FittedValue => "fitted_value",
            Field::VictimCharacterName => "victim_character_name",
            Field::VictimCorporationName => "victim_corporation_name",
            Field::VictimAllianceName => "victim_alliance_name",
            Field::VictimShipName => "victim_ship_name",
            Field::ModuleTags => "module_tags",
            Field::IsSolo => "is_solo",
            Field::IsNpc => "is_npc",
        }
    }

    /// Whether the field can key the inverted index (integer identifiers).
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            Field::SolarSystemId
                | Field::VictimCharacterId
                | Field::VictimCorporationId
                | Field::VictimAllianceId
                | Field::VictimShipTypeId
                | Field::VictimShipGroupId
                | Field::AttackerCharacterId
                | Field::AttackerCorporationId
                | Field::AttackerAllianceId
                | Field::AttackerShipTypeId
                | Field::CharacterId
                | Field::CorporationId
                | Field::AllianceId
        )
    }

    /// Fields that resolve to a list of values on a killmail.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Field::AttackerCharacterId
                | Field::AttackerCorporationId
                | Field::AttackerAllianceId
                | Field::AttackerShipTypeId
                | Field::CharacterId
                | Field::CorporationId
                | Field::AllianceId
                | Field::ModuleTags
        )
    }

    /// Read this field from a killmail.
    pub fn extract<'a>(&self, km: &'a Killmail) -> FieldValue<'a> {
        let v = &km.victim;
        match self {
            Field::KillmailId => FieldValue::Int(km.killmail_id),
            Field::KillmailTime => FieldValue::Time(km.killmail_time),
            Field::SolarSystemId => FieldValue::Int(km.solar_system_id),
            Field::VictimCharacterId => FieldValue::opt_int(v.character_id),
            Field::VictimCorporationId => FieldValue::opt_int(v.corporation_id),
            Field::VictimAllianceId => FieldValue::opt_int(v.alliance_id),
            Field::VictimShipTypeId => FieldValue::opt_int(v.ship_type_id),
            Field::VictimShipGroupId => FieldValue::opt_int(v.ship_group_id),
            Field::AttackerCharacterId => FieldValue::IntList(km.attacker_ids(|a| a.character_id)),
            Field::AttackerCorporationId => {
                FieldValue::IntList(km.attacker_ids(|a| a.corporation_id))
            }
            Field::AttackerAllianceId => FieldValue::IntList(km.attacker_ids(|a| a.alliance_id)),
            Field::AttackerShipTypeId => FieldValue::IntList(km.attacker_ids(|a| a.ship_type_id)),
            Field::CharacterId => {
                FieldValue::IntList(km.involved_ids(v.character_id, |a| a.character_id))
            }
            Field::CorporationId => {
                FieldValue::IntList(km.involved_ids(v.corporation_id, |a| a.corporation_id))
            }
            Field::AllianceId => {
                FieldValue::IntList(km.involved_ids(v.alliance_id, |a| a.alliance_id))
            }
            Field::AttackerCount => FieldValue::Int(km.attacker_count() as i64),
            Field::TotalValue => FieldValue::opt_float(km.total_value),
            Field::ShipValue => FieldValue::opt_float(km.ship_value),
            Field::FittedValue => FieldValue::opt_float(km.fitted_value),
            Field::VictimCharacterName => FieldValue::opt_text(v.character_name.as_deref()),
            Field::VictimCorporationName => FieldValue::opt_text(v.corporation_name.as_deref()),
            Field::VictimAllianceName => FieldValue::opt_text(v.alliance_name.as_deref()),
            Field::VictimShipName => FieldValue::opt_text(v.ship_name.as_deref()),
            Field::ModuleTags => FieldValue::TextList(&km.module_tags),
            Field::IsSolo => FieldValue::Bool(km.is_solo),
            Field::IsNpc => FieldValue::Bool(km.is_npc),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value read from a killmail, borrowing where possible.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Int(i64),
    Float(f64),
    Text(&'a str),
    Bool(bool),
    Time(DateTime<Utc>),
    IntList(Vec<i64>),
    TextList(&'a [String]),
    /// Optional attribute not present on this killmail.
    Missing,
}

impl<'a> FieldValue<'a> {
    fn opt_int(v: Option<i64>) -> Self {
        v.map(FieldValue::Int).unwrap_or(FieldValue::Missing)
    }

    fn opt_float(v: Option<f64>) -> Self {
        v.map(FieldValue::Float).unwrap_or(FieldValue::Missing)
    }

    fn opt_text(v: Option<&'a str>) -> Self {
        v.map(FieldValue::Text).unwrap_or(FieldValue::Missing)
    }

    /// Integer values usable as inverted-index keys.
    pub fn index_keys(&self) -> Vec<i64> {
        match self {
            FieldValue::Int(i) => vec![*i],
            FieldValue::IntList(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }
}
