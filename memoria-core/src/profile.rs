//! Player profile: starting area, grand company and starting class.
//!
//! Each field is derived from the completion oracle the first time it is
//! needed and then cached until the caller clears it.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CompletionOracle;
use crate::constants::{
    GRAND_COMPANY_QUESTS, START_AREA_QUESTS, START_CLASS_NAMES, START_CLASS_QUESTS,
};
use crate::quest::QuestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartArea {
    Gridania,
    #[serde(rename = "Limsa Lominsa")]
    LimsaLominsa,
    #[serde(rename = "Ul'dah")]
    Uldah,
}

impl StartArea {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gridania => "Gridania",
            Self::LimsaLominsa => "Limsa Lominsa",
            Self::Uldah => "Ul'dah",
        }
    }
}

impl fmt::Display for StartArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Grand company affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    #[serde(rename = "Twin Adder")]
    TwinAdder,
    Maelstrom,
    #[serde(rename = "Immortal Flames")]
    ImmortalFlames,
}

impl Faction {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TwinAdder => "Twin Adder",
            Self::Maelstrom => "Maelstrom",
            Self::ImmortalFlames => "Immortal Flames",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted profile fields. `None` means not yet known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub start_area: Option<StartArea>,
    #[serde(default, alias = "grand_company")]
    pub faction: Option<Faction>,
    /// Quest id of the class variant the player can never receive.
    #[serde(default)]
    pub start_class: Option<QuestId>,
}

impl PlayerProfile {
    /// Display name of the resolved starting class.
    #[must_use]
    pub fn start_class_name(&self) -> &'static str {
        self.start_class.map_or("Unknown", start_class_name)
    }
}

#[must_use]
pub fn start_class_name(id: QuestId) -> &'static str {
    START_CLASS_NAMES
        .iter()
        .find(|(class_id, _)| *class_id == id)
        .map_or("Unknown", |(_, name)| name)
}

fn resolve_start_area(oracle: &dyn CompletionOracle) -> Option<StartArea> {
    START_AREA_QUESTS
        .iter()
        .find(|(id, _)| oracle.is_complete(*id))
        .map(|(_, area)| *area)
}

fn resolve_faction(oracle: &dyn CompletionOracle) -> Option<Faction> {
    GRAND_COMPANY_QUESTS
        .iter()
        .find(|(id, _)| oracle.is_complete(*id))
        .map(|(_, faction)| *faction)
}

fn resolve_start_class(oracle: &dyn CompletionOracle) -> Option<QuestId> {
    START_CLASS_QUESTS
        .iter()
        .find(|(completed, excluded)| oracle.is_complete(*completed) && !oracle.is_complete(*excluded))
        .map(|(_, excluded)| *excluded)
}

/// Tracks which profile fields hold a derived value this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileResolver {
    area_resolved: bool,
    faction_resolved: bool,
    class_resolved: bool,
}

impl ProfileResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            area_resolved: false,
            faction_resolved: false,
            class_resolved: false,
        }
    }

    /// Fill in every blank field from the oracle. A field is only cached once
    /// it has a value; blank fields are queried again on every pass.
    ///
    /// Returns `true` when a field gained a value and should be persisted.
    pub fn resolve(&mut self, profile: &mut PlayerProfile, oracle: &dyn CompletionOracle) -> bool {
        let mut changed = false;
        if !self.area_resolved {
            if profile.start_area.is_none() {
                profile.start_area = resolve_start_area(oracle);
                changed |= profile.start_area.is_some();
                log::debug!("Start area {:?}", profile.start_area);
            }
            self.area_resolved = profile.start_area.is_some();
        }
        if !self.faction_resolved {
            if profile.faction.is_none() {
                profile.faction = resolve_faction(oracle);
                changed |= profile.faction.is_some();
                log::debug!("Grand company {:?}", profile.faction);
            }
            self.faction_resolved = profile.faction.is_some();
        }
        if !self.class_resolved {
            if profile.start_class.is_none() {
                profile.start_class = resolve_start_class(oracle);
                changed |= profile.start_class.is_some();
                log::debug!("Start class {:?}", profile.start_class);
            }
            self.class_resolved = profile.start_class.is_some();
        }
        changed
    }

    /// Forget the derived fields so the next pass queries the oracle again.
    pub fn clear(&mut self, profile: &mut PlayerProfile) {
        *profile = PlayerProfile::default();
        *self = Self::new();
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.area_resolved && self.faction_resolved && self.class_resolved
    }
}
