use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::CompletionOracle;

/// Numeric quest identifier as used by the game's quest sheet.
pub type QuestId = u32;

/// Alternate identifiers for one quest. Most quests have one or two.
pub type QuestIds = SmallVec<[QuestId; 2]>;

/// A single quest entry from a bucket file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuestRecord {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "Id")]
    pub ids: QuestIds,
    #[serde(default)]
    pub area: String,
    /// Required starting area, empty when unrestricted.
    #[serde(default)]
    pub start: String,
    /// Required grand company, empty when unrestricted.
    #[serde(default, rename = "Gc", alias = "Faction")]
    pub faction: String,
    #[serde(default)]
    pub level: i32,
    #[serde(skip)]
    pub hidden: bool,
}

impl QuestRecord {
    #[must_use]
    pub fn new(title: impl Into<String>, ids: &[QuestId]) -> Self {
        Self {
            title: title.into(),
            ids: QuestIds::from_slice(ids),
            area: String::new(),
            start: String::new(),
            faction: String::new(),
            level: 0,
            hidden: false,
        }
    }

    #[must_use]
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = area.into();
        self
    }

    #[must_use]
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = start.into();
        self
    }

    #[must_use]
    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = faction.into();
        self
    }

    #[must_use]
    pub fn has_id(&self, id: QuestId) -> bool {
        self.ids.contains(&id)
    }

    /// A quest counts as complete when any of its alternate ids is complete.
    #[must_use]
    pub fn is_complete(&self, oracle: &dyn CompletionOracle) -> bool {
        self.ids.iter().any(|&id| oracle.is_complete(id))
    }

    /// Space separated id list, used in log lines.
    #[must_use]
    pub fn id_label(&self) -> String {
        self.ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
