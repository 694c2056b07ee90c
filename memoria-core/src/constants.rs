//! Fixed quest identifiers and user-facing strings used by the tracker.
//!
//! The identifiers below come from the game's quest sheet. They only change
//! when the game itself changes, so they live in code rather than in the
//! bundled manifest.

use crate::profile::{Faction, StartArea};
use crate::quest::QuestId;

// Bucket categories --------------------------------------------------------
pub(crate) const PERMANENT_CATEGORY: &str = "seasonal";
pub(crate) const SHARED_CATEGORIES: [&str; 2] = ["msq", "feature"];
pub(crate) const BUCKET_FILE_EXTENSION: &str = "json";
pub(crate) const UNRESTRICTED_PATCH: &str = "2.0";
pub(crate) const OTHER_QUESTS_TITLE: &str = "Other Quests";

// Placeholder messages -----------------------------------------------------
pub(crate) const MSG_ALL_COMPLETE: &str = "All quests are complete.";
pub(crate) const MSG_LOAD_FAILED: &str = "Failed to load quest data. Check plugin logs.";

// Profile resolution -------------------------------------------------------
pub(crate) const START_AREA_QUESTS: [(QuestId, StartArea); 3] = [
    (65575, StartArea::Gridania),
    (65643, StartArea::LimsaLominsa),
    (66130, StartArea::Uldah),
];

pub(crate) const GRAND_COMPANY_QUESTS: [(QuestId, Faction); 3] = [
    (66216, Faction::TwinAdder),
    (66217, Faction::Maelstrom),
    (66218, Faction::ImmortalFlames),
];

/// `(completed, excluded)`: when the first quest is complete and the second is
/// not, the second is a class variant the player can never receive.
pub(crate) const START_CLASS_QUESTS: [(QuestId, QuestId); 9] = [
    (65792, 65822),
    (66090, 66089),
    (65849, 65848),
    (65583, 65754),
    (65582, 65755),
    (65640, 65638),
    (65584, 65747),
    (65883, 65882),
    (65991, 65990),
];

pub(crate) const START_CLASS_NAMES: [(QuestId, &str); 9] = [
    (65822, "Gladiator"),
    (66089, "Pugilist"),
    (65848, "Marauder"),
    (65754, "Lancer"),
    (65755, "Archer"),
    (65638, "Rogue"),
    (65747, "Conjurer"),
    (65882, "Thaumaturge"),
    (65990, "Arcanist"),
];

// Mutually exclusive quest chains ------------------------------------------
pub(crate) const EXCLUSIVE_GROUPS: [&[QuestId]; 5] = [
    &[67001, 67002, 67003],
    &[69256, 69257],
    &[69336, 69337],
    &[69338, 69339],
    &[69340, 69341],
];

// Pacing -------------------------------------------------------------------
pub(crate) const PACING_MAX_TICK_SECS: i64 = 5 * 60;
