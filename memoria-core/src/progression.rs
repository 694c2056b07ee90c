//! Questline registry and patch unlock state.
//!
//! A table-of-contents file lists, per patch, the quest that starts it and the
//! quest that finishes it. Combined with the static questline registry this
//! decides which questlines the character may browse without spoilers.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::CompletionOracle;
use crate::bucket::{BucketError, BucketKey, BucketReader};
use crate::cache::BucketCache;
use crate::constants::{PERMANENT_CATEGORY, UNRESTRICTED_PATCH};
use crate::numbers::percent;
use crate::quest::{QuestId, QuestRecord};

/// One row of the table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TocEntry {
    #[serde(default)]
    pub patch: String,
    #[serde(default)]
    pub expansion: String,
    /// `Start` or `Final`; other roles are ignored.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ids: Vec<QuestId>,
}

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("failed to read table of contents {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table of contents is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A browsable slice of the story, spanning one or more patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestlineDefinition {
    pub name: &'static str,
    pub expansion: &'static str,
    /// Patch numbers without the dot, e.g. `21` for 2.1.
    pub patch_prefixes: &'static [u32],
    /// Patch whose start quest unlocks the questline; `None` is always unlocked.
    pub unlock_patch: Option<&'static str>,
    pub requires_full_version: bool,
}

impl QuestlineDefinition {
    const fn new(
        name: &'static str,
        expansion: &'static str,
        patch_prefixes: &'static [u32],
        unlock_patch: Option<&'static str>,
        requires_full_version: bool,
    ) -> Self {
        Self {
            name,
            expansion,
            patch_prefixes,
            unlock_patch,
            requires_full_version,
        }
    }

    /// Bucket keys of `category` across every patch of the questline.
    pub fn bucket_keys<'a>(&'a self, category: &'a str) -> impl Iterator<Item = BucketKey> + 'a {
        self.patch_prefixes
            .iter()
            .map(move |prefix| BucketKey::from_patch_prefix(*prefix, category))
    }
}

pub const EXPANSIONS: [&str; 6] = [
    "A Realm Reborn",
    "Heavensward",
    "Stormblood",
    "Shadowbringers",
    "Endwalker",
    "Dawntrail",
];

pub static QUESTLINES: [QuestlineDefinition; 15] = [
    QuestlineDefinition::new("Seventh Umbral Era", "A Realm Reborn", &[20], None, false),
    QuestlineDefinition::new("Seventh Astral Era", "A Realm Reborn", &[21, 22, 23, 24, 25], Some("2.1"), false),
    QuestlineDefinition::new("Heavensward", "Heavensward", &[30], Some("3.0"), false),
    QuestlineDefinition::new("Dragonsong", "Heavensward", &[31, 32, 33], Some("3.1"), false),
    QuestlineDefinition::new("Post-Dragonsong", "Heavensward", &[34, 35], Some("3.4"), false),
    QuestlineDefinition::new("Stormblood", "Stormblood", &[40], Some("4.0"), false),
    QuestlineDefinition::new("Post-Stormblood", "Stormblood", &[41, 42, 43, 44, 45], Some("4.1"), true),
    QuestlineDefinition::new("Shadowbringers", "Shadowbringers", &[50], Some("5.0"), true),
    QuestlineDefinition::new("Post-Shadowbringers", "Shadowbringers", &[51, 52, 53], Some("5.1"), true),
    QuestlineDefinition::new("Post-Shadowbringers II", "Shadowbringers", &[54, 55], Some("5.4"), true),
    QuestlineDefinition::new("Endwalker", "Endwalker", &[60], Some("6.0"), true),
    QuestlineDefinition::new("Post-Endwalker", "Endwalker", &[61, 62, 63, 64, 65], Some("6.1"), true),
    QuestlineDefinition::new("Dawntrail", "Dawntrail", &[70], Some("7.0"), true),
    QuestlineDefinition::new("Post-Dawntrail", "Dawntrail", &[71, 72, 73], Some("7.1"), true),
    QuestlineDefinition::new("Post-Dawntrail II", "Dawntrail", &[74, 75], Some("7.4"), true),
];

/// `(category, label)` in display order.
pub const BUCKET_DISPLAY_NAMES: [(&str, &str); 8] = [
    ("msq", "Main Scenario"),
    ("newera", "Chronicles of a New Era"),
    ("feature", "Feature Quests"),
    ("beasts", "Beast Tribes"),
    ("class", "Class & Job Quests"),
    ("leve", "Leve Quests"),
    ("other", "Other Quests"),
    ("seasonal", "Seasonal Events"),
];

#[must_use]
pub fn bucket_display_name(category: &str) -> Option<&'static str> {
    BUCKET_DISPLAY_NAMES
        .iter()
        .find(|(suffix, _)| suffix.eq_ignore_ascii_case(category))
        .map(|(_, label)| *label)
}

/// Questlines of one expansion, in registry order.
pub fn questlines_for(expansion: &str) -> impl Iterator<Item = &'static QuestlineDefinition> + '_ {
    QUESTLINES.iter().filter(move |ql| ql.expansion == expansion)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockState {
    Unlocked,
    /// Not reached yet; spoiler mode lifts this.
    SpoilerLocked,
    /// Needs the full game; spoiler mode does not lift this.
    FreeTrialLocked,
}

impl UnlockState {
    #[must_use]
    pub const fn is_unlocked(self) -> bool {
        matches!(self, Self::Unlocked)
    }

    /// Explanation shown in place of a locked questline.
    #[must_use]
    pub fn lock_message(self, questline: &QuestlineDefinition) -> Option<String> {
        match self {
            Self::Unlocked => None,
            Self::FreeTrialLocked => Some(
                "This content requires the full version of the game.\nFree Trial Mode is enabled in Settings."
                    .to_string(),
            ),
            Self::SpoilerLocked => Some(format!(
                "Your character has not progressed to {} yet.\nEnable Spoiler Mode in Settings to access this content.",
                questline.name
            )),
        }
    }
}

/// Start and final quest ids per patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progression {
    start_ids: HashMap<String, Vec<QuestId>>,
    final_ids: HashMap<String, Vec<QuestId>>,
}

impl Progression {
    #[must_use]
    pub fn from_entries(entries: Vec<TocEntry>) -> Self {
        let mut progression = Self::default();
        for entry in entries {
            match entry.role.as_str() {
                "Start" => {
                    progression.start_ids.insert(entry.patch, entry.ids);
                }
                "Final" => {
                    progression.final_ids.insert(entry.patch, entry.ids);
                }
                other => log::debug!("Ignoring table of contents role {other:?} for {}", entry.patch),
            }
        }
        progression
    }

    /// Parse a table of contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an array of entries.
    pub fn from_json(json: &str) -> Result<Self, ProgressionError> {
        let entries: Vec<TocEntry> = serde_json::from_str(json)?;
        log::info!("Loaded {} table of contents entries", entries.len());
        Ok(Self::from_entries(entries))
    }

    /// Read a table of contents file. A missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Option<Self>, ProgressionError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ProgressionError::Unreadable {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Like [`Progression::from_path`], but any failure leaves every patch
    /// except the first locked.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(Some(progression)) => progression,
            Ok(None) => {
                log::warn!("Table of contents not found at {}", path.display());
                Self::default()
            }
            Err(err) => {
                log::error!("Failed to load table of contents: {err}");
                Self::default()
            }
        }
    }

    /// Whether the start quest of `patch` is complete. The first patch is
    /// always unlocked.
    #[must_use]
    pub fn is_patch_unlocked(&self, patch: &str, oracle: &dyn CompletionOracle) -> bool {
        if patch == UNRESTRICTED_PATCH {
            return true;
        }
        self.start_ids
            .get(patch)
            .is_some_and(|ids| ids.iter().any(|&id| oracle.is_complete(id)))
    }

    /// Whether the final quest of `patch` is complete.
    #[must_use]
    pub fn is_patch_finished(&self, patch: &str, oracle: &dyn CompletionOracle) -> bool {
        self.final_ids
            .get(patch)
            .is_some_and(|ids| ids.iter().any(|&id| oracle.is_complete(id)))
    }

    #[must_use]
    pub fn unlock_state(
        &self,
        questline: &QuestlineDefinition,
        free_trial: bool,
        spoiler: bool,
        oracle: &dyn CompletionOracle,
    ) -> UnlockState {
        if free_trial && questline.requires_full_version {
            return UnlockState::FreeTrialLocked;
        }
        let Some(patch) = questline.unlock_patch else {
            return UnlockState::Unlocked;
        };
        if spoiler || self.is_patch_unlocked(patch, oracle) {
            UnlockState::Unlocked
        } else {
            UnlockState::SpoilerLocked
        }
    }
}

/// Completion counts for one slice of a questline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestlineStats {
    pub complete: u32,
    pub total: u32,
}

impl QuestlineStats {
    #[must_use]
    pub fn percent(self) -> u32 {
        percent(self.complete, self.total)
    }

    /// `"42%"`, or `"-"` when there is nothing to count.
    #[must_use]
    pub fn percent_label(self) -> String {
        if self.total == 0 {
            "-".to_string()
        } else {
            format!("{}%", self.percent())
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        self.total > 0 && self.complete >= self.total
    }
}

impl std::ops::AddAssign for QuestlineStats {
    fn add_assign(&mut self, rhs: Self) {
        self.complete += rhs.complete;
        self.total += rhs.total;
    }
}

/// Every quest of `category` across the questline's patches, read without
/// touching the cache. Missing bucket files contribute nothing.
pub fn questline_quests<R: BucketReader>(
    cache: &BucketCache<R>,
    questline: &QuestlineDefinition,
    category: &str,
) -> Vec<QuestRecord> {
    let mut quests = Vec::new();
    for key in questline.bucket_keys(category) {
        match cache.read_uncached(&key) {
            Ok(mut bucket) => quests.append(&mut bucket),
            Err(BucketError::Missing(_)) => {}
            Err(err) => log::warn!("Skipping bucket {key} for {}: {err}", questline.name),
        }
    }
    quests
}

/// Complete and total quest counts of `category` across the questline.
pub fn questline_stats<R: BucketReader>(
    cache: &BucketCache<R>,
    questline: &QuestlineDefinition,
    category: &str,
    oracle: &dyn CompletionOracle,
) -> QuestlineStats {
    let quests = questline_quests(cache, questline, category);
    let complete = quests.iter().filter(|quest| quest.is_complete(oracle)).count();
    QuestlineStats {
        complete: u32::try_from(complete).unwrap_or(u32::MAX),
        total: u32::try_from(quests.len()).unwrap_or(u32::MAX),
    }
}

/// Counts summed over every non-seasonal category of the questline.
pub fn questline_totals<R: BucketReader>(
    cache: &BucketCache<R>,
    questline: &QuestlineDefinition,
    oracle: &dyn CompletionOracle,
) -> QuestlineStats {
    let mut stats = QuestlineStats::default();
    for (category, _) in BUCKET_DISPLAY_NAMES {
        if category != PERMANENT_CATEGORY {
            stats += questline_stats(cache, questline, category, oracle);
        }
    }
    stats
}

/// The earliest unlocked questline category that still has incomplete quests.
pub fn oldest_incomplete<R: BucketReader>(
    progression: &Progression,
    cache: &BucketCache<R>,
    free_trial: bool,
    spoiler: bool,
    oracle: &dyn CompletionOracle,
) -> Option<(&'static QuestlineDefinition, &'static str)> {
    for questline in &QUESTLINES {
        if !progression
            .unlock_state(questline, free_trial, spoiler, oracle)
            .is_unlocked()
        {
            continue;
        }
        for (category, _) in BUCKET_DISPLAY_NAMES {
            if category == PERMANENT_CATEGORY {
                continue;
            }
            let stats = questline_stats(cache, questline, category, oracle);
            if stats.total > 0 && !stats.is_finished() {
                return Some((questline, category));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TOC: &str = r#"[
        { "Patch": "2.1", "Expansion": "A Realm Reborn", "Role": "Start", "Name": "A Realm Awoken", "Ids": [66729] },
        { "Patch": "2.1", "Expansion": "A Realm Reborn", "Role": "Final", "Name": "Into the Aery", "Ids": [66899] },
        { "Patch": "4.1", "Expansion": "Stormblood", "Role": "Start", "Name": "The Legend Returns", "Ids": [68089, 68090] },
        { "Patch": "4.1", "Expansion": "Stormblood", "Role": "Note", "Name": "Ignored", "Ids": [1] }
    ]"#;

    struct MapReader(HashMap<String, Vec<QuestRecord>>);

    impl BucketReader for MapReader {
        fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
            self.0
                .get(key.as_str())
                .cloned()
                .ok_or_else(|| BucketError::Missing(key.as_str().into()))
        }
    }

    fn questline(name: &str) -> &'static QuestlineDefinition {
        QUESTLINES.iter().find(|ql| ql.name == name).unwrap()
    }

    #[test]
    fn first_patch_is_always_unlocked() {
        let progression = Progression::default();
        let none: HashSet<QuestId> = HashSet::new();
        assert!(progression.is_patch_unlocked("2.0", &none));
        assert!(!progression.is_patch_unlocked("2.1", &none));
    }

    #[test]
    fn start_quests_unlock_patches() {
        let progression = Progression::from_json(TOC).unwrap();
        let done: HashSet<QuestId> = [66729, 68090].into_iter().collect();
        assert!(progression.is_patch_unlocked("2.1", &done));
        assert!(progression.is_patch_unlocked("4.1", &done));
        assert!(!progression.is_patch_finished("2.1", &done));
        assert!(!progression.is_patch_unlocked("3.0", &done));
    }

    #[test]
    fn free_trial_lock_ignores_spoiler_mode() {
        let progression = Progression::from_json(TOC).unwrap();
        let done: HashSet<QuestId> = [68089].into_iter().collect();
        let post_sb = questline("Post-Stormblood");
        assert_eq!(
            progression.unlock_state(post_sb, true, true, &done),
            UnlockState::FreeTrialLocked
        );
        assert_eq!(progression.unlock_state(post_sb, false, false, &done), UnlockState::Unlocked);

        let astral = questline("Seventh Astral Era");
        assert_eq!(
            progression.unlock_state(astral, true, false, &done),
            UnlockState::SpoilerLocked
        );
        assert_eq!(progression.unlock_state(astral, true, true, &done), UnlockState::Unlocked);
        assert_eq!(
            progression.unlock_state(questline("Seventh Umbral Era"), true, false, &done),
            UnlockState::Unlocked
        );
    }

    #[test]
    fn lock_messages_name_the_questline() {
        let astral = questline("Seventh Astral Era");
        let message = UnlockState::SpoilerLocked.lock_message(astral).unwrap();
        assert!(message.contains("Seventh Astral Era"));
        assert!(UnlockState::Unlocked.lock_message(astral).is_none());
    }

    #[test]
    fn missing_toc_file_is_not_an_error() {
        let path = std::env::temp_dir().join("memoria-no-such-toc.json");
        assert!(Progression::from_path(&path).unwrap().is_none());
        assert_eq!(Progression::load_or_empty(&path), Progression::default());
    }

    #[test]
    fn registry_covers_every_expansion() {
        for expansion in EXPANSIONS {
            assert!(questlines_for(expansion).count() >= 2, "{expansion}");
        }
        assert_eq!(bucket_display_name("msq"), Some("Main Scenario"));
        assert_eq!(bucket_display_name("Seasonal"), Some("Seasonal Events"));
        assert_eq!(bucket_display_name("raids"), None);
    }

    #[test]
    fn stats_span_patches_without_touching_cache() {
        let buckets = HashMap::from([
            (
                "2.x/2.1/msq".to_string(),
                vec![QuestRecord::new("A", &[1]), QuestRecord::new("B", &[2])],
            ),
            ("2.x/2.3/msq".to_string(), vec![QuestRecord::new("C", &[3])]),
            ("2.x/2.2/other".to_string(), vec![QuestRecord::new("D", &[4])]),
        ]);
        let cache = BucketCache::new(MapReader(buckets));
        let done: HashSet<QuestId> = [1, 3, 4].into_iter().collect();
        let astral = questline("Seventh Astral Era");

        let msq = questline_stats(&cache, astral, "msq", &done);
        assert_eq!(msq, QuestlineStats { complete: 2, total: 3 });
        assert_eq!(msq.percent_label(), "66%");
        assert_eq!(questline_totals(&cache, astral, &done), QuestlineStats { complete: 3, total: 4 });
        assert_eq!(questline_stats(&cache, astral, "leve", &done).percent_label(), "-");
        assert_eq!(cache.resident_keys().count(), 0);
    }

    #[test]
    fn oldest_incomplete_skips_finished_and_locked_questlines() {
        let buckets = HashMap::from([
            ("2.x/2.0/msq".to_string(), vec![QuestRecord::new("A", &[1])]),
            ("2.x/2.0/other".to_string(), vec![QuestRecord::new("B", &[2])]),
            ("2.x/2.1/msq".to_string(), vec![QuestRecord::new("C", &[3])]),
        ]);
        let cache = BucketCache::new(MapReader(buckets));
        let progression = Progression::from_json(TOC).unwrap();
        let done: HashSet<QuestId> = [1].into_iter().collect();

        let (ql, category) = oldest_incomplete(&progression, &cache, false, false, &done).unwrap();
        assert_eq!((ql.name, category), ("Seventh Umbral Era", "other"));

        let done: HashSet<QuestId> = [1, 2].into_iter().collect();
        assert!(oldest_incomplete(&progression, &cache, false, false, &done).is_none());
        let (ql, category) = oldest_incomplete(&progression, &cache, false, true, &done).unwrap();
        assert_eq!((ql.name, category), ("Seventh Astral Era", "msq"));
    }
}
