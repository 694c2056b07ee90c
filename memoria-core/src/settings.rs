//! Persisted user settings and the stores that hold them.
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bucket::BucketKey;
use crate::profile::PlayerProfile;

/// Which quests the viewer wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFilter {
    #[default]
    ShowAll,
    IncompleteOnly,
    CompleteOnly,
}

impl DisplayFilter {
    /// Whether a quest with the given completion state is hidden under this filter.
    #[must_use]
    pub const fn hides(self, complete: bool) -> bool {
        match self {
            Self::ShowAll => false,
            Self::IncompleteOnly => complete,
            Self::CompleteOnly => !complete,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShowAll => "Show All",
            Self::IncompleteOnly => "Show Incomplete",
            Self::CompleteOnly => "Show Complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub display_filter: DisplayFilter,
    #[serde(default = "default_true")]
    pub show_count: bool,
    #[serde(default)]
    pub show_percentage: bool,
    #[serde(default)]
    pub exclude_other_quests: bool,
    #[serde(default)]
    pub spoiler_mode: bool,
    #[serde(default)]
    pub free_trial_mode: bool,
    /// Buckets known to be fully complete, so they need not be read again.
    #[serde(default)]
    pub completed_buckets: BTreeSet<BucketKey>,
    #[serde(default)]
    pub profile: PlayerProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_filter: DisplayFilter::ShowAll,
            show_count: true,
            show_percentage: false,
            exclude_other_quests: false,
            spoiler_mode: false,
            free_trial_mode: false,
            completed_buckets: BTreeSet::new(),
            profile: PlayerProfile::default(),
        }
    }
}

const fn default_true() -> bool {
    true
}

impl Settings {
    #[must_use]
    pub fn is_bucket_complete(&self, key: &BucketKey) -> bool {
        self.completed_buckets.contains(key)
    }

    /// Forget everything derived from the current character.
    pub fn reset(&mut self) {
        self.profile = PlayerProfile::default();
        self.completed_buckets.clear();
    }

    /// Load settings from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into settings.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent home of the settings blob.
pub trait SettingsStore {
    /// Persist settings. Callers expect the write to be durable on return.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;

    /// Load previously saved settings, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if stored settings exist but cannot be read.
    fn load(&self) -> Result<Option<Settings>, SettingsError>;
}

/// Settings kept in a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let payload = serde_json::to_vec_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&self.path, payload).map_err(|e| self.io_error(e))
    }

    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(Settings::from_json(&json)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-memory store; keeps the last saved copy and counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: RefCell<Option<Settings>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Settings> {
        self.saved.borrow().clone()
    }
}

impl SettingsStore for MemoryStore {
    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        self.saved.replace(Some(settings.clone()));
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::StartArea;

    #[test]
    fn display_filter_hides_expected_quests() {
        assert!(!DisplayFilter::ShowAll.hides(true));
        assert!(!DisplayFilter::ShowAll.hides(false));
        assert!(DisplayFilter::IncompleteOnly.hides(true));
        assert!(!DisplayFilter::IncompleteOnly.hides(false));
        assert!(DisplayFilter::CompleteOnly.hides(false));
        assert!(!DisplayFilter::CompleteOnly.hides(true));
    }

    #[test]
    fn empty_json_uses_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.show_count);
    }

    #[test]
    fn reset_clears_profile_and_completed_buckets() {
        let mut settings = Settings::default();
        settings.profile.start_area = Some(StartArea::Gridania);
        settings
            .completed_buckets
            .insert(BucketKey::new("2.x/2.0/msq"));
        settings.show_percentage = true;
        settings.reset();
        assert!(settings.profile.start_area.is_none());
        assert!(settings.completed_buckets.is_empty());
        assert!(settings.show_percentage);
    }

    #[test]
    fn json_file_store_round_trips_and_handles_missing_file() {
        let path = std::env::temp_dir().join(format!(
            "memoria-settings-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let mut settings = Settings {
            display_filter: DisplayFilter::IncompleteOnly,
            ..Settings::default()
        };
        settings
            .completed_buckets
            .insert(BucketKey::new("3.x/3.0/msq"));
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), Some(settings));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&Settings::default()).unwrap();
        store.save(&Settings::default()).unwrap();
        assert_eq!(store.save_count(), 2);
        assert!(store.snapshot().is_some());
    }
}
