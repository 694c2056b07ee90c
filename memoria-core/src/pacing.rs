//! Playtime and quest pacing statistics.
//!
//! The tracker only talks to [`PacingService`]. [`PlaytimeStats`] is the
//! per-character implementation: it accumulates session playtime while the
//! host ticks it and turns completion counts into minutes-per-quest figures.
//! All figures are descriptive; nothing here ranks or judges the player.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PACING_MAX_TICK_SECS;
use crate::numbers::{truncate_f64_to_u64, u64_to_f64};

/// Consumer of completion deltas.
pub trait PacingService {
    /// Start the lifetime completion counter from `total`.
    fn seed_lifetime(&mut self, total: u32);

    /// One quest was completed since the previous pass.
    fn increment_completion(&mut self);
}

/// Pacing sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl PacingService for NoPacing {
    fn seed_lifetime(&mut self, _total: u32) {}

    fn increment_completion(&mut self) {}
}

/// Per-character playtime snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaytimeRecord {
    /// `Name@World`.
    pub character_id: String,
    #[serde(default)]
    pub lifetime_playtime_secs: u64,
    #[serde(default)]
    pub session_playtime_secs: u64,
    #[serde(default)]
    pub total_quests_completed: u32,
    #[serde(default)]
    pub session_quests_completed: u32,
    #[serde(skip)]
    pub last_update: Option<DateTime<Utc>>,
}

impl PlaytimeRecord {
    #[must_use]
    pub fn new(character_id: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaytimeStats {
    current: Option<PlaytimeRecord>,
}

/// Minutes per quest rendered as `"{m}m {s}s per quest"`.
#[must_use]
pub fn format_pacing(minutes_per_quest: f64) -> String {
    let total_seconds = truncate_f64_to_u64(minutes_per_quest * 60.0);
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes}m {seconds}s per quest")
}

fn minutes_per_quest(playtime_secs: u64, quests: u32) -> Option<f64> {
    (quests > 0).then(|| u64_to_f64(playtime_secs) / 60.0 / f64::from(quests))
}

impl PlaytimeStats {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    #[must_use]
    pub const fn current(&self) -> Option<&PlaytimeRecord> {
        self.current.as_ref()
    }

    /// Start a session. A previously saved record keeps its lifetime figures;
    /// session figures always start from zero.
    pub fn login(
        &mut self,
        character_id: &str,
        saved: Option<PlaytimeRecord>,
        now: DateTime<Utc>,
    ) {
        let mut record = saved.unwrap_or_else(|| PlaytimeRecord::new(character_id));
        record.character_id = character_id.to_string();
        record.session_playtime_secs = 0;
        record.session_quests_completed = 0;
        record.last_update = Some(now);
        log::debug!("Playtime session started for {character_id}");
        self.current = Some(record);
    }

    /// End the session and hand back the record for persistence.
    pub fn logout(&mut self) -> Option<PlaytimeRecord> {
        self.current.take()
    }

    /// Accumulate session time since the previous tick. Gaps that are negative
    /// or longer than five minutes only move the clock forward.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let Some(record) = self.current.as_mut() else {
            return;
        };
        let Some(last) = record.last_update else {
            record.last_update = Some(now);
            return;
        };
        let delta = (now - last).num_seconds();
        record.last_update = Some(now);
        if (0..=PACING_MAX_TICK_SECS).contains(&delta) {
            record.session_playtime_secs += u64::try_from(delta).unwrap_or(0);
        }
    }

    /// Replace the lifetime playtime with an authoritative figure from the game.
    pub fn set_lifetime_playtime(&mut self, secs: u64) {
        if let Some(record) = self.current.as_mut() {
            record.lifetime_playtime_secs = secs;
        }
    }

    #[must_use]
    pub fn session_minutes_per_quest(&self) -> Option<f64> {
        self.current.as_ref().and_then(|record| {
            minutes_per_quest(record.session_playtime_secs, record.session_quests_completed)
        })
    }

    #[must_use]
    pub fn lifetime_minutes_per_quest(&self) -> Option<f64> {
        self.current.as_ref().and_then(|record| {
            minutes_per_quest(record.lifetime_playtime_secs, record.total_quests_completed)
        })
    }

    #[must_use]
    pub fn formatted_session_pacing(&self) -> Option<String> {
        self.session_minutes_per_quest().map(format_pacing)
    }

    #[must_use]
    pub fn formatted_lifetime_pacing(&self) -> Option<String> {
        self.lifetime_minutes_per_quest().map(format_pacing)
    }
}

impl PacingService for PlaytimeStats {
    fn seed_lifetime(&mut self, total: u32) {
        if let Some(record) = self.current.as_mut() {
            record.total_quests_completed = total;
        }
    }

    fn increment_completion(&mut self) {
        if let Some(record) = self.current.as_mut() {
            record.session_quests_completed += 1;
            record.total_quests_completed += 1;
        }
    }
}
