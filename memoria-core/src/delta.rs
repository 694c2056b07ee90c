//! Completion delta tracking between aggregation passes.
use serde::{Deserialize, Serialize};

use crate::pacing::PacingService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    #[default]
    Uninitialized,
    Seeded,
    Tracking,
}

/// Outcome of comparing one pass against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaReport {
    /// First pass: the lifetime counter should start from this total.
    Seeded(u32),
    Increased(u32),
    Unchanged,
    /// Fewer quests count than before, e.g. after a settings change. Not reported.
    Decreased(u32),
}

impl DeltaReport {
    /// Completions to report for this pass.
    #[must_use]
    pub const fn new_completions(self) -> u32 {
        match self {
            Self::Increased(count) => count,
            Self::Seeded(_) | Self::Unchanged | Self::Decreased(_) => 0,
        }
    }

    /// Deliver the report: a seed call on the first pass, then one increment
    /// per new completion.
    pub fn forward<P: PacingService + ?Sized>(self, pacing: &mut P) {
        match self {
            Self::Seeded(total) => pacing.seed_lifetime(total),
            Self::Increased(count) => {
                for _ in 0..count {
                    pacing.increment_completion();
                }
            }
            Self::Unchanged | Self::Decreased(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionDeltaTracker {
    state: TrackerState,
    previous: u32,
}

impl CompletionDeltaTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: TrackerState::Uninitialized,
            previous: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> TrackerState {
        self.state
    }

    #[must_use]
    pub const fn previous(&self) -> u32 {
        self.previous
    }

    /// Compare the root's complete count with the previous pass.
    pub fn observe(&mut self, complete: u32) -> DeltaReport {
        let report = match self.state {
            TrackerState::Uninitialized => {
                self.state = TrackerState::Seeded;
                DeltaReport::Seeded(complete)
            }
            TrackerState::Seeded | TrackerState::Tracking => {
                self.state = TrackerState::Tracking;
                match complete.cmp(&self.previous) {
                    std::cmp::Ordering::Greater => DeltaReport::Increased(complete - self.previous),
                    std::cmp::Ordering::Equal => DeltaReport::Unchanged,
                    std::cmp::Ordering::Less => DeltaReport::Decreased(self.previous - complete),
                }
            }
        };
        self.previous = complete;
        report
    }

    /// Back to the initial state; the next observation seeds again.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
