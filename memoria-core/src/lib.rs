//! Time Memoria core
//!
//! Platform-agnostic quest progress tracking: a static catalog tree, a lazy
//! bucket cache that keeps at most one non-permanent bucket in memory, the
//! eligibility filter and aggregation pass, and completion delta reporting.
//! The crate never talks to the game directly; completion state comes in
//! through [`CompletionOracle`] and persistent state goes out through
//! [`SettingsStore`].

pub mod aggregate;
pub mod bucket;
pub mod cache;
pub mod catalog;
pub mod constants;
pub mod delta;
pub mod display;
pub mod numbers;
pub mod pacing;
pub mod profile;
pub mod progression;
pub mod quest;
pub mod settings;

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

// Re-export commonly used types
pub use aggregate::{Exclusion, exclusion};
pub use bucket::{BucketError, BucketKey, BucketReader, FsBucketReader, parse_bucket};
pub use cache::BucketCache;
pub use catalog::{Catalog, CatalogNode, CompletionStrategy, ManifestError, NodeId, Placeholder};
pub use delta::{CompletionDeltaTracker, DeltaReport, TrackerState};
pub use display::{display_text, overall_progress, visible_quests};
pub use numbers::percent;
pub use pacing::{NoPacing, PacingService, PlaytimeRecord, PlaytimeStats, format_pacing};
pub use profile::{Faction, PlayerProfile, ProfileResolver, StartArea, start_class_name};
pub use progression::{
    Progression, ProgressionError, QuestlineDefinition, QuestlineStats, TocEntry, UnlockState,
    bucket_display_name, oldest_incomplete, questline_stats, questline_totals,
};
pub use quest::{QuestId, QuestRecord};
pub use settings::{DisplayFilter, JsonFileStore, MemoryStore, Settings, SettingsError, SettingsStore};

/// Answers whether a quest is complete for the current character.
///
/// Queries may be expensive on the host side, so the tracker asks each
/// question at most once per pass. Answers are not assumed stable across passes.
pub trait CompletionOracle {
    fn is_complete(&self, id: QuestId) -> bool;
}

impl<S: BuildHasher> CompletionOracle for HashSet<QuestId, S> {
    fn is_complete(&self, id: QuestId) -> bool {
        self.contains(&id)
    }
}

impl CompletionOracle for BTreeSet<QuestId> {
    fn is_complete(&self, id: QuestId) -> bool {
        self.contains(&id)
    }
}

impl<F> CompletionOracle for F
where
    F: Fn(QuestId) -> bool,
{
    fn is_complete(&self, id: QuestId) -> bool {
        self(id)
    }
}

/// Everything a pass needs from the host: the oracle, the live settings and
/// where to flush them.
pub struct PassContext<'a> {
    pub oracle: &'a dyn CompletionOracle,
    pub settings: &'a mut Settings,
    pub store: &'a dyn SettingsStore,
}

impl<'a> PassContext<'a> {
    pub fn new(
        oracle: &'a dyn CompletionOracle,
        settings: &'a mut Settings,
        store: &'a dyn SettingsStore,
    ) -> Self {
        Self {
            oracle,
            settings,
            store,
        }
    }

    /// Flush settings now. Failures are logged and otherwise ignored.
    pub(crate) fn persist(&self) {
        if let Err(err) = self.store.save(&*self.settings) {
            log::warn!("Failed to save settings: {err}");
        }
    }
}

/// Owns the catalog and all per-session tracking state.
#[derive(Debug)]
pub struct QuestTracker<R> {
    catalog: Catalog,
    cache: BucketCache<R>,
    resolver: ProfileResolver,
    delta: CompletionDeltaTracker,
}

impl<R: BucketReader> QuestTracker<R> {
    /// Create a tracker over `catalog` reading buckets through `reader`
    pub fn new(catalog: Catalog, reader: R) -> Self {
        Self {
            catalog,
            cache: BucketCache::new(reader),
            resolver: ProfileResolver::new(),
            delta: CompletionDeltaTracker::new(),
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn cache(&self) -> &BucketCache<R> {
        &self.cache
    }

    #[must_use]
    pub const fn resolver(&self) -> &ProfileResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn delta(&self) -> &CompletionDeltaTracker {
        &self.delta
    }

    /// Pre-load seasonal buckets. Returns how many were read.
    pub fn startup(&mut self, ctx: &mut PassContext<'_>) -> usize {
        log::info!("Tracker startup with {} catalog nodes", self.catalog.len());
        self.cache.preload_permanent(&mut self.catalog, ctx)
    }

    /// See [`BucketCache::ensure_loaded`].
    pub fn ensure_loaded(&mut self, node: NodeId, force_load: bool, ctx: &mut PassContext<'_>) -> bool {
        self.cache.ensure_loaded(&mut self.catalog, node, force_load, ctx)
    }

    /// Load the bucket behind the first leaf that references `key`.
    pub fn open_bucket(&mut self, key: &BucketKey, force_load: bool, ctx: &mut PassContext<'_>) -> bool {
        let Some(node) = self.catalog.first_leaf_for_bucket(key) else {
            log::warn!("No catalog node references bucket {key}");
            return false;
        };
        self.ensure_loaded(node, force_load, ctx)
    }

    pub fn evict(&mut self, key: &BucketKey) {
        self.cache.evict(&mut self.catalog, key);
    }

    pub fn evict_active(&mut self) {
        self.cache.evict_active(&mut self.catalog);
    }

    /// Run a full aggregation pass and compare the root count with the last one.
    pub fn recompute(&mut self, ctx: &mut PassContext<'_>) -> DeltaReport {
        let complete = aggregate::recompute(&mut self.catalog, &mut self.resolver, ctx);
        self.delta.observe(complete)
    }

    /// Forget the resolved profile and completed buckets, e.g. on character
    /// change. Leaves of resident buckets get their full quest lists back so
    /// eligibility is evaluated again.
    pub fn clear_profile(&mut self, ctx: &mut PassContext<'_>) {
        self.resolver.clear(&mut ctx.settings.profile);
        ctx.settings.reset();
        ctx.persist();
        self.delta.reset();
        self.cache.repopulate(&mut self.catalog);
        log::info!("Profile cleared");
    }
}
