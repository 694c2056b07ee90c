//! Lazy bucket cache.
//!
//! Keeps at most one non-permanent bucket resident. Seasonal buckets are loaded
//! once at startup and never evicted.
use std::collections::HashMap;

use crate::bucket::{BucketError, BucketKey, BucketReader};
use crate::catalog::{Catalog, CatalogNode, CompletionStrategy, NodeId, Placeholder};
use crate::quest::QuestRecord;
use crate::settings::DisplayFilter;
use crate::{CompletionOracle, PassContext};

#[derive(Debug)]
pub struct BucketCache<R> {
    reader: R,
    entries: HashMap<BucketKey, Vec<QuestRecord>>,
    active: Option<BucketKey>,
}

/// Whether the node's known completion state allows skipping its bucket read.
fn bucket_known_complete(node: &CatalogNode, oracle: &dyn CompletionOracle) -> bool {
    match node.strategy {
        CompletionStrategy::AlwaysLoad => false,
        CompletionStrategy::SkipIfLastComplete => {
            node.last_quest_id.is_some_and(|id| oracle.is_complete(id))
        }
        CompletionStrategy::SkipIfAllComplete => {
            !node.all_quest_ids.is_empty()
                && node.all_quest_ids.iter().all(|&id| oracle.is_complete(id))
        }
    }
}

impl<R: BucketReader> BucketCache<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            entries: HashMap::new(),
            active: None,
        }
    }

    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Currently active non-permanent bucket.
    pub const fn active(&self) -> Option<&BucketKey> {
        self.active.as_ref()
    }

    pub fn is_resident(&self, key: &BucketKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn resident_keys(&self) -> impl Iterator<Item = &BucketKey> {
        self.entries.keys()
    }

    /// Number of resident buckets that may be evicted.
    pub fn evictable_count(&self) -> usize {
        self.entries.keys().filter(|key| !key.is_permanent()).count()
    }

    /// Load the bucket behind `node` unless it is already resident or known to
    /// be complete while complete quests are hidden.
    ///
    /// Returns `true` only when a bucket was read and stored. Failures are
    /// reported through the node's placeholder.
    pub fn ensure_loaded(
        &mut self,
        catalog: &mut Catalog,
        node: NodeId,
        force_load: bool,
        ctx: &mut PassContext<'_>,
    ) -> bool {
        let Some(key) = catalog.node(node).bucket.clone() else {
            log::debug!("Node {} has no bucket, skipping lazy-load", catalog.node(node).title);
            return false;
        };

        if self.entries.contains_key(&key) {
            if !key.is_permanent() {
                self.active = Some(key.clone());
            }
            catalog.node_mut(node).placeholder = None;
            log::debug!("Bucket already loaded: {key}");
            return false;
        }

        if !force_load
            && ctx.settings.display_filter == DisplayFilter::IncompleteOnly
            && bucket_known_complete(catalog.node(node), ctx.oracle)
        {
            let stub = catalog.node_mut(node);
            stub.total = stub.declared_total;
            stub.complete = stub.declared_total;
            stub.visible = true;
            stub.placeholder = Some(Placeholder::AllComplete);
            ctx.settings.completed_buckets.insert(key.clone());
            ctx.persist();
            log::info!("Bucket complete and hidden by filter, skipped load: {key}");
            return false;
        }

        // The placeholder reset and the eviction happen before the read, so a
        // failed read leaves no bucket active and only the failure placeholder.
        catalog.node_mut(node).placeholder = None;

        if !key.is_permanent()
            && let Some(previous) = self.active.clone()
            && previous != key
        {
            self.evict(catalog, &previous);
        }

        let quests = match self.reader.read_bucket(&key) {
            Ok(quests) => quests,
            Err(err) => {
                match &err {
                    BucketError::MalformedKey(_) => log::error!("Invalid bucket key: {err}"),
                    _ => log::warn!("Failed to load bucket {key}: {err}"),
                }
                catalog.node_mut(node).placeholder = Some(Placeholder::LoadFailed);
                return false;
            }
        };

        self.populate(catalog, &key, &quests);
        log::info!("Loaded bucket: {key} ({} quests total)", quests.len());
        self.entries.insert(key.clone(), quests);
        if !key.is_permanent() {
            self.active = Some(key);
        }
        true
    }

    /// Hand the bucket's quests to every leaf sharing `key`.
    fn populate(&self, catalog: &mut Catalog, key: &BucketKey, quests: &[QuestRecord]) {
        let shared_whole = key.is_shared_whole();
        for id in catalog.nodes_for_bucket(key).to_vec() {
            let leaf = catalog.node_mut(id);
            let list: Vec<QuestRecord> = if shared_whole {
                quests.to_vec()
            } else {
                quests
                    .iter()
                    .filter(|quest| quest.area == leaf.title)
                    .cloned()
                    .collect()
            };
            log::debug!("Populated {} quests for {} (before filtering)", list.len(), leaf.title);
            leaf.set_quests(list);
        }
    }

    /// Hand every resident bucket to its leaves again, undoing earlier filtering.
    pub(crate) fn repopulate(&self, catalog: &mut Catalog) {
        for (key, quests) in &self.entries {
            self.populate(catalog, key, quests);
        }
    }

    /// Drop a bucket and clear the quest list of every leaf sharing it.
    /// Permanent buckets are left alone.
    pub fn evict(&mut self, catalog: &mut Catalog, key: &BucketKey) {
        if key.is_permanent() {
            log::debug!("Skipping unload for seasonal content: {key}");
            return;
        }
        if self.entries.remove(key).is_some() {
            for id in catalog.nodes_for_bucket(key).to_vec() {
                catalog.node_mut(id).clear_quests();
            }
            log::info!("Unloaded bucket: {key}");
        }
        if self.active.as_ref() == Some(key) {
            self.active = None;
        }
    }

    pub fn evict_active(&mut self, catalog: &mut Catalog) {
        if let Some(active) = self.active.clone() {
            self.evict(catalog, &active);
        }
    }

    /// Force-load every always-loaded seasonal bucket. Returns how many were read.
    pub fn preload_permanent(&mut self, catalog: &mut Catalog, ctx: &mut PassContext<'_>) -> usize {
        let stubs: Vec<NodeId> = catalog
            .ids()
            .filter(|id| {
                let node = catalog.node(*id);
                node.is_leaf()
                    && node.strategy == CompletionStrategy::AlwaysLoad
                    && node.bucket.as_ref().is_some_and(BucketKey::is_permanent)
            })
            .collect();
        let loaded = stubs
            .into_iter()
            .filter(|id| self.ensure_loaded(catalog, *id, true, ctx))
            .count();
        log::info!("Pre-loaded {loaded} seasonal content buckets");
        loaded
    }

    /// Read a bucket without changing what is resident. Resident buckets are
    /// served from memory.
    ///
    /// # Errors
    ///
    /// Returns the reader's error when the bucket is not resident and cannot be read.
    pub fn read_uncached(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
        if let Some(quests) = self.entries.get(key) {
            return Ok(quests.clone());
        }
        self.reader.read_bucket(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::QuestId;
    use crate::settings::{MemoryStore, Settings};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct FixtureReader {
        buckets: HashMap<String, Vec<QuestRecord>>,
        reads: Cell<usize>,
        log: RefCell<Vec<String>>,
    }

    impl FixtureReader {
        fn with(mut self, key: &str, quests: Vec<QuestRecord>) -> Self {
            self.buckets.insert(key.to_string(), quests);
            self
        }
    }

    impl BucketReader for FixtureReader {
        fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
            key.segments()?;
            self.reads.set(self.reads.get() + 1);
            self.log.borrow_mut().push(key.to_string());
            self.buckets
                .get(key.as_str())
                .cloned()
                .ok_or_else(|| BucketError::Missing(key.as_str().into()))
        }
    }

    const MANIFEST: &str = r#"{
        "Title": "Quests",
        "Categories": [
            { "Title": "Main Scenario", "BucketPath": "2.x/2.0/msq", "TotalQuests": 2 },
            { "Title": "Gridania", "BucketPath": "2.x/2.0/other", "TotalQuests": 1 },
            { "Title": "Ul'dah", "BucketPath": "2.x/2.0/other", "TotalQuests": 1 },
            {
                "Title": "Heavensward",
                "BucketPath": "3.x/3.0/msq",
                "CompletionStrategy": "SkipIfLastComplete",
                "LastQuestId": 300,
                "TotalQuests": 5
            },
            {
                "Title": "Beast Tribes",
                "BucketPath": "3.x/3.0/beasts",
                "CompletionStrategy": "SkipIfAllComplete",
                "AllQuestIds": [],
                "TotalQuests": 4
            },
            { "Title": "Events", "BucketPath": "7.x/7.0/seasonal" },
            { "Title": "Broken", "BucketPath": "not-a-key" }
        ]
    }"#;

    fn reader() -> FixtureReader {
        FixtureReader::default()
            .with("2.x/2.0/msq", vec![QuestRecord::new("A", &[1]), QuestRecord::new("B", &[2])])
            .with(
                "2.x/2.0/other",
                vec![
                    QuestRecord::new("Forest", &[10]).with_area("Gridania"),
                    QuestRecord::new("Desert", &[20]).with_area("Ul'dah"),
                    QuestRecord::new("Desert 2", &[21]).with_area("Ul'dah"),
                ],
            )
            .with("3.x/3.0/msq", vec![QuestRecord::new("Ishgard", &[300])])
            .with("3.x/3.0/beasts", vec![QuestRecord::new("Vanu", &[400])])
            .with("7.x/7.0/seasonal", vec![QuestRecord::new("Moonfire", &[900])])
    }

    fn node(catalog: &Catalog, title: &str) -> NodeId {
        catalog.find_path(title).unwrap()
    }

    #[test]
    fn shared_bucket_is_split_by_area() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        let gridania = node(&catalog, "Gridania");
        assert!(cache.ensure_loaded(&mut catalog, gridania, false, &mut ctx));
        assert_eq!(catalog.node(gridania).quests.len(), 1);
        assert_eq!(catalog.node(node(&catalog, "Ul'dah")).quests.len(), 2);

        let uldah = node(&catalog, "Ul'dah");
        assert!(!cache.ensure_loaded(&mut catalog, uldah, false, &mut ctx));
        assert_eq!(cache.reader().reads.get(), 1);
    }

    #[test]
    fn keeps_only_one_evictable_bucket() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        assert_eq!(cache.preload_permanent(&mut catalog, &mut ctx), 1);
        for title in ["Main Scenario", "Gridania", "Heavensward", "Beast Tribes"] {
            let id = node(&catalog, title);
            assert!(cache.ensure_loaded(&mut catalog, id, false, &mut ctx));
            assert_eq!(cache.evictable_count(), 1);
        }
        assert!(cache.is_resident(&BucketKey::new("7.x/7.0/seasonal")));
        assert_eq!(cache.active(), Some(&BucketKey::new("3.x/3.0/beasts")));
        assert!(catalog.node(node(&catalog, "Main Scenario")).quests.is_empty());
        assert!(catalog.node(node(&catalog, "Main Scenario")).is_unloaded_stub());
    }

    #[test]
    fn seasonal_buckets_survive_eviction() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        cache.preload_permanent(&mut catalog, &mut ctx);
        let key = BucketKey::new("7.x/7.0/seasonal");
        cache.evict(&mut catalog, &key);
        assert!(cache.is_resident(&key));
        assert_eq!(catalog.node(node(&catalog, "Events")).quests.len(), 1);

        let events = node(&catalog, "Events");
        assert!(!cache.ensure_loaded(&mut catalog, events, false, &mut ctx));
        assert!(cache.active().is_none());
    }

    #[test]
    fn skips_known_complete_bucket_when_hiding_complete_quests() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = [300].into_iter().collect();
        let mut settings = Settings {
            display_filter: DisplayFilter::IncompleteOnly,
            ..Settings::default()
        };
        let store = MemoryStore::new();
        let hw = node(&catalog, "Heavensward");
        {
            let mut ctx = PassContext::new(&oracle, &mut settings, &store);
            assert!(!cache.ensure_loaded(&mut catalog, hw, false, &mut ctx));
        }
        assert_eq!(cache.reader().reads.get(), 0);
        let stub = catalog.node(hw);
        assert_eq!((stub.complete, stub.total), (5, 5));
        assert_eq!(stub.placeholder, Some(Placeholder::AllComplete));
        assert!(settings.is_bucket_complete(&BucketKey::new("3.x/3.0/msq")));
        assert_eq!(store.save_count(), 1);

        let mut ctx = PassContext::new(&oracle, &mut settings, &store);
        assert!(cache.ensure_loaded(&mut catalog, hw, true, &mut ctx));
        assert_eq!(cache.reader().reads.get(), 1);
        assert!(catalog.node(hw).placeholder.is_none());
    }

    #[test]
    fn skipped_bucket_loads_once_filter_shows_all() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = [300].into_iter().collect();
        let mut settings = Settings {
            display_filter: DisplayFilter::IncompleteOnly,
            ..Settings::default()
        };
        let store = MemoryStore::new();
        let hw = node(&catalog, "Heavensward");
        {
            let mut ctx = PassContext::new(&oracle, &mut settings, &store);
            assert!(!cache.ensure_loaded(&mut catalog, hw, false, &mut ctx));
        }
        assert_eq!(cache.reader().reads.get(), 0);

        settings.display_filter = DisplayFilter::ShowAll;
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);
        assert!(cache.ensure_loaded(&mut catalog, hw, false, &mut ctx));
        assert!(!cache.ensure_loaded(&mut catalog, hw, false, &mut ctx));
        assert_eq!(cache.reader().reads.get(), 1);
        assert_eq!(catalog.node(hw).quests.len(), 1);
    }

    #[test]
    fn empty_id_set_never_counts_as_complete() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle = |_: QuestId| true;
        let mut settings = Settings {
            display_filter: DisplayFilter::IncompleteOnly,
            ..Settings::default()
        };
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);
        let beasts = node(&catalog, "Beast Tribes");
        assert!(cache.ensure_loaded(&mut catalog, beasts, false, &mut ctx));
    }

    #[test]
    fn failed_load_after_switch_leaves_no_active_bucket() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(
            FixtureReader::default()
                .with("2.x/2.0/msq", vec![QuestRecord::new("A", &[1]), QuestRecord::new("B", &[2])]),
        );
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        let msq = node(&catalog, "Main Scenario");
        assert!(cache.ensure_loaded(&mut catalog, msq, false, &mut ctx));
        let hw = node(&catalog, "Heavensward");
        assert!(!cache.ensure_loaded(&mut catalog, hw, false, &mut ctx));

        assert!(cache.active().is_none());
        assert!(!cache.is_resident(&BucketKey::new("2.x/2.0/msq")));
        assert!(catalog.node(msq).is_unloaded_stub());
        assert_eq!(catalog.node(hw).placeholder, Some(Placeholder::LoadFailed));
    }

    #[test]
    fn failed_load_sets_placeholder_and_keeps_state() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(FixtureReader::default());
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        let msq = node(&catalog, "Main Scenario");
        assert!(!cache.ensure_loaded(&mut catalog, msq, false, &mut ctx));
        assert_eq!(catalog.node(msq).placeholder, Some(Placeholder::LoadFailed));
        assert!(cache.active().is_none());

        let broken = node(&catalog, "Broken");
        assert!(!cache.ensure_loaded(&mut catalog, broken, false, &mut ctx));
        assert_eq!(
            catalog.node(broken).placeholder_message(),
            Some("Failed to load quest data. Check plugin logs.")
        );
        assert_eq!(cache.reader().reads.get(), 1);
    }

    #[test]
    fn evict_active_clears_leaves() {
        let mut catalog = Catalog::from_json(MANIFEST).unwrap();
        let mut cache = BucketCache::new(reader());
        let oracle: HashSet<QuestId> = HashSet::new();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);

        let gridania = node(&catalog, "Gridania");
        cache.ensure_loaded(&mut catalog, gridania, false, &mut ctx);
        cache.evict_active(&mut catalog);
        assert!(cache.active().is_none());
        assert_eq!(cache.evictable_count(), 0);
        assert!(catalog.node(gridania).quests.is_empty());
        assert!(catalog.node(node(&catalog, "Ul'dah")).is_unloaded_stub());
    }

    #[test]
    fn read_uncached_leaves_cache_untouched() {
        let catalog = Catalog::from_json(MANIFEST).unwrap();
        let cache = BucketCache::new(reader());
        let quests = cache.read_uncached(&BucketKey::new("2.x/2.0/msq")).unwrap();
        assert_eq!(quests.len(), 2);
        assert!(cache.active().is_none());
        assert!(!cache.is_resident(&BucketKey::new("2.x/2.0/msq")));
        assert!(catalog.node(node(&catalog, "Main Scenario")).quests.is_empty());
        assert_eq!(cache.reader().log.borrow().as_slice(), ["2.x/2.0/msq"]);
    }
}
