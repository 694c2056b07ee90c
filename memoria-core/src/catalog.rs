//! Quest catalog tree.
//!
//! The catalog is built once from a manifest and never changes shape afterwards.
//! Nodes live in an arena addressed by [`NodeId`]; leaves that draw from the same
//! bucket are found through a key index instead of back-pointers.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bucket::BucketKey;
use crate::constants::{MSG_ALL_COMPLETE, MSG_LOAD_FAILED};
use crate::quest::{QuestId, QuestRecord};

const BUNDLED_MANIFEST: &str = include_str!("../data/catalog.json");

/// Policy for skipping a bucket read when its contents are known to be complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStrategy {
    #[default]
    AlwaysLoad,
    /// Linear content: complete once the terminal quest is complete.
    SkipIfLastComplete,
    /// Non-linear content: complete once every listed quest is complete.
    SkipIfAllComplete,
}

/// Message shown for a leaf that has no quest list to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placeholder {
    AllComplete,
    LoadFailed,
    Note(String),
}

impl Placeholder {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::AllComplete => MSG_ALL_COMPLETE,
            Self::LoadFailed => MSG_LOAD_FAILED,
            Self::Note(text) => text,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A category (with children) or a leaf (with quests); never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNode {
    pub title: String,
    pub children: Vec<NodeId>,
    pub quests: Vec<QuestRecord>,
    pub complete: u32,
    pub total: u32,
    pub visible: bool,
    pub bucket: Option<BucketKey>,
    pub strategy: CompletionStrategy,
    pub last_quest_id: Option<QuestId>,
    pub all_quest_ids: Vec<QuestId>,
    /// Quest count known from the manifest, used while the bucket is not loaded.
    pub declared_total: u32,
    pub placeholder: Option<Placeholder>,
    /// Quest list comes from a resident bucket (or inline manifest data).
    pub(crate) resident: bool,
    /// Eligibility rules already ran over the current quest list.
    pub(crate) filtered: bool,
}

impl CatalogNode {
    #[must_use]
    pub fn is_category(&self) -> bool {
        !self.children.is_empty()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Leaf whose bucket is known but not currently resident.
    #[must_use]
    pub fn is_unloaded_stub(&self) -> bool {
        self.is_leaf() && self.bucket.is_some() && !self.resident
    }

    #[must_use]
    pub fn placeholder_message(&self) -> Option<&str> {
        self.placeholder.as_ref().map(Placeholder::message)
    }

    pub(crate) fn set_quests(&mut self, quests: Vec<QuestRecord>) {
        self.quests = quests;
        self.resident = true;
        self.filtered = false;
        self.placeholder = None;
    }

    pub(crate) fn clear_quests(&mut self) {
        self.quests.clear();
        self.resident = false;
        self.filtered = false;
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("catalog manifest not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read catalog manifest {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog manifest is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("catalog node `{0}` has both child categories and quests")]
    MixedNode(String),
}

/// Manifest form of a node, as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestNode {
    #[serde(default)]
    title: String,
    #[serde(default)]
    categories: Vec<ManifestNode>,
    #[serde(default)]
    quests: Vec<QuestRecord>,
    #[serde(default)]
    bucket_path: Option<String>,
    #[serde(default)]
    completion_strategy: CompletionStrategy,
    #[serde(default)]
    last_quest_id: QuestId,
    #[serde(default)]
    all_quest_ids: Option<Vec<QuestId>>,
    #[serde(default)]
    total_quests: u32,
    #[serde(default)]
    empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    nodes: Vec<CatalogNode>,
    bucket_index: HashMap<BucketKey, Vec<NodeId>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl Catalog {
    /// Catalog with a bare root and nothing under it.
    #[must_use]
    pub fn empty() -> Self {
        let root = CatalogNode {
            title: String::new(),
            children: Vec::new(),
            quests: Vec::new(),
            complete: 0,
            total: 0,
            visible: false,
            bucket: None,
            strategy: CompletionStrategy::AlwaysLoad,
            last_quest_id: None,
            all_quest_ids: Vec::new(),
            declared_total: 0,
            placeholder: None,
            resident: true,
            filtered: false,
        };
        Self {
            nodes: vec![root],
            bucket_index: HashMap::new(),
        }
    }

    /// Build the catalog from manifest JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a node mixes categories and quests.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: ManifestNode = serde_json::from_str(json)?;
        let mut catalog = Self {
            nodes: Vec::new(),
            bucket_index: HashMap::new(),
        };
        catalog.insert(manifest)?;
        Ok(catalog)
    }

    /// Build the catalog from a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Missing`] when the file does not exist, or any
    /// error [`Catalog::from_json`] can return.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ManifestError::Missing(path.to_path_buf())
            } else {
                ManifestError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json(&json)
    }

    /// Like [`Catalog::from_path`], but a failure leaves an empty catalog.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(catalog) => {
                log::debug!("Loaded catalog manifest {} ({} nodes)", path.display(), catalog.len());
                catalog
            }
            Err(err) => {
                log::error!("Error loading catalog manifest: {err}");
                Self::empty()
            }
        }
    }

    /// The manifest bundled with this crate.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_MANIFEST).unwrap_or_else(|err| {
            log::error!("Bundled catalog manifest is invalid: {err}");
            Self::empty()
        })
    }

    fn insert(&mut self, manifest: ManifestNode) -> Result<NodeId, ManifestError> {
        if !manifest.categories.is_empty() && !manifest.quests.is_empty() {
            return Err(ManifestError::MixedNode(manifest.title));
        }
        let id = NodeId(self.nodes.len());
        let bucket = manifest
            .bucket_path
            .filter(|path| !path.is_empty())
            .map(BucketKey::new);
        let resident = bucket.is_none();
        self.nodes.push(CatalogNode {
            title: manifest.title,
            children: Vec::new(),
            quests: manifest.quests,
            complete: 0,
            total: 0,
            visible: true,
            bucket: bucket.clone(),
            strategy: manifest.completion_strategy,
            last_quest_id: (manifest.last_quest_id != 0).then_some(manifest.last_quest_id),
            all_quest_ids: manifest.all_quest_ids.unwrap_or_default(),
            declared_total: manifest.total_quests,
            placeholder: manifest.empty_message.map(Placeholder::Note),
            resident,
            filtered: false,
        });
        if let Some(key) = bucket {
            self.bucket_index.entry(key).or_default().push(id);
        }
        let mut children = Vec::with_capacity(manifest.categories.len());
        for child in manifest.categories {
            children.push(self.insert(child)?);
        }
        self.nodes[id.0].children = children;
        Ok(id)
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &CatalogNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CatalogNode {
        &mut self.nodes[id.0]
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&CatalogNode> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Every node id, in depth-first manifest order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Leaves drawing from `key`.
    #[must_use]
    pub fn nodes_for_bucket(&self, key: &BucketKey) -> &[NodeId] {
        self.bucket_index.get(key).map_or(&[], Vec::as_slice)
    }

    /// Every distinct bucket key referenced by the catalog.
    pub fn bucket_keys(&self) -> impl Iterator<Item = &BucketKey> {
        self.bucket_index.keys()
    }

    /// Find a direct child of `parent` by title.
    #[must_use]
    pub fn child_by_title(&self, parent: NodeId, title: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).title == title)
    }

    /// Resolve a `/`-separated title path from the root, e.g. `A Realm Reborn/Main Scenario`.
    #[must_use]
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root(), |node, segment| self.child_by_title(node, segment))
    }

    /// First leaf referencing `key`, in manifest order.
    #[must_use]
    pub fn first_leaf_for_bucket(&self, key: &BucketKey) -> Option<NodeId> {
        self.nodes_for_bucket(key).iter().copied().min()
    }
}
