//! Eligibility filtering and bottom-up aggregation.
//!
//! One [`recompute`] call is one full pass over the catalog. Counts and
//! visibility are rebuilt every pass. Eligibility rules are destructive and run
//! once per bucket life: a dropped quest only comes back when the bucket is
//! evicted and loaded again.
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogNode, NodeId};
use crate::constants::EXCLUSIVE_GROUPS;
use crate::profile::{PlayerProfile, ProfileResolver};
use crate::quest::QuestRecord;
use crate::settings::Settings;
use crate::{CompletionOracle, PassContext};

/// Why a quest was removed from a leaf's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exclusion {
    /// Requires a different starting area.
    StartArea,
    /// Requires a different grand company.
    Faction,
    /// Class variant the player can never receive.
    StartClass,
    /// Another quest of the same mutually exclusive chain is complete.
    ExclusiveChain,
}

impl Exclusion {
    /// Restriction exclusions contradict a completed quest; the others do not.
    #[must_use]
    pub const fn is_restriction(self) -> bool {
        matches!(self, Self::StartArea | Self::Faction)
    }
}

/// First rule that makes `quest` ineligible for `profile`, in rule order.
#[must_use]
pub fn exclusion(
    quest: &QuestRecord,
    profile: &PlayerProfile,
    oracle: &dyn CompletionOracle,
) -> Option<Exclusion> {
    if profile
        .start_area
        .is_some_and(|area| !quest.start.is_empty() && quest.start != area.name())
    {
        return Some(Exclusion::StartArea);
    }
    if profile
        .faction
        .is_some_and(|faction| !quest.faction.is_empty() && quest.faction != faction.name())
    {
        return Some(Exclusion::Faction);
    }
    if profile.start_class.is_some_and(|id| quest.has_id(id)) {
        return Some(Exclusion::StartClass);
    }
    let chain_taken = EXCLUSIVE_GROUPS.iter().any(|group| {
        group.iter().any(|&id| quest.has_id(id))
            && group
                .iter()
                .any(|&id| !quest.has_id(id) && oracle.is_complete(id))
    });
    chain_taken.then_some(Exclusion::ExclusiveChain)
}

/// Drop every quest the profile cannot have.
fn apply_eligibility(node: &mut CatalogNode, profile: &PlayerProfile, oracle: &dyn CompletionOracle) {
    let before = node.quests.len();
    node.quests.retain(|quest| {
        let Some(reason) = exclusion(quest, profile, oracle) else {
            return true;
        };
        if reason.is_restriction() && quest.is_complete(oracle) {
            log::warn!(
                "Quest {} {} is restricted ({reason:?}) but completed",
                quest.title,
                quest.id_label()
            );
        }
        false
    });
    let dropped = before - node.quests.len();
    if dropped > 0 {
        log::debug!("Filtered {dropped} ineligible quests from {}", node.title);
    }
}

struct Pass<'a> {
    oracle: &'a dyn CompletionOracle,
    settings: &'a Settings,
}

fn update_leaf(node: &mut CatalogNode, pass: &Pass<'_>) {
    if node.is_unloaded_stub() {
        node.visible = true;
        node.total = node.declared_total;
        node.complete = if node
            .bucket
            .as_ref()
            .is_some_and(|key| pass.settings.is_bucket_complete(key))
        {
            node.declared_total
        } else {
            0
        };
        return;
    }

    if !node.filtered {
        apply_eligibility(node, &pass.settings.profile, pass.oracle);
        node.filtered = true;
    }

    let filter = pass.settings.display_filter;
    let mut complete = 0_u32;
    let mut visible = false;
    for quest in &mut node.quests {
        let done = quest.is_complete(pass.oracle);
        if done {
            complete += 1;
        }
        quest.hidden = filter.hides(done);
        visible |= !quest.hidden;
    }
    node.complete = complete;
    node.total = u32::try_from(node.quests.len()).unwrap_or(u32::MAX);
    node.visible = visible;
}

fn update_node(catalog: &mut Catalog, id: NodeId, pass: &Pass<'_>) {
    let child_count = catalog.node(id).children.len();
    if child_count == 0 {
        update_leaf(catalog.node_mut(id), pass);
        return;
    }

    let (mut complete, mut total, mut visible) = (0_u32, 0_u32, false);
    for index in 0..child_count {
        let child = catalog.node(id).children[index];
        update_node(catalog, child, pass);
        let child = catalog.node(child);
        complete += child.complete;
        total += child.total;
        visible |= child.visible;
    }
    let node = catalog.node_mut(id);
    node.complete = complete;
    node.total = total;
    node.visible = visible;
}

/// Run one full aggregation pass and return the root's complete count.
///
/// Profile fields are resolved first; newly resolved values are persisted.
pub fn recompute(catalog: &mut Catalog, resolver: &mut ProfileResolver, ctx: &mut PassContext<'_>) -> u32 {
    if resolver.resolve(&mut ctx.settings.profile, ctx.oracle) {
        ctx.persist();
    }
    let pass = Pass {
        oracle: ctx.oracle,
        settings: &*ctx.settings,
    };
    let root = catalog.root();
    update_node(catalog, root, &pass);
    catalog.node(root).complete
}
