//! Presentation helpers over an aggregated catalog.
use crate::catalog::{Catalog, CatalogNode};
use crate::constants::OTHER_QUESTS_TITLE;
use crate::numbers::percent_f32;
use crate::quest::QuestRecord;
use crate::settings::Settings;

/// Node label with the counters the settings ask for, e.g. `Main Scenario 2/3 66.67%`.
#[must_use]
pub fn display_text(node: &CatalogNode, settings: &Settings) -> String {
    let mut text = node.title.clone();
    if settings.show_count {
        text.push_str(&format!(" {}/{}", node.complete, node.total));
    }
    if settings.show_percentage && node.total > 0 {
        text.push_str(&format!(" {:.2}%", percent_f32(node.complete, node.total)));
    }
    text
}

/// `(complete, total)` over the whole catalog.
#[must_use]
pub fn overall_progress(catalog: &Catalog, settings: &Settings) -> (u32, u32) {
    let root = catalog.node(catalog.root());
    if !settings.exclude_other_quests {
        return (root.complete, root.total);
    }
    root.children
        .iter()
        .map(|id| catalog.node(*id))
        .filter(|node| node.title != OTHER_QUESTS_TITLE)
        .fold((0, 0), |(complete, total), node| {
            (complete + node.complete, total + node.total)
        })
}

/// Quests left visible by the last pass, optionally narrowed by a
/// case-insensitive title search.
pub fn visible_quests<'a>(
    node: &'a CatalogNode,
    search: Option<&'a str>,
) -> impl Iterator<Item = &'a QuestRecord> + 'a {
    let needle = search
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_lowercase);
    node.quests.iter().filter(move |quest| {
        !quest.hidden
            && needle
                .as_ref()
                .is_none_or(|needle| quest.title.to_lowercase().contains(needle.as_str()))
    })
}
